use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A coordinate along which content may vary, e.g. `{language=en, region=eu}`.
/// The empty point is valid and means dimension-agnostic content.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DimensionSpacePoint {
    coordinates: BTreeMap<String, String>,
}

impl DimensionSpacePoint {
    pub fn new(coordinates: BTreeMap<String, String>) -> Self {
        Self { coordinates }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn coordinate(&self, dimension: &str) -> Option<&str> {
        self.coordinates.get(dimension).map(String::as_str)
    }

    pub fn coordinates(&self) -> &BTreeMap<String, String> {
        &self.coordinates
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

impl fmt::Display for DimensionSpacePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coordinates.is_empty() {
            return f.write_str("{}");
        }
        let mut first = true;
        f.write_str("{")?;
        for (dimension, value) in &self.coordinates {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{dimension}={value}")?;
            first = false;
        }
        f.write_str("}")
    }
}

/// An insertion-ordered, duplicate-free collection of dimension space points.
/// The empty set is valid (the event or variant is dimension-agnostic).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionSpacePointSet {
    points: Vec<DimensionSpacePoint>,
}

impl DimensionSpacePointSet {
    /// Builds a set from the given points, dropping duplicates while keeping
    /// the first occurrence's position.
    pub fn new(points: impl IntoIterator<Item = DimensionSpacePoint>) -> Self {
        let mut unique = Vec::new();
        for point in points {
            if !unique.contains(&point) {
                unique.push(point);
            }
        }
        Self { points: unique }
    }

    pub fn single(point: DimensionSpacePoint) -> Self {
        Self {
            points: vec![point],
        }
    }

    pub fn contains(&self, point: &DimensionSpacePoint) -> bool {
        self.points.contains(point)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionSpacePoint> {
        self.points.iter()
    }

    pub fn points(&self) -> &[DimensionSpacePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl IntoIterator for DimensionSpacePointSet {
    type Item = DimensionSpacePoint;
    type IntoIter = std::vec::IntoIter<DimensionSpacePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl FromIterator<DimensionSpacePoint> for DimensionSpacePointSet {
    fn from_iter<I: IntoIterator<Item = DimensionSpacePoint>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl Serialize for DimensionSpacePointSet {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.points.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DimensionSpacePointSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let points = Vec::<DimensionSpacePoint>::deserialize(deserializer)?;
        let mut seen = Vec::with_capacity(points.len());
        for point in &points {
            if seen.contains(&point) {
                return Err(serde::de::Error::custom(format!(
                    "duplicate dimension space point {point}"
                )));
            }
            seen.push(point);
        }
        Ok(Self { points })
    }
}

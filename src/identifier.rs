use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub const MAX_IDENTIFIER_LENGTH: usize = 64;
pub const MAX_PROPERTY_NAME_LENGTH: usize = 128;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid identifier regex"));
static PROPERTY_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("valid property name regex"));

fn ensure_identifier(label: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(EngineError::InvalidIdentifier(format!(
            "{label} must not be empty"
        )));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(EngineError::InvalidIdentifier(format!(
            "{label} cannot exceed {MAX_IDENTIFIER_LENGTH} characters"
        )));
    }
    if !IDENTIFIER_RE.is_match(value) {
        return Err(EngineError::InvalidIdentifier(format!(
            "{label} may only contain letters, numbers, underscores, or hyphens"
        )));
    }
    Ok(())
}

/// Names one append-only event timeline, e.g. `live` or a user workspace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentStreamId(String);

impl ContentStreamId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        ensure_identifier("content stream identifier", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentStreamId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentStreamId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ContentStreamId> for String {
    fn from(value: ContentStreamId) -> Self {
        value.0
    }
}

/// Stable identity of a logical node across all of its dimension variants and
/// across content-stream copies. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAggregateId(String);

impl NodeAggregateId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        ensure_identifier("node aggregate identifier", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeAggregateId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeAggregateId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<NodeAggregateId> for String {
    fn from(value: NodeAggregateId) -> Self {
        value.0
    }
}

/// Addresses one materialized occurrence of an aggregate. Distinct from
/// [`NodeAggregateId`]: the aggregate is the logical entity, the node is one
/// facet of it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        ensure_identifier("node identifier", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

/// Names a property or reference slot on a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyName(String);

impl PropertyName {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(EngineError::InvalidIdentifier(
                "property name must not be empty".into(),
            ));
        }
        if value.len() > MAX_PROPERTY_NAME_LENGTH {
            return Err(EngineError::InvalidIdentifier(format!(
                "property name cannot exceed {MAX_PROPERTY_NAME_LENGTH} characters"
            )));
        }
        if !PROPERTY_NAME_RE.is_match(&value) {
            return Err(EngineError::InvalidIdentifier(
                "property name must start with a letter or underscore and may only contain \
                 letters, numbers, underscores, or hyphens"
                    .into(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PropertyName {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for PropertyName {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PropertyName> for String {
    fn from(value: PropertyName) -> Self {
        value.0
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dimension::{DimensionSpacePoint, DimensionSpacePointSet};
use crate::identifier::{ContentStreamId, NodeAggregateId, NodeId, PropertyName};

pub const NODE_AGGREGATE_WITH_NODE_WAS_CREATED: &str = "node_aggregate_with_node_was_created";
pub const NODE_PROPERTY_WAS_SET: &str = "node_property_was_set";
pub const NODE_REFERENCES_WERE_SET: &str = "node_references_were_set";
pub const NODE_WAS_MOVED: &str = "node_was_moved";
pub const NODE_WAS_REMOVED: &str = "node_was_removed";
pub const NODE_GENERALIZATION_VARIANT_WAS_CREATED: &str =
    "node_generalization_variant_was_created";
pub const CONTENT_STREAM_WAS_REMOVED: &str = "content_stream_was_removed";

/// A new node aggregate was materialized with one node covering the given
/// dimension space points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAggregateWithNodeWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub node_id: NodeId,
    pub parent_node_aggregate_id: Option<NodeAggregateId>,
    pub dimension_space_point_set: DimensionSpacePointSet,
    #[serde(default)]
    pub initial_property_values: BTreeMap<PropertyName, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePropertyWasSet {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub dimension_space_point_set: DimensionSpacePointSet,
    pub property_name: PropertyName,
    pub value: Value,
}

/// A named reference from a source node to an ordered list of destination
/// aggregates was (re)assigned. Replaces the whole list for that property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReferencesWereSet {
    pub content_stream_id: ContentStreamId,
    pub dimension_space_point_set: DimensionSpacePointSet,
    pub node_id: NodeId,
    pub property_name: PropertyName,
    pub destination_node_aggregate_ids: Vec<NodeAggregateId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeWasMoved {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub dimension_space_point_set: DimensionSpacePointSet,
    pub new_parent_node_aggregate_id: Option<NodeAggregateId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeWasRemoved {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub dimension_space_point_set: DimensionSpacePointSet,
}

/// An existing variant was widened to cover more general dimension space
/// points, materialized under a fresh node identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGeneralizationVariantWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub source_dimension_space_point: DimensionSpacePoint,
    pub generalization_coverage: DimensionSpacePointSet,
    pub generalization_node_id: NodeId,
}

/// Tombstone terminating a content stream. Stream-specific: it never travels
/// across a fork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentStreamWasRemoved {
    pub content_stream_id: ContentStreamId,
}

/// The closed union of facts this engine records. Every payload names the
/// content stream it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated),
    NodePropertyWasSet(NodePropertyWasSet),
    NodeReferencesWereSet(NodeReferencesWereSet),
    NodeWasMoved(NodeWasMoved),
    NodeWasRemoved(NodeWasRemoved),
    NodeGeneralizationVariantWasCreated(NodeGeneralizationVariantWasCreated),
    ContentStreamWasRemoved(ContentStreamWasRemoved),
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::NodeAggregateWithNodeWasCreated(_) => NODE_AGGREGATE_WITH_NODE_WAS_CREATED,
            Self::NodePropertyWasSet(_) => NODE_PROPERTY_WAS_SET,
            Self::NodeReferencesWereSet(_) => NODE_REFERENCES_WERE_SET,
            Self::NodeWasMoved(_) => NODE_WAS_MOVED,
            Self::NodeWasRemoved(_) => NODE_WAS_REMOVED,
            Self::NodeGeneralizationVariantWasCreated(_) => {
                NODE_GENERALIZATION_VARIANT_WAS_CREATED
            }
            Self::ContentStreamWasRemoved(_) => CONTENT_STREAM_WAS_REMOVED,
        }
    }

    pub fn content_stream_id(&self) -> &ContentStreamId {
        match self {
            Self::NodeAggregateWithNodeWasCreated(event) => &event.content_stream_id,
            Self::NodePropertyWasSet(event) => &event.content_stream_id,
            Self::NodeReferencesWereSet(event) => &event.content_stream_id,
            Self::NodeWasMoved(event) => &event.content_stream_id,
            Self::NodeWasRemoved(event) => &event.content_stream_id,
            Self::NodeGeneralizationVariantWasCreated(event) => &event.content_stream_id,
            Self::ContentStreamWasRemoved(event) => &event.content_stream_id,
        }
    }

    /// Re-targets this event onto another content stream. Copyable variants
    /// return an identical payload with only the stream identifier replaced;
    /// stream-specific variants return `None` and are excluded during forking.
    pub fn copy_for_content_stream(&self, target: &ContentStreamId) -> Option<DomainEvent> {
        match self {
            Self::NodeAggregateWithNodeWasCreated(event) => {
                Some(Self::NodeAggregateWithNodeWasCreated(
                    NodeAggregateWithNodeWasCreated {
                        content_stream_id: target.clone(),
                        ..event.clone()
                    },
                ))
            }
            Self::NodePropertyWasSet(event) => Some(Self::NodePropertyWasSet(NodePropertyWasSet {
                content_stream_id: target.clone(),
                ..event.clone()
            })),
            Self::NodeReferencesWereSet(event) => {
                Some(Self::NodeReferencesWereSet(NodeReferencesWereSet {
                    content_stream_id: target.clone(),
                    ..event.clone()
                }))
            }
            Self::NodeWasMoved(event) => Some(Self::NodeWasMoved(NodeWasMoved {
                content_stream_id: target.clone(),
                ..event.clone()
            })),
            Self::NodeWasRemoved(event) => Some(Self::NodeWasRemoved(NodeWasRemoved {
                content_stream_id: target.clone(),
                ..event.clone()
            })),
            Self::NodeGeneralizationVariantWasCreated(event) => {
                Some(Self::NodeGeneralizationVariantWasCreated(
                    NodeGeneralizationVariantWasCreated {
                        content_stream_id: target.clone(),
                        ..event.clone()
                    },
                ))
            }
            Self::ContentStreamWasRemoved(_) => None,
        }
    }
}

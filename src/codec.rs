use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::event::{
    self, ContentStreamWasRemoved, DomainEvent, NodeAggregateWithNodeWasCreated,
    NodeGeneralizationVariantWasCreated, NodePropertyWasSet, NodeReferencesWereSet, NodeWasMoved,
    NodeWasRemoved,
};

/// Converts domain events to and from their storable representation. The
/// round trip must be exact, including ordered reference lists and dimension
/// sets.
pub trait EventCodec: Send + Sync {
    fn encode(&self, event: &DomainEvent) -> Result<(&'static str, Value)>;
    fn decode(&self, event_type: &str, payload: &Value) -> Result<DomainEvent>;
}

/// Structured-JSON codec. Every invariant a payload can violate (empty
/// property name, duplicate dimension points, unknown fields' types) surfaces
/// here as [`EngineError::MalformedPayload`], before any fold sees the event.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEventCodec;

impl JsonEventCodec {
    pub fn new() -> Self {
        Self
    }
}

fn to_payload<T: Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload).map_err(|err| EngineError::Serialization(err.to_string()))
}

fn from_payload<T: DeserializeOwned>(event_type: &str, payload: &Value) -> Result<T> {
    serde_json::from_value(payload.clone())
        .map_err(|err| EngineError::MalformedPayload(format!("{event_type}: {err}")))
}

impl EventCodec for JsonEventCodec {
    fn encode(&self, domain_event: &DomainEvent) -> Result<(&'static str, Value)> {
        let payload = match domain_event {
            DomainEvent::NodeAggregateWithNodeWasCreated(payload) => to_payload(payload)?,
            DomainEvent::NodePropertyWasSet(payload) => to_payload(payload)?,
            DomainEvent::NodeReferencesWereSet(payload) => to_payload(payload)?,
            DomainEvent::NodeWasMoved(payload) => to_payload(payload)?,
            DomainEvent::NodeWasRemoved(payload) => to_payload(payload)?,
            DomainEvent::NodeGeneralizationVariantWasCreated(payload) => to_payload(payload)?,
            DomainEvent::ContentStreamWasRemoved(payload) => to_payload(payload)?,
        };
        Ok((domain_event.event_type(), payload))
    }

    fn decode(&self, event_type: &str, payload: &Value) -> Result<DomainEvent> {
        match event_type {
            event::NODE_AGGREGATE_WITH_NODE_WAS_CREATED => {
                from_payload::<NodeAggregateWithNodeWasCreated>(event_type, payload)
                    .map(DomainEvent::NodeAggregateWithNodeWasCreated)
            }
            event::NODE_PROPERTY_WAS_SET => from_payload::<NodePropertyWasSet>(event_type, payload)
                .map(DomainEvent::NodePropertyWasSet),
            event::NODE_REFERENCES_WERE_SET => {
                from_payload::<NodeReferencesWereSet>(event_type, payload)
                    .map(DomainEvent::NodeReferencesWereSet)
            }
            event::NODE_WAS_MOVED => {
                from_payload::<NodeWasMoved>(event_type, payload).map(DomainEvent::NodeWasMoved)
            }
            event::NODE_WAS_REMOVED => {
                from_payload::<NodeWasRemoved>(event_type, payload).map(DomainEvent::NodeWasRemoved)
            }
            event::NODE_GENERALIZATION_VARIANT_WAS_CREATED => {
                from_payload::<NodeGeneralizationVariantWasCreated>(event_type, payload)
                    .map(DomainEvent::NodeGeneralizationVariantWasCreated)
            }
            event::CONTENT_STREAM_WAS_REMOVED => {
                from_payload::<ContentStreamWasRemoved>(event_type, payload)
                    .map(DomainEvent::ContentStreamWasRemoved)
            }
            other => Err(EngineError::UnsupportedEventType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{DimensionSpacePoint, DimensionSpacePointSet};
    use crate::identifier::{ContentStreamId, NodeAggregateId, NodeId, PropertyName};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn language(value: &str) -> DimensionSpacePoint {
        let mut coordinates = BTreeMap::new();
        coordinates.insert("language".to_string(), value.to_string());
        DimensionSpacePoint::new(coordinates)
    }

    fn sample_event() -> DomainEvent {
        DomainEvent::NodeReferencesWereSet(NodeReferencesWereSet {
            content_stream_id: ContentStreamId::new("live").unwrap(),
            dimension_space_point_set: DimensionSpacePointSet::new(vec![
                language("en"),
                language("de"),
            ]),
            node_id: NodeId::new("node-a").unwrap(),
            property_name: PropertyName::new("related").unwrap(),
            destination_node_aggregate_ids: vec![
                NodeAggregateId::new("b").unwrap(),
                NodeAggregateId::new("a").unwrap(),
            ],
        })
    }

    #[test]
    fn round_trips_exactly() {
        let codec = JsonEventCodec::new();
        let original = sample_event();
        let (event_type, payload) = codec.encode(&original).unwrap();
        let decoded = codec.decode(event_type, &payload).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn unknown_event_type_fails_closed() {
        let codec = JsonEventCodec::new();
        let err = codec
            .decode("workspace_was_published", &json!({}))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedEventType(name) if name == "workspace_was_published"));
    }

    #[test]
    fn empty_property_name_is_malformed() {
        let codec = JsonEventCodec::new();
        let payload = json!({
            "content_stream_id": "live",
            "dimension_space_point_set": [],
            "node_id": "node-a",
            "property_name": "",
            "destination_node_aggregate_ids": [],
        });
        let err = codec
            .decode(event::NODE_REFERENCES_WERE_SET, &payload)
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedPayload(_)));
    }

    #[test]
    fn duplicate_dimension_points_are_malformed() {
        let codec = JsonEventCodec::new();
        let payload = json!({
            "content_stream_id": "live",
            "node_aggregate_id": "n1",
            "dimension_space_point_set": [
                {"coordinates": {"language": "en"}},
                {"coordinates": {"language": "en"}},
            ],
        });
        let err = codec.decode(event::NODE_WAS_REMOVED, &payload).unwrap_err();
        assert!(matches!(err, EngineError::MalformedPayload(_)));
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use metrics::counter;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use crate::dimension::DimensionSpacePoint;
use crate::error::Result;
use crate::event::DomainEvent;
use crate::identifier::{ContentStreamId, NodeAggregateId, NodeId, PropertyName};
use crate::log::{EventEnvelope, EventLog};
use crate::observability::{PROJECTION_EVENTS_APPLIED, PROJECTION_REBUILDS};

/// One materialized facet of an aggregate at a dimension space point.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeVariant {
    pub node_id: NodeId,
    pub parent_node_aggregate_id: Option<NodeAggregateId>,
    pub properties: BTreeMap<PropertyName, Value>,
    pub references: BTreeMap<PropertyName, Vec<NodeAggregateId>>,
}

/// Read-side view of one aggregate: its variants keyed by dimension point.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAggregateSnapshot {
    pub node_aggregate_id: NodeAggregateId,
    pub variants: BTreeMap<DimensionSpacePoint, NodeVariant>,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct StreamState {
    applied_version: u64,
    aggregates: BTreeMap<NodeAggregateId, BTreeMap<DimensionSpacePoint, NodeVariant>>,
    nodes: BTreeMap<NodeId, NodeAggregateId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    Completed(u64),
    Cancelled,
}

/// Folds the event log into current node-aggregate state, keyed by
/// (content stream, aggregate, dimension point). Derived and rebuildable:
/// the log stays authoritative, this is a cache of it. Readers get cloned
/// snapshots and accept eventual consistency.
#[derive(Default)]
pub struct NodeAggregateProjection {
    state: RwLock<BTreeMap<ContentStreamId, StreamState>>,
}

impl NodeAggregateProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds events appended since the last catch-up, strictly in version
    /// order. Returns the stream version the projection now reflects.
    pub fn catch_up(&self, log: &EventLog, stream: &ContentStreamId) -> Result<u64> {
        let from = self.applied_version(stream) + 1;
        let envelopes = log.read_from(stream, from)?;

        let mut guard = self.state.write();
        let state = guard.entry(stream.clone()).or_default();
        let mut applied = 0u64;
        for envelope in &envelopes {
            // A concurrent catch-up may have advanced past us between the
            // read above and taking the write lock.
            if envelope.version <= state.applied_version {
                continue;
            }
            apply_to_state(state, envelope);
            applied += 1;
        }
        if applied > 0 {
            counter!(PROJECTION_EVENTS_APPLIED).increment(applied);
            debug!(stream = %stream, applied, version = state.applied_version, "projection caught up");
        }
        Ok(state.applied_version)
    }

    /// Replays the stream's full history into a detached state, then swaps it
    /// in atomically. On cancellation the partial result is discarded and the
    /// previously visible projection stays untouched.
    pub fn rebuild(
        &self,
        log: &EventLog,
        stream: &ContentStreamId,
        cancel: &AtomicBool,
    ) -> Result<RebuildOutcome> {
        let envelopes = log.read_all(stream)?;

        let mut fresh = StreamState::default();
        for envelope in &envelopes {
            if cancel.load(Ordering::Relaxed) {
                counter!(PROJECTION_REBUILDS, "outcome" => "cancelled").increment(1);
                info!(stream = %stream, "projection rebuild cancelled");
                return Ok(RebuildOutcome::Cancelled);
            }
            apply_to_state(&mut fresh, envelope);
        }

        let version = fresh.applied_version;
        self.state.write().insert(stream.clone(), fresh);
        counter!(PROJECTION_REBUILDS, "outcome" => "completed").increment(1);
        info!(stream = %stream, version, "projection rebuilt");
        Ok(RebuildOutcome::Completed(version))
    }

    pub fn applied_version(&self, stream: &ContentStreamId) -> u64 {
        self.state
            .read()
            .get(stream)
            .map(|state| state.applied_version)
            .unwrap_or(0)
    }

    pub fn aggregate(
        &self,
        stream: &ContentStreamId,
        aggregate: &NodeAggregateId,
    ) -> Option<NodeAggregateSnapshot> {
        self.state
            .read()
            .get(stream)?
            .aggregates
            .get(aggregate)
            .map(|variants| NodeAggregateSnapshot {
                node_aggregate_id: aggregate.clone(),
                variants: variants.clone(),
            })
    }

    pub fn variant(
        &self,
        stream: &ContentStreamId,
        aggregate: &NodeAggregateId,
        point: &DimensionSpacePoint,
    ) -> Option<NodeVariant> {
        self.state
            .read()
            .get(stream)?
            .aggregates
            .get(aggregate)?
            .get(point)
            .cloned()
    }

    /// The ordered destination list for (aggregate, point, property), as set
    /// by the last `NodeReferencesWereSet` covering that point.
    pub fn references(
        &self,
        stream: &ContentStreamId,
        aggregate: &NodeAggregateId,
        point: &DimensionSpacePoint,
        property: &PropertyName,
    ) -> Option<Vec<NodeAggregateId>> {
        self.state
            .read()
            .get(stream)?
            .aggregates
            .get(aggregate)?
            .get(point)?
            .references
            .get(property)
            .cloned()
    }

    /// Drops all projected state for a stream (used after a purge).
    pub fn forget_stream(&self, stream: &ContentStreamId) {
        self.state.write().remove(stream);
    }
}

/// The pure fold: `(prior state, event) -> new state`, mutated in place.
/// Applying the same event twice yields the same state as applying it once;
/// property and reference writes replace, never merge.
fn apply_to_state(state: &mut StreamState, envelope: &EventEnvelope) {
    match &envelope.event {
        DomainEvent::NodeAggregateWithNodeWasCreated(event) => {
            let variants = state
                .aggregates
                .entry(event.node_aggregate_id.clone())
                .or_default();
            for point in event.dimension_space_point_set.iter() {
                variants.insert(
                    point.clone(),
                    NodeVariant {
                        node_id: event.node_id.clone(),
                        parent_node_aggregate_id: event.parent_node_aggregate_id.clone(),
                        properties: event.initial_property_values.clone(),
                        references: BTreeMap::new(),
                    },
                );
            }
            state
                .nodes
                .insert(event.node_id.clone(), event.node_aggregate_id.clone());
        }
        DomainEvent::NodePropertyWasSet(event) => {
            if let Some(variants) = state.aggregates.get_mut(&event.node_aggregate_id) {
                for point in event.dimension_space_point_set.iter() {
                    if let Some(variant) = variants.get_mut(point) {
                        variant
                            .properties
                            .insert(event.property_name.clone(), event.value.clone());
                    }
                }
            }
        }
        DomainEvent::NodeReferencesWereSet(event) => {
            // The event addresses the source by node, not by aggregate; the
            // node index resolves which aggregate the write lands on.
            if let Some(aggregate_id) = state.nodes.get(&event.node_id).cloned() {
                if let Some(variants) = state.aggregates.get_mut(&aggregate_id) {
                    for point in event.dimension_space_point_set.iter() {
                        if let Some(variant) = variants.get_mut(point) {
                            variant.references.insert(
                                event.property_name.clone(),
                                event.destination_node_aggregate_ids.clone(),
                            );
                        }
                    }
                }
            }
        }
        DomainEvent::NodeWasMoved(event) => {
            if let Some(variants) = state.aggregates.get_mut(&event.node_aggregate_id) {
                for point in event.dimension_space_point_set.iter() {
                    if let Some(variant) = variants.get_mut(point) {
                        variant.parent_node_aggregate_id =
                            event.new_parent_node_aggregate_id.clone();
                    }
                }
            }
        }
        DomainEvent::NodeWasRemoved(event) => {
            if let Some(variants) = state.aggregates.get_mut(&event.node_aggregate_id) {
                for point in event.dimension_space_point_set.iter() {
                    variants.remove(point);
                }
                if variants.is_empty() {
                    state.aggregates.remove(&event.node_aggregate_id);
                    state
                        .nodes
                        .retain(|_, aggregate| aggregate != &event.node_aggregate_id);
                }
            }
        }
        DomainEvent::NodeGeneralizationVariantWasCreated(event) => {
            if let Some(variants) = state.aggregates.get_mut(&event.node_aggregate_id) {
                if let Some(source) = variants.get(&event.source_dimension_space_point).cloned() {
                    for point in event.generalization_coverage.iter() {
                        variants.insert(
                            point.clone(),
                            NodeVariant {
                                node_id: event.generalization_node_id.clone(),
                                ..source.clone()
                            },
                        );
                    }
                    state.nodes.insert(
                        event.generalization_node_id.clone(),
                        event.node_aggregate_id.clone(),
                    );
                }
            }
        }
        DomainEvent::ContentStreamWasRemoved(_) => {
            state.aggregates.clear();
            state.nodes.clear();
        }
    }
    state.applied_version = envelope.version;
}

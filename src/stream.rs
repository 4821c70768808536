use std::sync::Arc;
use std::time::Instant;

use metrics::counter;
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::event::{ContentStreamWasRemoved, DomainEvent};
use crate::identifier::ContentStreamId;
use crate::log::EventLog;
use crate::observability::{self, EVENTS_FORKED};
use crate::storage::{StreamLineage, StreamMeta};

/// Creates, forks, and removes content streams. Forking copies the source's
/// copyable events into the target at a fixed snapshot version; the source is
/// never mutated and concurrent appends to it proceed unhindered.
pub struct ContentStreamManager {
    log: Arc<EventLog>,
}

impl ContentStreamManager {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }

    pub fn create_stream(&self, id: &ContentStreamId) -> Result<()> {
        self.log.storage().create_stream(StreamMeta::new(id.clone()))?;
        info!(stream = %id, "created content stream");
        Ok(())
    }

    /// Forks `source` into `target`: replays the source's copyable events,
    /// re-targeted onto `target`, as one atomic batch. The snapshot is the
    /// source tail at the time of the fork; events appended to the source
    /// afterwards are not included and must be forked explicitly later if
    /// needed. A failed fork leaves no target stream behind.
    ///
    /// Returns the number of events copied.
    pub fn fork_stream(&self, source: &ContentStreamId, target: &ContentStreamId) -> Result<u64> {
        let start = Instant::now();
        let result = self.fork_inner(source, target);
        observability::record_store_op(
            "fork",
            if result.is_ok() { "ok" } else { "err" },
            start.elapsed().as_secs_f64(),
        );
        result
    }

    fn fork_inner(&self, source: &ContentStreamId, target: &ContentStreamId) -> Result<u64> {
        let storage = self.log.storage();
        let meta = storage
            .stream(source)?
            .ok_or_else(|| EngineError::StreamNotFound {
                stream: source.to_string(),
            })?;
        if meta.removed {
            return Err(EngineError::StreamRemoved {
                stream: source.to_string(),
            });
        }

        let snapshot_version = meta.version;
        let mut copies = Vec::new();
        for envelope in self.log.read_until(source, snapshot_version)? {
            if let Some(copy) = envelope.event.copy_for_content_stream(target) {
                copies.push(copy);
            }
        }
        let copied = copies.len() as u64;

        storage.create_stream(StreamMeta::forked_from(
            target.clone(),
            source.clone(),
            snapshot_version,
        ))?;

        if let Err(err) = self.log.append(target, 0, copies) {
            // The target was just created and nobody else could have seen it;
            // purge it so the failed fork leaves no partial state.
            if let Err(purge_err) = storage.purge_stream(target) {
                warn!(stream = %target, error = %purge_err, "failed to purge aborted fork target");
            }
            return Err(err);
        }

        counter!(EVENTS_FORKED).increment(copied);
        info!(
            source = %source,
            target = %target,
            snapshot_version,
            copied,
            "forked content stream"
        );
        Ok(copied)
    }

    /// Terminates a stream: appends the removal tombstone, then flags the
    /// meta so later appends fail with `StreamRemoved`. Concurrent appends
    /// race the tombstone and may surface a `ConcurrencyConflict` here.
    pub fn remove_stream(&self, id: &ContentStreamId) -> Result<()> {
        let storage = self.log.storage();
        let meta = storage
            .stream(id)?
            .ok_or_else(|| EngineError::StreamNotFound {
                stream: id.to_string(),
            })?;
        if meta.removed {
            return Err(EngineError::StreamRemoved {
                stream: id.to_string(),
            });
        }

        let tombstone = DomainEvent::ContentStreamWasRemoved(ContentStreamWasRemoved {
            content_stream_id: id.clone(),
        });
        self.log.append(id, meta.version, vec![tombstone])?;
        storage.mark_removed(id)?;
        info!(stream = %id, "removed content stream");
        Ok(())
    }

    pub fn lineage(&self, id: &ContentStreamId) -> Result<Option<StreamLineage>> {
        let meta = self
            .log
            .storage()
            .stream(id)?
            .ok_or_else(|| EngineError::StreamNotFound {
                stream: id.to_string(),
            })?;
        Ok(meta.lineage)
    }

    pub fn streams(&self) -> Result<Vec<StreamMeta>> {
        self.log.storage().streams()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonEventCodec;
    use crate::dimension::DimensionSpacePointSet;
    use crate::event::{NodeAggregateWithNodeWasCreated, NodePropertyWasSet};
    use crate::identifier::{NodeAggregateId, NodeId, PropertyName};
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn stream(id: &str) -> ContentStreamId {
        ContentStreamId::new(id).unwrap()
    }

    fn manager() -> (ContentStreamManager, Arc<EventLog>) {
        let storage = Arc::new(MemoryStorage::new());
        let log = Arc::new(EventLog::new(storage, Arc::new(JsonEventCodec::new()), 0).unwrap());
        (ContentStreamManager::new(Arc::clone(&log)), log)
    }

    fn created(stream_id: &ContentStreamId, aggregate: &str, node: &str) -> DomainEvent {
        DomainEvent::NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated {
            content_stream_id: stream_id.clone(),
            node_aggregate_id: NodeAggregateId::new(aggregate).unwrap(),
            node_id: NodeId::new(node).unwrap(),
            parent_node_aggregate_id: None,
            dimension_space_point_set: DimensionSpacePointSet::default(),
            initial_property_values: BTreeMap::new(),
        })
    }

    fn property_set(stream_id: &ContentStreamId, aggregate: &str, value: &str) -> DomainEvent {
        DomainEvent::NodePropertyWasSet(NodePropertyWasSet {
            content_stream_id: stream_id.clone(),
            node_aggregate_id: NodeAggregateId::new(aggregate).unwrap(),
            dimension_space_point_set: DimensionSpacePointSet::default(),
            property_name: PropertyName::new("title").unwrap(),
            value: json!(value),
        })
    }

    #[test]
    fn fork_copies_events_onto_the_target_stream() {
        let (manager, log) = manager();
        let live = stream("live");
        let draft = stream("user-1");
        manager.create_stream(&live).unwrap();
        log.append(
            &live,
            0,
            vec![created(&live, "n1", "node-1"), property_set(&live, "n1", "A")],
        )
        .unwrap();

        let copied = manager.fork_stream(&live, &draft).unwrap();
        assert_eq!(copied, 2);

        let envelopes = log.read_all(&draft).unwrap();
        assert_eq!(envelopes.len(), 2);
        for envelope in &envelopes {
            assert_eq!(envelope.event.content_stream_id(), &draft);
        }
        assert_eq!(
            manager.lineage(&draft).unwrap(),
            Some(StreamLineage {
                source: live.clone(),
                source_version: 2,
            })
        );
        // The source is untouched.
        assert!(manager.lineage(&live).unwrap().is_none());
        assert_eq!(log.read_all(&live).unwrap().len(), 2);
    }

    #[test]
    fn fork_into_existing_stream_fails_without_side_effects() {
        let (manager, log) = manager();
        let live = stream("live");
        let draft = stream("user-1");
        manager.create_stream(&live).unwrap();
        manager.create_stream(&draft).unwrap();
        log.append(&live, 0, vec![created(&live, "n1", "node-1")]).unwrap();

        let err = manager.fork_stream(&live, &draft).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateStream { .. }));
        assert!(log.read_all(&draft).unwrap().is_empty());
    }

    #[test]
    fn divergence_after_fork_stays_local() {
        let (manager, log) = manager();
        let live = stream("live");
        let draft = stream("user-1");
        manager.create_stream(&live).unwrap();
        log.append(
            &live,
            0,
            vec![created(&live, "n1", "node-1"), property_set(&live, "n1", "A")],
        )
        .unwrap();
        manager.fork_stream(&live, &draft).unwrap();

        log.append(&draft, 2, vec![property_set(&draft, "n1", "B")]).unwrap();

        assert_eq!(log.read_all(&draft).unwrap().len(), 3);
        assert_eq!(log.read_all(&live).unwrap().len(), 2);
    }

    #[test]
    fn removal_tombstone_never_travels_across_a_fork() {
        let (manager, log) = manager();
        let live = stream("live");
        let draft = stream("user-1");
        let second = stream("user-2");
        manager.create_stream(&live).unwrap();
        log.append(&live, 0, vec![created(&live, "n1", "node-1")]).unwrap();
        manager.fork_stream(&live, &draft).unwrap();

        manager.remove_stream(&draft).unwrap();
        let err = log.append(&draft, 2, vec![property_set(&draft, "n1", "B")]).unwrap_err();
        assert!(matches!(err, EngineError::StreamRemoved { .. }));

        // A removed stream cannot be forked at all; the exclusion of the
        // tombstone is observable when copying the events directly.
        let err = manager.fork_stream(&draft, &second).unwrap_err();
        assert!(matches!(err, EngineError::StreamRemoved { .. }));
        let copyable: Vec<_> = log
            .read_all(&draft)
            .unwrap()
            .into_iter()
            .filter_map(|envelope| envelope.event.copy_for_content_stream(&second))
            .collect();
        assert_eq!(copyable.len(), 1);
    }

    #[test]
    fn remove_missing_stream_reports_not_found() {
        let (manager, _log) = manager();
        let err = manager.remove_stream(&stream("ghost")).unwrap_err();
        assert!(matches!(err, EngineError::StreamNotFound { .. }));
    }
}

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::cache::AggregateCache;
use crate::codec::{EventCodec, JsonEventCodec};
use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::event::DomainEvent;
use crate::identifier::{ContentStreamId, NodeAggregateId};
use crate::log::{EventEnvelope, EventLog};
use crate::observability;
use crate::projection::{NodeAggregateProjection, NodeAggregateSnapshot, RebuildOutcome};
use crate::storage::{EventStorage, MemoryStorage, RocksStorage, StreamLineage, StreamMeta};
use crate::stream::ContentStreamManager;

/// The embedder's entry point: one handle wiring storage, log, stream
/// manager, projection, and snapshot cache together. Command and query
/// layers live outside; this type only records facts and folds them.
pub struct ContentRepository {
    log: Arc<EventLog>,
    streams: ContentStreamManager,
    projection: NodeAggregateProjection,
    cache: Option<AggregateCache>,
}

impl ContentRepository {
    /// Opens a durable repository at the configured data directory.
    pub fn open(config: &RepositoryConfig) -> Result<Self> {
        config.validate()?;
        config.ensure_data_dir()?;
        let storage = Arc::new(RocksStorage::open(config.event_store_path())?);
        Self::with_storage(storage, config.cache_capacity, config.worker_id)
    }

    /// A scratch repository backed by heap storage.
    pub fn in_memory() -> Result<Self> {
        Self::with_storage(
            Arc::new(MemoryStorage::new()),
            crate::config::DEFAULT_CACHE_CAPACITY,
            0,
        )
    }

    /// Wires an externally provided storage backend, e.g. one of the in-tree
    /// backends with custom options or a different implementation entirely.
    pub fn with_storage(
        storage: Arc<dyn EventStorage>,
        cache_capacity: usize,
        worker_id: u16,
    ) -> Result<Self> {
        observability::describe();
        let codec: Arc<dyn EventCodec> = Arc::new(JsonEventCodec::new());
        let log = Arc::new(EventLog::new(storage, codec, worker_id)?);
        Ok(Self {
            streams: ContentStreamManager::new(Arc::clone(&log)),
            projection: NodeAggregateProjection::new(),
            cache: AggregateCache::new(cache_capacity),
            log,
        })
    }

    pub fn create_content_stream(&self, id: &ContentStreamId) -> Result<()> {
        self.streams.create_stream(id)
    }

    /// Forks `source` into `target` at the source's current version; returns
    /// the number of events copied.
    pub fn fork_content_stream(
        &self,
        source: &ContentStreamId,
        target: &ContentStreamId,
    ) -> Result<u64> {
        self.streams.fork_stream(source, target)
    }

    /// Appends events under optimistic concurrency; returns the new tail
    /// version.
    pub fn append_to_stream(
        &self,
        stream: &ContentStreamId,
        expected_version: u64,
        events: Vec<DomainEvent>,
    ) -> Result<u64> {
        let version = self.log.append(stream, expected_version, events)?;
        if let Some(cache) = &self.cache {
            cache.invalidate_stream(stream);
        }
        Ok(version)
    }

    pub fn remove_content_stream(&self, stream: &ContentStreamId) -> Result<()> {
        self.streams.remove_stream(stream)?;
        if let Some(cache) = &self.cache {
            cache.invalidate_stream(stream);
        }
        Ok(())
    }

    pub fn read_stream(&self, stream: &ContentStreamId) -> Result<Vec<EventEnvelope>> {
        self.log.read_all(stream)
    }

    /// Current projected state of one aggregate, catching the projection up
    /// to the stream tail first.
    pub fn node_aggregate(
        &self,
        stream: &ContentStreamId,
        aggregate: &NodeAggregateId,
    ) -> Result<Option<NodeAggregateSnapshot>> {
        self.catch_up(stream)?;
        if let Some(cache) = &self.cache {
            if let Some(snapshot) = cache.get(stream, aggregate) {
                return Ok(Some(snapshot));
            }
        }
        let snapshot = self.projection.aggregate(stream, aggregate);
        if let (Some(cache), Some(snapshot)) = (&self.cache, &snapshot) {
            cache.put(stream, snapshot.clone());
        }
        Ok(snapshot)
    }

    pub fn catch_up(&self, stream: &ContentStreamId) -> Result<u64> {
        self.projection.catch_up(&self.log, stream)
    }

    /// Full-history projection rebuild. Cancellable; a cancelled rebuild
    /// leaves the previously visible projection in place.
    pub fn rebuild_projection(
        &self,
        stream: &ContentStreamId,
        cancel: &AtomicBool,
    ) -> Result<RebuildOutcome> {
        let outcome = self.projection.rebuild(&self.log, stream, cancel)?;
        if let (Some(cache), RebuildOutcome::Completed(_)) = (&self.cache, &outcome) {
            cache.invalidate_stream(stream);
        }
        Ok(outcome)
    }

    pub fn verify_stream(&self, stream: &ContentStreamId) -> Result<String> {
        self.log.verify(stream)
    }

    pub fn lineage(&self, stream: &ContentStreamId) -> Result<Option<StreamLineage>> {
        self.streams.lineage(stream)
    }

    pub fn streams(&self) -> Result<Vec<StreamMeta>> {
        self.streams.streams()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn projection(&self) -> &NodeAggregateProjection {
        &self.projection
    }
}

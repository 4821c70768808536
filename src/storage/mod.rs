mod memory;
mod rocks;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::eventid::EventId;
use crate::identifier::ContentStreamId;

pub use memory::MemoryStorage;
pub use rocks::RocksStorage;

/// One stored event: the unit the log appends and replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub content_stream_id: ContentStreamId,
    pub version: u64,
    pub event_type: String,
    pub payload: Value,
    pub metadata: EventMetadata,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: EventId,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLineage {
    pub source: ContentStreamId,
    pub source_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMeta {
    pub content_stream_id: ContentStreamId,
    pub version: u64,
    #[serde(default)]
    pub lineage: Option<StreamLineage>,
    #[serde(default)]
    pub removed: bool,
    pub created_at: DateTime<Utc>,
}

impl StreamMeta {
    pub fn new(content_stream_id: ContentStreamId) -> Self {
        Self {
            content_stream_id,
            version: 0,
            lineage: None,
            removed: false,
            created_at: Utc::now(),
        }
    }

    pub fn forked_from(
        content_stream_id: ContentStreamId,
        source: ContentStreamId,
        source_version: u64,
    ) -> Self {
        Self {
            content_stream_id,
            version: 0,
            lineage: Some(StreamLineage {
                source,
                source_version,
            }),
            removed: false,
            created_at: Utc::now(),
        }
    }
}

/// Storage boundary. Implementations own durability and crash consistency;
/// the engine above owns event semantics. A successful `append` is durable
/// and visible to subsequent reads before the call returns, and the whole
/// batch lands atomically or not at all.
pub trait EventStorage: Send + Sync {
    /// Registers a new stream. Fails with `DuplicateStream` when the
    /// identifier is taken, leaving no partial state.
    fn create_stream(&self, meta: StreamMeta) -> Result<()>;

    fn stream(&self, id: &ContentStreamId) -> Result<Option<StreamMeta>>;

    fn streams(&self) -> Result<Vec<StreamMeta>>;

    /// Compare-and-append: fails with `ConcurrencyConflict` when
    /// `expected_version` does not match the stream tail, with the stream
    /// untouched. Records must arrive pre-versioned `expected_version + 1 ..`.
    /// Returns the new tail version.
    fn append(
        &self,
        id: &ContentStreamId,
        expected_version: u64,
        records: Vec<EventRecord>,
    ) -> Result<u64>;

    /// Ordered records with `version >= from_version`.
    fn read_range(&self, id: &ContentStreamId, from_version: u64) -> Result<Vec<EventRecord>>;

    /// Flips the removed flag; history stays readable for replay.
    fn mark_removed(&self, id: &ContentStreamId) -> Result<()>;

    /// Hard-deletes a stream and its records. Only used to roll back a
    /// failed fork, which must leave no trace.
    fn purge_stream(&self, id: &ContentStreamId) -> Result<()>;
}

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{EventRecord, EventStorage, StreamMeta};
use crate::error::{EngineError, Result};
use crate::identifier::ContentStreamId;

/// Heap-backed storage for tests and scratch repositories. Holds the same
/// contract as the durable backend: per-stream compare-and-append under one
/// lock, atomic batches.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    streams: BTreeMap<ContentStreamId, StreamMeta>,
    events: BTreeMap<ContentStreamId, Vec<EventRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStorage for MemoryStorage {
    fn create_stream(&self, meta: StreamMeta) -> Result<()> {
        let mut inner = self.inner.lock();
        let id = meta.content_stream_id.clone();
        if inner.streams.contains_key(&id) {
            return Err(EngineError::DuplicateStream {
                stream: id.to_string(),
            });
        }
        inner.streams.insert(id.clone(), meta);
        inner.events.insert(id, Vec::new());
        Ok(())
    }

    fn stream(&self, id: &ContentStreamId) -> Result<Option<StreamMeta>> {
        Ok(self.inner.lock().streams.get(id).cloned())
    }

    fn streams(&self) -> Result<Vec<StreamMeta>> {
        Ok(self.inner.lock().streams.values().cloned().collect())
    }

    fn append(
        &self,
        id: &ContentStreamId,
        expected_version: u64,
        records: Vec<EventRecord>,
    ) -> Result<u64> {
        let mut inner = self.inner.lock();
        let meta = inner
            .streams
            .get(id)
            .ok_or_else(|| EngineError::StreamNotFound {
                stream: id.to_string(),
            })?;
        if meta.removed {
            return Err(EngineError::StreamRemoved {
                stream: id.to_string(),
            });
        }
        if meta.version != expected_version {
            return Err(EngineError::ConcurrencyConflict {
                stream: id.to_string(),
                expected: expected_version,
                actual: meta.version,
            });
        }
        for (offset, record) in records.iter().enumerate() {
            let wanted = expected_version + offset as u64 + 1;
            if record.version != wanted {
                return Err(EngineError::Storage(format!(
                    "non-contiguous append to '{id}': record carries version {} where {wanted} \
                     was required",
                    record.version
                )));
            }
        }

        let new_version = expected_version + records.len() as u64;
        inner
            .events
            .get_mut(id)
            .expect("stream meta present implies event vector")
            .extend(records);
        inner
            .streams
            .get_mut(id)
            .expect("stream meta checked above")
            .version = new_version;
        Ok(new_version)
    }

    fn read_range(&self, id: &ContentStreamId, from_version: u64) -> Result<Vec<EventRecord>> {
        let inner = self.inner.lock();
        let records = inner
            .events
            .get(id)
            .ok_or_else(|| EngineError::StreamNotFound {
                stream: id.to_string(),
            })?;
        Ok(records
            .iter()
            .filter(|record| record.version >= from_version)
            .cloned()
            .collect())
    }

    fn mark_removed(&self, id: &ContentStreamId) -> Result<()> {
        let mut inner = self.inner.lock();
        let meta = inner
            .streams
            .get_mut(id)
            .ok_or_else(|| EngineError::StreamNotFound {
                stream: id.to_string(),
            })?;
        meta.removed = true;
        Ok(())
    }

    fn purge_stream(&self, id: &ContentStreamId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.streams.remove(id);
        inner.events.remove(id);
        Ok(())
    }
}

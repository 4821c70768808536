use std::path::PathBuf;

use parking_lot::Mutex;
use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, WriteBatch};

use super::{EventRecord, EventStorage, StreamMeta};
use crate::error::{EngineError, Result};
use crate::identifier::ContentStreamId;

const SEP: u8 = 0x1F;
const PREFIX_EVENT: &str = "evt";
const PREFIX_META: &str = "meta";

/// RocksDB-backed storage. Events live under `evt<SEP>stream<SEP><version BE>`
/// so a forward iterator yields them in append order; stream metadata lives
/// under `meta<SEP>stream`. Appends batch the records and the meta update into
/// one `WriteBatch` so the stream tail and its events can never diverge.
pub struct RocksStorage {
    db: DBWithThreadMode<MultiThreaded>,
    write_lock: Mutex<()>,
}

impl RocksStorage {
    pub fn open(path: PathBuf) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DBWithThreadMode::<MultiThreaded>::open(&options, path)
            .map_err(|err| EngineError::Storage(err.to_string()))?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn load_meta(&self, id: &ContentStreamId) -> Result<Option<StreamMeta>> {
        let value = self
            .db
            .get(meta_key(id))
            .map_err(|err| EngineError::Storage(err.to_string()))?;
        match value {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn require_meta(&self, id: &ContentStreamId) -> Result<StreamMeta> {
        self.load_meta(id)?.ok_or_else(|| EngineError::StreamNotFound {
            stream: id.to_string(),
        })
    }

    fn event_keys(&self, id: &ContentStreamId) -> Result<Vec<Vec<u8>>> {
        let prefix = event_prefix(id);
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_slice(), Direction::Forward));
        let mut keys = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|err| EngineError::Storage(err.to_string()))?;
            if !key.starts_with(prefix.as_slice()) {
                break;
            }
            keys.push(key.to_vec());
        }
        Ok(keys)
    }
}

impl EventStorage for RocksStorage {
    fn create_stream(&self, meta: StreamMeta) -> Result<()> {
        let _guard = self.write_lock.lock();
        let id = meta.content_stream_id.clone();
        if self.load_meta(&id)?.is_some() {
            return Err(EngineError::DuplicateStream {
                stream: id.to_string(),
            });
        }
        self.db
            .put(meta_key(&id), serde_json::to_vec(&meta)?)
            .map_err(|err| EngineError::Storage(err.to_string()))?;
        Ok(())
    }

    fn stream(&self, id: &ContentStreamId) -> Result<Option<StreamMeta>> {
        self.load_meta(id)
    }

    fn streams(&self) -> Result<Vec<StreamMeta>> {
        let prefix = meta_scan_prefix();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_slice(), Direction::Forward));
        let mut items = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|err| EngineError::Storage(err.to_string()))?;
            if !key.starts_with(prefix.as_slice()) {
                break;
            }
            let meta: StreamMeta = serde_json::from_slice(&value)?;
            items.push(meta);
        }
        Ok(items)
    }

    fn append(
        &self,
        id: &ContentStreamId,
        expected_version: u64,
        records: Vec<EventRecord>,
    ) -> Result<u64> {
        let _guard = self.write_lock.lock();

        let mut meta = self.require_meta(id)?;
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

        let mut batch = WriteBatch::default();
        for (offset, record) in records.iter().enumerate() {
            let wanted = expected_version + offset as u64 + 1;
            if record.version != wanted {
                return Err(EngineError::Storage(format!(
                    "non-contiguous append to '{id}': record carries version {} where {wanted} \
                     was required",
                    record.version
                )));
            }
            batch.put(event_key(id, record.version), serde_json::to_vec(record)?);
        }
        meta.version = expected_version + records.len() as u64;
        batch.put(meta_key(id), serde_json::to_vec(&meta)?);

        self.db
            .write(batch)
            .map_err(|err| EngineError::Storage(err.to_string()))?;
        Ok(meta.version)
    }

    fn read_range(&self, id: &ContentStreamId, from_version: u64) -> Result<Vec<EventRecord>> {
        self.require_meta(id)?;

        let prefix = event_prefix(id);
        let start = event_key(id, from_version);
        let iter = self
            .db
            .iterator(IteratorMode::From(start.as_slice(), Direction::Forward));

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|err| EngineError::Storage(err.to_string()))?;
            if !key.starts_with(prefix.as_slice()) {
                break;
            }
            let record: EventRecord = serde_json::from_slice(&value)?;
            records.push(record);
        }
        Ok(records)
    }

    fn mark_removed(&self, id: &ContentStreamId) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut meta = self.require_meta(id)?;
        meta.removed = true;
        self.db
            .put(meta_key(id), serde_json::to_vec(&meta)?)
            .map_err(|err| EngineError::Storage(err.to_string()))?;
        Ok(())
    }

    fn purge_stream(&self, id: &ContentStreamId) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        for key in self.event_keys(id)? {
            batch.delete(key);
        }
        batch.delete(meta_key(id));
        self.db
            .write(batch)
            .map_err(|err| EngineError::Storage(err.to_string()))?;
        Ok(())
    }
}

fn meta_scan_prefix() -> Vec<u8> {
    let mut prefix = PREFIX_META.as_bytes().to_vec();
    prefix.push(SEP);
    prefix
}

fn meta_key(id: &ContentStreamId) -> Vec<u8> {
    let mut key = meta_scan_prefix();
    key.extend_from_slice(id.as_str().as_bytes());
    key
}

fn event_prefix(id: &ContentStreamId) -> Vec<u8> {
    let mut prefix = PREFIX_EVENT.as_bytes().to_vec();
    prefix.push(SEP);
    prefix.extend_from_slice(id.as_str().as_bytes());
    prefix.push(SEP);
    prefix
}

fn event_key(id: &ContentStreamId, version: u64) -> Vec<u8> {
    let mut key = event_prefix(id);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use tracing::debug;

use crate::codec::EventCodec;
use crate::error::{EngineError, Result};
use crate::event::DomainEvent;
use crate::eventid::{EventId, EventIdGenerator, MAX_WORKER_ID};
use crate::identifier::ContentStreamId;
use crate::integrity::{hash_record, merkle_root};
use crate::observability::{self, EVENTS_APPENDED};
use crate::storage::{EventMetadata, EventRecord, EventStorage};

/// A decoded event together with the record metadata it was stored under.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event: DomainEvent,
    pub version: u64,
    pub event_id: EventId,
    pub recorded_at: DateTime<Utc>,
    pub hash: String,
}

/// The append-only event log: compare-and-append on top of the storage
/// boundary, decode-on-read through the codec. Appends are linearizable per
/// stream; different streams never contend above the storage layer.
pub struct EventLog {
    storage: Arc<dyn EventStorage>,
    codec: Arc<dyn EventCodec>,
    ids: Mutex<EventIdGenerator>,
}

impl EventLog {
    pub fn new(
        storage: Arc<dyn EventStorage>,
        codec: Arc<dyn EventCodec>,
        worker_id: u16,
    ) -> Result<Self> {
        if worker_id > MAX_WORKER_ID {
            return Err(EngineError::Config(format!(
                "event id worker {worker_id} exceeds maximum {MAX_WORKER_ID}"
            )));
        }
        Ok(Self {
            storage,
            codec,
            ids: Mutex::new(EventIdGenerator::new(worker_id)),
        })
    }

    pub fn storage(&self) -> &Arc<dyn EventStorage> {
        &self.storage
    }

    pub fn codec(&self) -> &Arc<dyn EventCodec> {
        &self.codec
    }

    /// Appends `events` after verifying the caller's view of the stream tail.
    /// Every event must name the stream it is appended to. Returns the new
    /// tail version; on `ConcurrencyConflict` the stream is untouched and the
    /// caller must re-read and re-derive its intent.
    pub fn append(
        &self,
        stream: &ContentStreamId,
        expected_version: u64,
        events: Vec<DomainEvent>,
    ) -> Result<u64> {
        let start = Instant::now();
        let result = self.append_inner(stream, expected_version, events);
        observability::record_store_op(
            "append",
            if result.is_ok() { "ok" } else { "err" },
            start.elapsed().as_secs_f64(),
        );
        result
    }

    fn append_inner(
        &self,
        stream: &ContentStreamId,
        expected_version: u64,
        events: Vec<DomainEvent>,
    ) -> Result<u64> {
        let mut records = Vec::with_capacity(events.len());
        for (offset, event) in events.iter().enumerate() {
            if event.content_stream_id() != stream {
                return Err(EngineError::StreamMismatch {
                    stream: stream.to_string(),
                    event_stream: event.content_stream_id().to_string(),
                });
            }
            let (event_type, payload) = self.codec.encode(event)?;
            let version = expected_version + offset as u64 + 1;
            let hash = hash_record(stream, version, event_type, &payload)?;
            records.push(EventRecord {
                content_stream_id: stream.clone(),
                version,
                event_type: event_type.to_string(),
                payload,
                metadata: EventMetadata {
                    event_id: self.ids.lock().next_id(),
                    recorded_at: Utc::now(),
                },
                hash,
            });
        }

        let appended = records.len() as u64;
        let version = self.storage.append(stream, expected_version, records)?;
        if appended > 0 {
            counter!(EVENTS_APPENDED).increment(appended);
        }
        debug!(stream = %stream, version, appended, "appended events");
        Ok(version)
    }

    pub fn read_all(&self, stream: &ContentStreamId) -> Result<Vec<EventEnvelope>> {
        self.read_from(stream, 1)
    }

    /// Decoded envelopes with `version >= from_version`, in append order.
    /// Unknown event types and invariant-violating payloads fail the read.
    pub fn read_from(
        &self,
        stream: &ContentStreamId,
        from_version: u64,
    ) -> Result<Vec<EventEnvelope>> {
        let records = self.storage.read_range(stream, from_version)?;
        records
            .into_iter()
            .map(|record| self.decode_record(record))
            .collect()
    }

    /// Like [`read_from`](Self::read_from), bounded above by `max_version`.
    /// Used by forks to replay against a fixed snapshot of the source.
    pub fn read_until(
        &self,
        stream: &ContentStreamId,
        max_version: u64,
    ) -> Result<Vec<EventEnvelope>> {
        let records = self.storage.read_range(stream, 1)?;
        records
            .into_iter()
            .take_while(|record| record.version <= max_version)
            .map(|record| self.decode_record(record))
            .collect()
    }

    fn decode_record(&self, record: EventRecord) -> Result<EventEnvelope> {
        let event = self.codec.decode(&record.event_type, &record.payload)?;
        Ok(EventEnvelope {
            event,
            version: record.version,
            event_id: record.metadata.event_id,
            recorded_at: record.metadata.recorded_at,
            hash: record.hash,
        })
    }

    /// Recomputes every record hash and the Merkle root over the stream.
    /// A record whose stored hash no longer matches its contents fails the
    /// verification.
    pub fn verify(&self, stream: &ContentStreamId) -> Result<String> {
        let records = self.storage.read_range(stream, 1)?;
        let mut hashes = Vec::with_capacity(records.len());
        for record in &records {
            let computed = hash_record(
                &record.content_stream_id,
                record.version,
                &record.event_type,
                &record.payload,
            )?;
            if computed != record.hash {
                return Err(EngineError::Storage(format!(
                    "hash mismatch in '{stream}' at version {}: stored record does not match \
                     its contents",
                    record.version
                )));
            }
            hashes.push(computed);
        }
        Ok(merkle_root(&hashes))
    }
}

//! Event-sourced content-graph engine.
//!
//! Content lives in node aggregates that vary per dimension space point
//! (language, region, ...). Every mutation is an immutable event appended to
//! a per-content-stream log under optimistic concurrency; streams fork
//! cheaply by re-emitting copyable events onto a new identifier, which is how
//! workspaces (`live` vs. a user's draft) share history without duplicating
//! it. Projections fold the log into readable aggregate state and can be
//! rebuilt from it at any time.

pub mod cache;
pub mod codec;
pub mod config;
pub mod dimension;
pub mod error;
pub mod event;
pub mod eventid;
pub mod identifier;
pub mod integrity;
pub mod log;
pub mod observability;
pub mod projection;
pub mod repository;
pub mod storage;
pub mod stream;

pub use codec::{EventCodec, JsonEventCodec};
pub use config::{load_or_default, RepositoryConfig, RepositoryConfigUpdate};
pub use dimension::{DimensionSpacePoint, DimensionSpacePointSet};
pub use error::{EngineError, Result};
pub use event::DomainEvent;
pub use eventid::{EventId, EventIdGenerator};
pub use identifier::{ContentStreamId, NodeAggregateId, NodeId, PropertyName};
pub use log::{EventEnvelope, EventLog};
pub use projection::{
    NodeAggregateProjection, NodeAggregateSnapshot, NodeVariant, RebuildOutcome,
};
pub use repository::ContentRepository;
pub use storage::{
    EventRecord, EventStorage, MemoryStorage, RocksStorage, StreamLineage, StreamMeta,
};
pub use stream::ContentStreamManager;

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("content stream '{stream}' already exists")]
    DuplicateStream { stream: String },
    #[error("content stream '{stream}' not found")]
    StreamNotFound { stream: String },
    #[error("content stream '{stream}' has been removed and cannot accept new events")]
    StreamRemoved { stream: String },
    #[error("event targets content stream '{event_stream}' but was appended to '{stream}'")]
    StreamMismatch {
        stream: String,
        event_stream: String,
    },
    #[error("append to '{stream}' expected version {expected} but the tail is at {actual}")]
    ConcurrencyConflict {
        stream: String,
        expected: u64,
        actual: u64,
    },
    #[error("unsupported event type '{0}'")]
    UnsupportedEventType(String),
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

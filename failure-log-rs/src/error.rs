//! Error types for the failure log
//!
//! Store errors are propagated to the caller untouched. Content problems in
//! stored records are never raised out of an enumeration; they surface as
//! [`MalformedRecord`] values alongside the records that did decode.

use thiserror::Error;

/// Result type for failure log operations
pub type Result<T> = std::result::Result<T, FailureLogError>;

/// Errors raised by a [`ListStore`](crate::store::ListStore) backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unknown store backend: {0}")]
    UnknownBackend(String),
}

/// Errors surfaced by [`FailureLog`](crate::FailureLog) operations
#[derive(Debug, Error)]
pub enum FailureLogError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("logging initialization failed: {0}")]
    Logging(String),
}

/// A stored entry that could not be decoded into a
/// [`FailureRecord`](crate::record::FailureRecord).
#[derive(Debug, Error)]
#[error("malformed failure record at ordinal {ordinal}: {cause}")]
pub struct MalformedRecord {
    /// Position of the entry in the list
    pub ordinal: usize,
    /// Bytes exactly as the store returned them
    pub raw: Vec<u8>,
    #[source]
    pub cause: serde_json::Error,
}

impl MalformedRecord {
    /// Stored bytes rendered lossily, for display in logs
    pub fn raw_lossy(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

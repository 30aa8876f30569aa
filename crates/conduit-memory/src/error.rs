//! Error types for the memory crate.

use thiserror::Error;

/// Errors that can occur while writing to or reading from the event log.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The log was closed; no further appends are accepted.
    #[error("event log is closed")]
    Closed,

    /// Event values must be JSON objects.
    #[error("event value must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

//! Common error types for tabstore.

use thiserror::Error;

/// Top-level error type for tabstore operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable driver is active, or the active driver refused readiness.
    #[error("Driver unavailable: {0}")]
    DriverUnavailable(String),

    /// A driver operation failed.
    #[error("Driver error: {0}")]
    Driver(String),

    /// A cross-tab payload could not be decoded.
    #[error("Malformed event payload: {0}")]
    MalformedEventPayload(String),

    /// A change listener panicked while handling an event.
    #[error("Listener failure: {0}")]
    ListenerFailure(String),

    /// The key is reserved for the cross-tab channel.
    #[error("Reserved key: {0}")]
    ReservedKey(String),

    /// The storage instance has been destroyed.
    #[error("Storage has been destroyed")]
    Destroyed,

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

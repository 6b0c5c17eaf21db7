//! Error types for repsync-core

use thiserror::Error;

/// Result type alias using repsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in repsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local store error
    #[error("Store error: {0}")]
    Store(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote API rejected a request
    #[error("Remote API error ({status}): {message}")]
    Gateway { status: u16, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Structural merge could not be performed
    #[error("Merge error: {0}")]
    Merge(String),

    /// Operation payload or state transition is invalid
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Operation not found in the queue
    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    /// Conflict not found in the holding area
    #[error("Conflict not found: {0}")]
    ConflictNotFound(String),

    /// Unknown entity kind name
    #[error("Unknown entity kind: {0}")]
    UnknownEntity(String),

    /// A sync pass is already running
    #[error("A sync pass is already in progress")]
    SyncInProgress,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

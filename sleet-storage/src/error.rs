//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Document exists but is not valid JSON.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend failure that may succeed on retry.
    #[error("transient storage error: {0}")]
    Transient(String),

    /// A relative path escaped the feed root or was otherwise malformed.
    #[error("invalid feed path: {0}")]
    InvalidPath(String),
}

impl StorageError {
    /// Returns true if the operation may succeed when retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

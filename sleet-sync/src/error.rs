//! Error types for the synchronization engine.

use sleet_storage::StorageError;
use sleet_types::PackageIdentity;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while synchronizing a feed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed or missing feed configuration (root document,
    /// requirements, capabilities).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The feed format or a required capability blocks this engine.
    /// Never retried.
    #[error("feed blocked: {reason}")]
    VersionBlocked { reason: String },

    /// A requested add is already present in the feed.
    #[error("package {identity} already exists in the feed")]
    DuplicatePackage { identity: PackageIdentity },

    /// A requested remove does not exist in the feed.
    #[error("package {identity} was not found in the feed")]
    PackageNotFound { identity: PackageIdentity },

    /// A storage operation failed after the backend's own retries.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An index service failed after earlier services already wrote.
    /// Recovery is re-running the same operation; applies are idempotent.
    #[error("service {service} failed to apply the operation: {source}")]
    PartialApplication {
        service: &'static str,
        #[source]
        source: Box<SyncError>,
    },

    /// The synchronization pass was cancelled before completing.
    /// Already-written documents are left in place.
    #[error("operation cancelled")]
    Cancelled,
}

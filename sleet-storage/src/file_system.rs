//! Abstract storage contract consumed by the feed engine.
//!
//! Every backend exposes the same surface; no backend-specific behavior
//! leaks into the engine.

use crate::StorageResult;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// An addressable JSON document within a feed.
#[async_trait]
pub trait StorageFile: Send + Sync {
    /// Canonical URI of this document, for logs and telemetry.
    fn uri(&self) -> String;

    /// Returns whether the document exists.
    async fn exists(&self) -> StorageResult<bool>;

    /// Reads the document as JSON. Returns `None` if absent; a missing
    /// document is never an error.
    async fn read_json(&self) -> StorageResult<Option<Value>>;

    /// Writes the document, replacing any previous content. A concurrent
    /// reader observes either the old or the new content, never a partial
    /// write.
    async fn write_json(&self, value: &Value) -> StorageResult<()>;

    /// Deletes the document. Deleting an absent document is a no-op.
    async fn delete(&self) -> StorageResult<()>;
}

/// A feed root: a file system of JSON documents keyed by relative path.
pub trait StorageFileSystem: Send + Sync {
    /// Root URI of the feed.
    fn root_uri(&self) -> &str;

    /// Resolves a relative path to a document handle. Fails if the path
    /// is absolute or escapes the root.
    fn get(&self, relative_path: &str) -> StorageResult<Arc<dyn StorageFile>>;
}

/// Rejects path segments that would escape the feed root.
pub(crate) fn validate_relative_path(relative_path: &str) -> StorageResult<()> {
    use crate::StorageError;

    if relative_path.is_empty() {
        return Err(StorageError::InvalidPath("empty path".to_string()));
    }
    if relative_path.starts_with('/') || relative_path.contains('\\') {
        return Err(StorageError::InvalidPath(relative_path.to_string()));
    }
    if relative_path.split('/').any(|seg| seg == ".." || seg.is_empty()) {
        return Err(StorageError::InvalidPath(relative_path.to_string()));
    }
    Ok(())
}

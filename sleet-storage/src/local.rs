//! Local-disk backend.

use crate::file_system::validate_relative_path;
use crate::retry::{with_retry, RetryPolicy};
use crate::{StorageError, StorageFile, StorageFileSystem, StorageResult};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Feed stored as JSON files under a local directory.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    root_uri: String,
    retry: RetryPolicy,
}

impl LocalFileSystem {
    /// Creates a backend rooted at `root`. The directory does not need to
    /// exist yet; it is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root_uri = format!("file://{}/", root.display());
        Self {
            root,
            root_uri,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the transient-failure retry budget.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the root directory on disk.
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root
    }
}

impl StorageFileSystem for LocalFileSystem {
    fn root_uri(&self) -> &str {
        &self.root_uri
    }

    fn get(&self, relative_path: &str) -> StorageResult<Arc<dyn StorageFile>> {
        validate_relative_path(relative_path)?;
        Ok(Arc::new(LocalFile {
            path: self.root.join(relative_path),
            uri: format!("{}{relative_path}", self.root_uri),
            retry: self.retry.clone(),
        }))
    }
}

/// Maps interrupted or timed-out I/O to the retryable error class.
fn classify_io(e: std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            StorageError::Transient(e.to_string())
        }
        _ => StorageError::Io(e),
    }
}

struct LocalFile {
    path: PathBuf,
    uri: String,
    retry: RetryPolicy,
}

impl LocalFile {
    async fn read_json_once(&self) -> StorageResult<Option<Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(classify_io(e)),
        }
    }

    async fn write_json_once(&self, value: &Value) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(classify_io)?;
        }

        // Write to a sibling temp file and rename so a concurrent reader
        // never sees a half-written document.
        let tmp = self
            .path
            .with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&tmp, &bytes).await.map_err(classify_io)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(classify_io)?;

        debug!("wrote {} ({} bytes)", self.uri, bytes.len());
        Ok(())
    }

    async fn delete_once(&self) -> StorageResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(classify_io(e)),
        }
    }
}

#[async_trait]
impl StorageFile for LocalFile {
    fn uri(&self) -> String {
        self.uri.clone()
    }

    async fn exists(&self) -> StorageResult<bool> {
        with_retry(&self.retry, || async {
            tokio::fs::try_exists(&self.path).await.map_err(classify_io)
        })
        .await
    }

    async fn read_json(&self) -> StorageResult<Option<Value>> {
        with_retry(&self.retry, || self.read_json_once()).await
    }

    async fn write_json(&self, value: &Value) -> StorageResult<()> {
        with_retry(&self.retry, || self.write_json_once(value)).await
    }

    async fn delete(&self) -> StorageResult<()> {
        with_retry(&self.retry, || self.delete_once()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_io_is_transient() {
        let e = classify_io(std::io::Error::new(ErrorKind::Interrupted, "signal"));
        assert!(e.is_transient());
    }

    #[test]
    fn permission_denied_is_permanent() {
        let e = classify_io(std::io::Error::from(ErrorKind::PermissionDenied));
        assert!(!e.is_transient());
    }
}

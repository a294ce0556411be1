//! In-memory backend for tests and dry runs.

use crate::file_system::validate_relative_path;
use crate::{StorageFile, StorageFileSystem, StorageResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type DocumentMap = Arc<RwLock<HashMap<String, Value>>>;

/// Feed held entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    documents: DocumentMap,
}

impl MemoryFileSystem {
    /// Creates an empty in-memory feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the relative paths of all documents currently present,
    /// sorted for stable assertions.
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.documents.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl StorageFileSystem for MemoryFileSystem {
    fn root_uri(&self) -> &str {
        "memory:///"
    }

    fn get(&self, relative_path: &str) -> StorageResult<Arc<dyn StorageFile>> {
        validate_relative_path(relative_path)?;
        Ok(Arc::new(MemoryFile {
            documents: self.documents.clone(),
            path: relative_path.to_string(),
        }))
    }
}

struct MemoryFile {
    documents: DocumentMap,
    path: String,
}

#[async_trait]
impl StorageFile for MemoryFile {
    fn uri(&self) -> String {
        format!("memory:///{}", self.path)
    }

    async fn exists(&self) -> StorageResult<bool> {
        Ok(self.documents.read().await.contains_key(&self.path))
    }

    async fn read_json(&self) -> StorageResult<Option<Value>> {
        Ok(self.documents.read().await.get(&self.path).cloned())
    }

    async fn write_json(&self, value: &Value) -> StorageResult<()> {
        self.documents
            .write()
            .await
            .insert(self.path.clone(), value.clone());
        Ok(())
    }

    async fn delete(&self) -> StorageResult<()> {
        self.documents.write().await.remove(&self.path);
        Ok(())
    }
}

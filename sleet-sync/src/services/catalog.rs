//! Catalog: append-only chronological log of add/remove events.
//!
//! Updated first: if a later service fails, the other indexes can be
//! reconciled against this audit trail.

use crate::services::{read_json_tracked, write_json_tracked, IndexService};
use crate::{ChangeContext, PerfTracker, SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sleet_storage::StorageFileSystem;
use sleet_types::PackageIdentity;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Catalog index document, relative to the feed root.
pub const CATALOG_INDEX_PATH: &str = "catalog/index.json";

/// Direction of one logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogOperation {
    Added,
    Removed,
}

/// One logged add/remove event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub commit_id: Uuid,
    pub commit_time: DateTime<Utc>,
    pub id: String,
    pub version: String,
    pub operation: CatalogOperation,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    commits: Vec<CatalogEntry>,
}

/// Maintains the append-only event log.
pub struct CatalogService {
    file_system: Arc<dyn StorageFileSystem>,
    tracker: Arc<dyn PerfTracker>,
}

impl CatalogService {
    pub fn new(file_system: Arc<dyn StorageFileSystem>, tracker: Arc<dyn PerfTracker>) -> Self {
        Self {
            file_system,
            tracker,
        }
    }

    /// Writes an empty log. Used when a feed is created.
    pub async fn initialize(&self) -> SyncResult<()> {
        let file = self.file_system.get(CATALOG_INDEX_PATH)?;
        let doc = serde_json::to_value(CatalogDocument::default())
            .map_err(sleet_storage::StorageError::from)?;
        write_json_tracked(&file, &doc, &self.tracker).await
    }

    /// All logged events in chronological order.
    pub async fn entries(&self) -> SyncResult<Vec<CatalogEntry>> {
        Ok(self.load().await?.commits)
    }

    async fn load(&self) -> SyncResult<CatalogDocument> {
        let file = self.file_system.get(CATALOG_INDEX_PATH)?;
        match read_json_tracked(&file, &self.tracker).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| SyncError::Configuration(format!("invalid catalog index: {e}"))),
            None => Ok(CatalogDocument::default()),
        }
    }
}

#[async_trait]
impl IndexService for CatalogService {
    fn name(&self) -> &'static str {
        "Catalog"
    }

    async fn apply_operation(&self, ctx: &ChangeContext) -> SyncResult<()> {
        let mut doc = self.load().await?;

        // Re-applying the same context after a partial failure must not
        // duplicate log entries.
        if doc.commits.iter().any(|c| c.commit_id == ctx.commit_id()) {
            debug!("catalog already holds commit {}", ctx.commit_id());
            return Ok(());
        }

        let mut removed: Vec<&PackageIdentity> = ctx.to_remove().iter().collect();
        removed.sort();
        for identity in removed {
            doc.commits.push(CatalogEntry {
                commit_id: ctx.commit_id(),
                commit_time: ctx.commit_time(),
                id: identity.id.clone(),
                version: identity.version.to_string(),
                operation: CatalogOperation::Removed,
            });
        }
        for add in ctx.to_add() {
            doc.commits.push(CatalogEntry {
                commit_id: ctx.commit_id(),
                commit_time: ctx.commit_time(),
                id: add.identity.id.clone(),
                version: add.identity.version.to_string(),
                operation: CatalogOperation::Added,
            });
        }

        let file = self.file_system.get(CATALOG_INDEX_PATH)?;
        let value =
            serde_json::to_value(doc).map_err(sleet_storage::StorageError::from)?;
        write_json_tracked(&file, &value, &self.tracker).await
    }
}

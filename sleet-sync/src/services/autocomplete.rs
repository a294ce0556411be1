//! Autocomplete index: the flat list of package ids.

use crate::services::{read_json_tracked, write_json_tracked, IndexService, ValidatableService};
use crate::{ChangeContext, PerfTracker, SyncError, SyncResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sleet_storage::StorageFileSystem;
use sleet_types::PackageIdentity;
use std::collections::HashSet;
use std::sync::Arc;

/// Autocomplete index document, relative to the feed root.
pub const AUTOCOMPLETE_INDEX_PATH: &str = "autocomplete/query.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoCompleteDocument {
    #[serde(default)]
    total_hits: usize,
    #[serde(default)]
    data: Vec<String>,
}

/// Maintains the id list served for autocomplete queries.
pub struct AutoCompleteService {
    file_system: Arc<dyn StorageFileSystem>,
    tracker: Arc<dyn PerfTracker>,
}

impl AutoCompleteService {
    pub fn new(file_system: Arc<dyn StorageFileSystem>, tracker: Arc<dyn PerfTracker>) -> Self {
        Self {
            file_system,
            tracker,
        }
    }

    /// Writes an empty index. Used when a feed is created.
    pub async fn initialize(&self) -> SyncResult<()> {
        let file = self.file_system.get(AUTOCOMPLETE_INDEX_PATH)?;
        let doc = serde_json::to_value(AutoCompleteDocument::default())
            .map_err(sleet_storage::StorageError::from)?;
        write_json_tracked(&file, &doc, &self.tracker).await
    }

    /// Current id list, for stats and tests.
    pub async fn ids(&self) -> SyncResult<Vec<String>> {
        Ok(self.load().await?.data)
    }

    async fn load(&self) -> SyncResult<AutoCompleteDocument> {
        let file = self.file_system.get(AUTOCOMPLETE_INDEX_PATH)?;
        match read_json_tracked(&file, &self.tracker).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| SyncError::Configuration(format!("invalid autocomplete index: {e}"))),
            None => Ok(AutoCompleteDocument::default()),
        }
    }
}

#[async_trait]
impl IndexService for AutoCompleteService {
    fn name(&self) -> &'static str {
        "AutoComplete"
    }

    async fn apply_operation(&self, ctx: &ChangeContext) -> SyncResult<()> {
        let mut doc = self.load().await?;
        let after = ctx.identities_after();

        for id_lower in ctx.touched_ids() {
            let still_present = after.iter().any(|i| i.id_lowercase() == id_lower);
            let listed = doc.data.iter().any(|d| d.eq_ignore_ascii_case(&id_lower));

            if still_present && !listed {
                // Prefer the display casing from the add that introduced it.
                let display = ctx
                    .to_add()
                    .iter()
                    .find(|a| a.identity.id_lowercase() == id_lower)
                    .map(|a| a.identity.id.clone())
                    .unwrap_or(id_lower.clone());
                doc.data.push(display);
            } else if !still_present {
                doc.data.retain(|d| !d.eq_ignore_ascii_case(&id_lower));
            }
        }

        doc.data
            .sort_by(|a, b| a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()));
        doc.total_hits = doc.data.len();

        let file = self.file_system.get(AUTOCOMPLETE_INDEX_PATH)?;
        let value = serde_json::to_value(doc).map_err(sleet_storage::StorageError::from)?;
        write_json_tracked(&file, &value, &self.tracker).await
    }
}

#[async_trait]
impl ValidatableService for AutoCompleteService {
    async fn validate(
        &self,
        authoritative: &HashSet<PackageIdentity>,
    ) -> SyncResult<Vec<String>> {
        let expected: HashSet<String> = authoritative
            .iter()
            .map(PackageIdentity::id_lowercase)
            .collect();
        let actual: HashSet<String> = self
            .load()
            .await?
            .data
            .iter()
            .map(|d| d.to_ascii_lowercase())
            .collect();

        let mut diagnostics = Vec::new();
        for id in expected.difference(&actual) {
            diagnostics.push(format!("AutoComplete: missing id {id}"));
        }
        for id in actual.difference(&expected) {
            diagnostics.push(format!("AutoComplete: orphan id {id}"));
        }
        Ok(diagnostics)
    }
}

//! Search index: one document per package id with its version list and
//! latest metadata.

use crate::services::{read_json_tracked, write_json_tracked, IndexService, ValidatableService};
use crate::{ChangeContext, PerfTracker, SyncError, SyncResult};
use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use sleet_storage::StorageFileSystem;
use sleet_types::PackageIdentity;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Search index document, relative to the feed root.
pub const SEARCH_INDEX_PATH: &str = "search/query.json";

/// One package in the search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchDocument {
    #[serde(default)]
    total_hits: usize,
    #[serde(default)]
    data: Vec<SearchResult>,
}

/// Maintains the flat search index.
pub struct SearchService {
    file_system: Arc<dyn StorageFileSystem>,
    tracker: Arc<dyn PerfTracker>,
}

impl SearchService {
    pub fn new(file_system: Arc<dyn StorageFileSystem>, tracker: Arc<dyn PerfTracker>) -> Self {
        Self {
            file_system,
            tracker,
        }
    }

    /// Writes an empty index. Used when a feed is created.
    pub async fn initialize(&self) -> SyncResult<()> {
        let file = self.file_system.get(SEARCH_INDEX_PATH)?;
        let doc = serde_json::to_value(SearchDocument::default())
            .map_err(sleet_storage::StorageError::from)?;
        write_json_tracked(&file, &doc, &self.tracker).await
    }

    /// Current search results, for stats and tests.
    pub async fn results(&self) -> SyncResult<Vec<SearchResult>> {
        Ok(self.load().await?.data)
    }

    async fn load(&self) -> SyncResult<SearchDocument> {
        let file = self.file_system.get(SEARCH_INDEX_PATH)?;
        match read_json_tracked(&file, &self.tracker).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| SyncError::Configuration(format!("invalid search index: {e}"))),
            None => Ok(SearchDocument::default()),
        }
    }
}

fn same_version(raw: &str, version: &Version) -> bool {
    Version::parse(raw)
        .map(|v| v.cmp_precedence(version) == Ordering::Equal)
        .unwrap_or(false)
}

#[async_trait]
impl IndexService for SearchService {
    fn name(&self) -> &'static str {
        "Search"
    }

    async fn apply_operation(&self, ctx: &ChangeContext) -> SyncResult<()> {
        let mut doc = self.load().await?;

        for removed in ctx.to_remove() {
            let id_lower = removed.id_lowercase();
            for result in doc
                .data
                .iter_mut()
                .filter(|r| r.id.eq_ignore_ascii_case(&id_lower))
            {
                result
                    .versions
                    .retain(|raw| !same_version(raw, &removed.version));
            }
        }
        doc.data.retain(|r| !r.versions.is_empty());

        for add in ctx.to_add() {
            let version = add.identity.version.to_string();
            match doc
                .data
                .iter_mut()
                .find(|r| r.id.eq_ignore_ascii_case(&add.identity.id))
            {
                Some(result) => {
                    result.id = add.identity.id.clone();
                    if !result
                        .versions
                        .iter()
                        .any(|raw| same_version(raw, &add.identity.version))
                    {
                        result.versions.push(version);
                    }
                    result.description = add.metadata.description.clone();
                    result.authors = add.metadata.authors.clone();
                    result.tags = add.metadata.tags.clone();
                }
                None => doc.data.push(SearchResult {
                    id: add.identity.id.clone(),
                    versions: vec![version],
                    description: add.metadata.description.clone(),
                    authors: add.metadata.authors.clone(),
                    tags: add.metadata.tags.clone(),
                }),
            }
        }

        for result in &mut doc.data {
            result.versions.sort_by(|a, b| {
                match (Version::parse(a), Version::parse(b)) {
                    (Ok(va), Ok(vb)) => va.cmp_precedence(&vb),
                    _ => a.cmp(b),
                }
            });
        }
        doc.data
            .sort_by(|a, b| a.id.to_ascii_lowercase().cmp(&b.id.to_ascii_lowercase()));
        doc.total_hits = doc.data.len();

        let file = self.file_system.get(SEARCH_INDEX_PATH)?;
        let value = serde_json::to_value(doc).map_err(sleet_storage::StorageError::from)?;
        write_json_tracked(&file, &value, &self.tracker).await
    }
}

#[async_trait]
impl ValidatableService for SearchService {
    async fn validate(
        &self,
        authoritative: &HashSet<PackageIdentity>,
    ) -> SyncResult<Vec<String>> {
        let mut expected: HashMap<String, HashSet<String>> = HashMap::new();
        for identity in authoritative {
            expected
                .entry(identity.id_lowercase())
                .or_default()
                .insert(identity.version.to_string());
        }

        let doc = self.load().await?;
        let mut actual: HashMap<String, HashSet<String>> = HashMap::new();
        for result in &doc.data {
            actual
                .entry(result.id.to_ascii_lowercase())
                .or_default()
                .extend(result.versions.iter().cloned());
        }

        let mut diagnostics = Vec::new();
        for (id, versions) in &expected {
            match actual.get(id) {
                None => diagnostics.push(format!("Search: missing package {id}")),
                Some(found) => {
                    for version in versions.difference(found) {
                        diagnostics.push(format!("Search: {id} is missing version {version}"));
                    }
                    for version in found.difference(versions) {
                        diagnostics.push(format!("Search: {id} lists orphan version {version}"));
                    }
                }
            }
        }
        for id in actual.keys() {
            if !expected.contains_key(id) {
                diagnostics.push(format!("Search: orphan package {id}"));
            }
        }
        Ok(diagnostics)
    }
}

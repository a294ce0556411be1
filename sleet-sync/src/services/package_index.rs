//! Master package index: the authoritative identity list.
//!
//! Applied last so its success doubles as the commit signal: every other
//! index can be reconciled against this document after a partial failure.

use crate::services::{read_json_tracked, write_json_tracked, IndexService};
use crate::{ChangeContext, PerfTracker, SyncError, SyncResult};
use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use sleet_storage::StorageFileSystem;
use sleet_types::PackageIdentity;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Authoritative index document, relative to the feed root.
pub const PACKAGE_INDEX_PATH: &str = "sleet.packageindex.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PackageIndexDocument {
    /// Lower-cased package id -> versions sorted by precedence.
    #[serde(default)]
    packages: BTreeMap<String, Vec<String>>,
}

/// Maintains the authoritative id -> version-list map.
pub struct PackageIndexService {
    file_system: Arc<dyn StorageFileSystem>,
    tracker: Arc<dyn PerfTracker>,
}

impl PackageIndexService {
    pub fn new(file_system: Arc<dyn StorageFileSystem>, tracker: Arc<dyn PerfTracker>) -> Self {
        Self {
            file_system,
            tracker,
        }
    }

    /// Writes an empty index. Used when a feed is created.
    pub async fn initialize(&self) -> SyncResult<()> {
        let file = self.file_system.get(PACKAGE_INDEX_PATH)?;
        let doc = serde_json::to_value(PackageIndexDocument::default())
            .map_err(sleet_storage::StorageError::from)?;
        write_json_tracked(&file, &doc, &self.tracker).await
    }

    /// Loads the full identity set. An absent document is an empty feed.
    pub async fn load_identities(&self) -> SyncResult<HashSet<PackageIdentity>> {
        let file = self.file_system.get(PACKAGE_INDEX_PATH)?;
        let Some(value) = read_json_tracked(&file, &self.tracker).await? else {
            return Ok(HashSet::new());
        };
        let doc: PackageIndexDocument = serde_json::from_value(value)
            .map_err(|e| SyncError::Configuration(format!("invalid package index: {e}")))?;

        let mut identities = HashSet::new();
        for (id, versions) in doc.packages {
            for raw in versions {
                let version = Version::parse(&raw).map_err(|e| {
                    SyncError::Configuration(format!(
                        "package index holds invalid version `{raw}` for `{id}`: {e}"
                    ))
                })?;
                identities.insert(PackageIdentity::new(id.clone(), version));
            }
        }
        Ok(identities)
    }

    fn render(identities: &HashSet<PackageIdentity>) -> PackageIndexDocument {
        let mut grouped: BTreeMap<String, Vec<&PackageIdentity>> = BTreeMap::new();
        for identity in identities {
            grouped
                .entry(identity.id_lowercase())
                .or_default()
                .push(identity);
        }

        let mut packages = BTreeMap::new();
        for (id, mut versions) in grouped {
            versions.sort();
            packages.insert(
                id,
                versions.iter().map(|i| i.version.to_string()).collect(),
            );
        }
        PackageIndexDocument { packages }
    }
}

#[async_trait]
impl IndexService for PackageIndexService {
    fn name(&self) -> &'static str {
        "PackageIndex"
    }

    async fn apply_operation(&self, ctx: &ChangeContext) -> SyncResult<()> {
        let mut identities = self.load_identities().await?;
        for removed in ctx.to_remove() {
            identities.remove(removed);
        }
        for add in ctx.to_add() {
            identities.replace(add.identity.clone());
        }

        let file = self.file_system.get(PACKAGE_INDEX_PATH)?;
        let doc = serde_json::to_value(Self::render(&identities))
            .map_err(sleet_storage::StorageError::from)?;
        write_json_tracked(&file, &doc, &self.tracker).await
    }
}

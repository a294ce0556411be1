//! Flat container: per-id raw file listing addressable by id/version.

use crate::services::{
    delete_tracked, read_json_tracked, write_json_tracked, IndexService, ValidatableService,
};
use crate::{ChangeContext, PerfTracker, SyncError, SyncResult};
use async_trait::async_trait;
use futures::future::try_join_all;
use semver::Version;
use serde::{Deserialize, Serialize};
use sleet_storage::StorageFileSystem;
use sleet_types::PackageIdentity;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn index_path(id_lower: &str) -> String {
    format!("flatcontainer/{id_lower}/index.json")
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FlatContainerDocument {
    #[serde(default)]
    versions: Vec<String>,
}

/// Maintains the per-id version listing used for direct content downloads.
pub struct FlatContainerService {
    file_system: Arc<dyn StorageFileSystem>,
    tracker: Arc<dyn PerfTracker>,
}

impl FlatContainerService {
    pub fn new(file_system: Arc<dyn StorageFileSystem>, tracker: Arc<dyn PerfTracker>) -> Self {
        Self {
            file_system,
            tracker,
        }
    }

    /// Deletes the per-id document so a rebuild starts from scratch.
    pub(crate) async fn reset_for_id(&self, id_lower: &str) -> SyncResult<()> {
        let file = self.file_system.get(&index_path(id_lower))?;
        delete_tracked(&file, &self.tracker).await
    }

    async fn load(&self, id_lower: &str) -> SyncResult<FlatContainerDocument> {
        let file = self.file_system.get(&index_path(id_lower))?;
        match read_json_tracked(&file, &self.tracker).await? {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                SyncError::Configuration(format!(
                    "invalid flat container index for {id_lower}: {e}"
                ))
            }),
            None => Ok(FlatContainerDocument::default()),
        }
    }

    async fn apply_for_id(&self, id_lower: &str, ctx: &ChangeContext) -> SyncResult<()> {
        let mut doc = self.load(id_lower).await?;

        doc.versions.retain(|raw| {
            !ctx.to_remove()
                .iter()
                .any(|r| r.id_lowercase() == id_lower && same_version(raw, &r.version))
        });

        for add in ctx
            .to_add()
            .iter()
            .filter(|a| a.identity.id_lowercase() == id_lower)
        {
            if !doc
                .versions
                .iter()
                .any(|raw| same_version(raw, &add.identity.version))
            {
                doc.versions.push(add.identity.version.to_string());
            }
        }

        let file = self.file_system.get(&index_path(id_lower))?;
        if doc.versions.is_empty() {
            return delete_tracked(&file, &self.tracker).await;
        }

        doc.versions.sort_by(|a, b| match (Version::parse(a), Version::parse(b)) {
            (Ok(va), Ok(vb)) => va.cmp_precedence(&vb),
            _ => a.cmp(b),
        });
        let value = serde_json::to_value(doc).map_err(sleet_storage::StorageError::from)?;
        write_json_tracked(&file, &value, &self.tracker).await
    }
}

fn same_version(raw: &str, version: &Version) -> bool {
    Version::parse(raw)
        .map(|v| v.cmp_precedence(version) == Ordering::Equal)
        .unwrap_or(false)
}

#[async_trait]
impl IndexService for FlatContainerService {
    fn name(&self) -> &'static str {
        "FlatContainer"
    }

    async fn apply_operation(&self, ctx: &ChangeContext) -> SyncResult<()> {
        let ids = ctx.touched_ids();
        try_join_all(ids.iter().map(|id| self.apply_for_id(id, ctx))).await?;
        Ok(())
    }
}

#[async_trait]
impl ValidatableService for FlatContainerService {
    async fn validate(
        &self,
        authoritative: &HashSet<PackageIdentity>,
    ) -> SyncResult<Vec<String>> {
        let mut grouped: HashMap<String, HashSet<String>> = HashMap::new();
        for identity in authoritative {
            grouped
                .entry(identity.id_lowercase())
                .or_default()
                .insert(identity.version.to_string());
        }

        let mut diagnostics = Vec::new();
        for (id, expected) in &grouped {
            let doc = self.load(id).await?;
            let actual: HashSet<String> = doc.versions.iter().cloned().collect();
            for version in expected.difference(&actual) {
                diagnostics.push(format!("FlatContainer: {id} is missing version {version}"));
            }
            for version in actual.difference(expected) {
                diagnostics.push(format!("FlatContainer: {id} lists orphan version {version}"));
            }
        }
        Ok(diagnostics)
    }

    async fn validate_candidate_ids(
        &self,
        candidate_ids: &HashSet<String>,
        authoritative: &HashSet<PackageIdentity>,
    ) -> SyncResult<Vec<String>> {
        let live: HashSet<String> = authoritative
            .iter()
            .map(PackageIdentity::id_lowercase)
            .collect();

        let mut diagnostics = Vec::new();
        for id in candidate_ids {
            if live.contains(id) {
                continue;
            }
            if !self.load(id).await?.versions.is_empty() {
                diagnostics.push(format!("FlatContainer: orphan index for {id}"));
            }
        }
        Ok(diagnostics)
    }
}

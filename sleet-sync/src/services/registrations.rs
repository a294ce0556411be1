//! Registrations: per-package-id documents listing every version and its
//! metadata.

use crate::services::{
    delete_tracked, read_json_tracked, write_json_tracked, IndexService, ValidatableService,
};
use crate::{ChangeContext, PerfTracker, SyncError, SyncResult};
use async_trait::async_trait;
use futures::future::try_join_all;
use semver::Version;
use serde::{Deserialize, Serialize};
use sleet_storage::StorageFileSystem;
use sleet_types::{PackageIdentity, PackageMetadata};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn index_path(id_lower: &str) -> String {
    format!("registrations/{id_lower}/index.json")
}

/// One version listed in a registration index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationEntry {
    pub version: String,
    #[serde(default)]
    pub metadata: PackageMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistrationDocument {
    #[serde(default)]
    id: String,
    #[serde(default)]
    versions: Vec<RegistrationEntry>,
}

/// Maintains the per-id registration documents.
pub struct RegistrationsService {
    file_system: Arc<dyn StorageFileSystem>,
    tracker: Arc<dyn PerfTracker>,
}

impl RegistrationsService {
    pub fn new(file_system: Arc<dyn StorageFileSystem>, tracker: Arc<dyn PerfTracker>) -> Self {
        Self {
            file_system,
            tracker,
        }
    }

    /// Metadata recorded for one package id, keyed by version string.
    /// Used when derived indexes are rebuilt.
    pub async fn entries_for_id(&self, id_lower: &str) -> SyncResult<Vec<RegistrationEntry>> {
        Ok(self.load(id_lower).await?.versions)
    }

    /// Deletes the per-id document so a rebuild starts from scratch.
    pub(crate) async fn reset_for_id(&self, id_lower: &str) -> SyncResult<()> {
        let file = self.file_system.get(&index_path(id_lower))?;
        delete_tracked(&file, &self.tracker).await
    }

    async fn load(&self, id_lower: &str) -> SyncResult<RegistrationDocument> {
        let file = self.file_system.get(&index_path(id_lower))?;
        match read_json_tracked(&file, &self.tracker).await? {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                SyncError::Configuration(format!("invalid registration index for {id_lower}: {e}"))
            }),
            None => Ok(RegistrationDocument::default()),
        }
    }

    async fn apply_for_id(&self, id_lower: &str, ctx: &ChangeContext) -> SyncResult<()> {
        let mut doc = self.load(id_lower).await?;

        doc.versions.retain(|entry| {
            !version_matches_any(&entry.version, id_lower, ctx.to_remove().iter())
        });

        for add in ctx
            .to_add()
            .iter()
            .filter(|a| a.identity.id_lowercase() == id_lower)
        {
            doc.id = add.identity.id.clone();
            let entry = RegistrationEntry {
                version: add.identity.version.to_string(),
                metadata: add.metadata.clone(),
                content_path: add.content_path.clone(),
            };
            match doc.versions.iter_mut().find(|e| {
                same_version(&e.version, &add.identity.version)
            }) {
                Some(existing) => *existing = entry,
                None => doc.versions.push(entry),
            }
        }

        let file = self.file_system.get(&index_path(id_lower))?;
        if doc.versions.is_empty() {
            return delete_tracked(&file, &self.tracker).await;
        }

        sort_entries(&mut doc.versions);
        let value = serde_json::to_value(doc).map_err(sleet_storage::StorageError::from)?;
        write_json_tracked(&file, &value, &self.tracker).await
    }
}

fn same_version(raw: &str, version: &Version) -> bool {
    Version::parse(raw)
        .map(|v| v.cmp_precedence(version) == Ordering::Equal)
        .unwrap_or(false)
}

fn version_matches_any<'a>(
    raw: &str,
    id_lower: &str,
    mut removals: impl Iterator<Item = &'a PackageIdentity>,
) -> bool {
    removals.any(|r| r.id_lowercase() == id_lower && same_version(raw, &r.version))
}

fn sort_entries(entries: &mut [RegistrationEntry]) {
    entries.sort_by(|a, b| match (Version::parse(&a.version), Version::parse(&b.version)) {
        (Ok(va), Ok(vb)) => va.cmp_precedence(&vb),
        _ => a.version.cmp(&b.version),
    });
}

#[async_trait]
impl IndexService for RegistrationsService {
    fn name(&self) -> &'static str {
        "Registrations"
    }

    async fn apply_operation(&self, ctx: &ChangeContext) -> SyncResult<()> {
        // Per-id documents are disjoint files; update them concurrently.
        let ids = ctx.touched_ids();
        try_join_all(ids.iter().map(|id| self.apply_for_id(id, ctx))).await?;
        Ok(())
    }
}

#[async_trait]
impl ValidatableService for RegistrationsService {
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
            if doc.versions.is_empty() {
                diagnostics.push(format!("Registrations: missing index for {id}"));
                continue;
            }
            let actual: HashSet<String> =
                doc.versions.iter().map(|e| e.version.clone()).collect();
            for version in expected.difference(&actual) {
                diagnostics.push(format!("Registrations: {id} is missing version {version}"));
            }
            for version in actual.difference(expected) {
                diagnostics.push(format!("Registrations: {id} lists orphan version {version}"));
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
                diagnostics.push(format!("Registrations: orphan index for {id}"));
            }
        }
        Ok(diagnostics)
    }
}

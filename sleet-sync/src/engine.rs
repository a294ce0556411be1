//! Feed synchronization engine, the facade CLI commands call into.
//!
//! Every mutating operation follows the same pass: format gate, identity
//! snapshot, planning, orchestrated apply, telemetry summary. A pass owns
//! its ChangeContext exclusively; concurrent passes against the same feed
//! must be serialized externally.

use crate::planner::{OperationPlanner, PlanRequest};
use crate::services::{
    AutoCompleteService, CatalogService, FlatContainerService, IndexService, PackageIndexService,
    RegistrationsService, SearchService, ValidatableService,
};
use crate::upgrade::{engine_version, FeedStatus, UpgradeGate, ROOT_INDEX_PATH, VERSION_KEY};
use crate::{
    ChangeContext, NoOpPerfTracker, OperationPerfTracker, PerfScope, PerfTracker, SyncError,
    SyncResult,
};
use serde_json::Value;
use sleet_storage::StorageFileSystem;
use sleet_types::{FeedCapability, FeedRequirements, PackageIdentity, PackageInput};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for one engine instance.
#[derive(Debug, Clone, Default)]
pub struct FeedSyncConfig {
    /// Maximum non-pinned versions retained per package id.
    pub retention_limit: Option<usize>,
    /// Identities protected from retention pruning.
    pub pinned: HashSet<PackageIdentity>,
    /// Allow pushes to overwrite identities already in the feed.
    pub force: bool,
    /// Disable telemetry collection entirely.
    pub disable_telemetry: bool,
}

/// Feed size counters reported by `stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    /// Distinct package ids.
    pub packages: usize,
    /// Total published versions.
    pub versions: usize,
}

/// The synchronization engine for one feed.
pub struct FeedSyncEngine {
    file_system: Arc<dyn StorageFileSystem>,
    tracker: Arc<dyn PerfTracker>,
    cancel: CancellationToken,
    config: FeedSyncConfig,
}

impl FeedSyncEngine {
    /// Creates an engine over the given feed storage.
    pub fn new(file_system: Arc<dyn StorageFileSystem>, config: FeedSyncConfig) -> Self {
        let tracker: Arc<dyn PerfTracker> = if config.disable_telemetry {
            Arc::new(NoOpPerfTracker)
        } else {
            Arc::new(OperationPerfTracker::new())
        };
        Self {
            file_system,
            tracker,
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// Replaces the telemetry tracker.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<dyn PerfTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Telemetry summary of the work done so far.
    pub fn perf_summary(&self) -> Vec<String> {
        self.tracker.summary()
    }

    // ── Feed lifecycle ───────────────────────────────────────────

    /// Creates a new feed at the storage root. Fails if one already exists.
    pub async fn init(&self) -> SyncResult<()> {
        let root = self.file_system.get(ROOT_INDEX_PATH)?;
        if root.exists().await.map_err(SyncError::from)? {
            return Err(SyncError::Configuration(format!(
                "feed already initialized at {}",
                self.file_system.root_uri()
            )));
        }

        let requirements = FeedRequirements::new(engine_version());
        let mut doc = serde_json::to_value(&requirements)
            .map_err(sleet_storage::StorageError::from)?;
        doc[VERSION_KEY] = Value::String(crate::upgrade::engine_format_version().to_string());
        root.write_json(&doc).await?;

        PackageIndexService::new(self.file_system.clone(), self.tracker.clone())
            .initialize()
            .await?;
        CatalogService::new(self.file_system.clone(), self.tracker.clone())
            .initialize()
            .await?;
        SearchService::new(self.file_system.clone(), self.tracker.clone())
            .initialize()
            .await?;
        AutoCompleteService::new(self.file_system.clone(), self.tracker.clone())
            .initialize()
            .await?;

        info!("initialized feed at {}", self.file_system.root_uri());
        Ok(())
    }

    // ── Synchronization ──────────────────────────────────────────

    /// Adds packages to the feed.
    pub async fn push(&self, inputs: Vec<PackageInput>) -> SyncResult<()> {
        self.synchronize(inputs, HashSet::new()).await
    }

    /// Removes package identities from the feed.
    pub async fn remove(&self, identities: Vec<PackageIdentity>) -> SyncResult<()> {
        self.synchronize(Vec::new(), identities.into_iter().collect())
            .await
    }

    async fn synchronize(
        &self,
        adds: Vec<PackageInput>,
        removes: HashSet<PackageIdentity>,
    ) -> SyncResult<()> {
        let _total = PerfScope::summary(self.tracker.clone(), "feed synchronized in {time}");

        self.gate_checked().await?;
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        // Snapshot once; planning never re-reads mid-operation.
        let existing = Arc::new(
            PackageIndexService::new(self.file_system.clone(), self.tracker.clone())
                .load_identities()
                .await?,
        );

        let ctx = OperationPlanner::plan(
            existing,
            PlanRequest {
                adds,
                removes,
                pinned: self.config.pinned.clone(),
                retention_limit: self.config.retention_limit,
                force: self.config.force,
            },
        )?;

        if ctx.is_empty() {
            info!("nothing to synchronize");
            return Ok(());
        }

        let orchestrator = crate::ServiceOrchestrator::for_feed(
            self.file_system.clone(),
            self.tracker.clone(),
            self.cancel.clone(),
        );
        orchestrator.apply(&ctx).await?;

        self.log_summary();
        Ok(())
    }

    /// Rebuilds the derived indexes from the authoritative identity list and
    /// the surviving registration metadata. The catalog, being the audit
    /// log, is left untouched.
    pub async fn recreate(&self) -> SyncResult<()> {
        let _total = PerfScope::summary(self.tracker.clone(), "feed recreated in {time}");

        self.gate_checked().await?;
        let identities = PackageIndexService::new(self.file_system.clone(), self.tracker.clone())
            .load_identities()
            .await?;

        let registrations =
            RegistrationsService::new(self.file_system.clone(), self.tracker.clone());
        let flat_container =
            FlatContainerService::new(self.file_system.clone(), self.tracker.clone());
        let mut inputs = Vec::new();
        let mut grouped: HashMap<String, Vec<&PackageIdentity>> = HashMap::new();
        for identity in &identities {
            grouped
                .entry(identity.id_lowercase())
                .or_default()
                .push(identity);
        }

        // Salvage surviving metadata before the per-id documents are wiped.
        for (id, versions) in &grouped {
            let entries = registrations.entries_for_id(id).await?;
            for identity in versions {
                let recorded = entries
                    .iter()
                    .find(|e| e.version == identity.version.to_string());
                let mut input = PackageInput::new((*identity).clone());
                if let Some(entry) = recorded {
                    input.metadata = entry.metadata.clone();
                    input.content_path = entry.content_path.clone();
                }
                inputs.push(input);
            }
        }
        debug!("recreating {} identities across {} ids", inputs.len(), grouped.len());

        // Reset every per-id document the feed has ever had, so orphan
        // versions and documents for deleted ids do not survive the rebuild.
        // The catalog log is the discovery source; the storage contract has
        // no listing operation.
        let catalog = CatalogService::new(self.file_system.clone(), self.tracker.clone());
        let mut known_ids: HashSet<String> = catalog
            .entries()
            .await?
            .iter()
            .map(|e| e.id.to_ascii_lowercase())
            .collect();
        known_ids.extend(grouped.keys().cloned());
        for id in &known_ids {
            registrations.reset_for_id(id).await?;
            flat_container.reset_for_id(id).await?;
        }

        // Reset the whole-feed indexes, then rebuild everything through the
        // normal idempotent apply path.
        SearchService::new(self.file_system.clone(), self.tracker.clone())
            .initialize()
            .await?;
        AutoCompleteService::new(self.file_system.clone(), self.tracker.clone())
            .initialize()
            .await?;

        let ctx = ChangeContext::new(inputs, HashSet::new(), Arc::new(HashSet::new()));
        let services: Vec<Arc<dyn IndexService>> = vec![
            Arc::new(RegistrationsService::new(
                self.file_system.clone(),
                self.tracker.clone(),
            )),
            Arc::new(FlatContainerService::new(
                self.file_system.clone(),
                self.tracker.clone(),
            )),
            Arc::new(SearchService::new(
                self.file_system.clone(),
                self.tracker.clone(),
            )),
            Arc::new(AutoCompleteService::new(
                self.file_system.clone(),
                self.tracker.clone(),
            )),
            Arc::new(PackageIndexService::new(
                self.file_system.clone(),
                self.tracker.clone(),
            )),
        ];
        crate::ServiceOrchestrator::new(services, self.tracker.clone(), self.cancel.clone())
            .apply(&ctx)
            .await?;

        self.log_summary();
        Ok(())
    }

    // ── Advisory tooling ─────────────────────────────────────────

    /// Runs every validatable service against the authoritative identity
    /// list. Returns diagnostics; empty means consistent.
    pub async fn validate(&self) -> SyncResult<Vec<String>> {
        self.gate_checked().await?;
        let authoritative =
            PackageIndexService::new(self.file_system.clone(), self.tracker.clone())
                .load_identities()
                .await?;

        let services: Vec<Box<dyn ValidatableService>> = vec![
            Box::new(RegistrationsService::new(
                self.file_system.clone(),
                self.tracker.clone(),
            )),
            Box::new(FlatContainerService::new(
                self.file_system.clone(),
                self.tracker.clone(),
            )),
            Box::new(SearchService::new(
                self.file_system.clone(),
                self.tracker.clone(),
            )),
            Box::new(AutoCompleteService::new(
                self.file_system.clone(),
                self.tracker.clone(),
            )),
        ];

        // Ids the catalog has ever logged; lets the per-id services spot
        // documents left behind for ids no longer in the feed.
        let candidate_ids: HashSet<String> =
            CatalogService::new(self.file_system.clone(), self.tracker.clone())
                .entries()
                .await?
                .iter()
                .map(|e| e.id.to_ascii_lowercase())
                .collect();

        let mut diagnostics = Vec::new();
        for service in &services {
            diagnostics.extend(service.validate(&authoritative).await?);
            diagnostics.extend(
                service
                    .validate_candidate_ids(&candidate_ids, &authoritative)
                    .await?,
            );
        }
        Ok(diagnostics)
    }

    /// Feed size counters.
    pub async fn stats(&self) -> SyncResult<FeedStats> {
        let identities = PackageIndexService::new(self.file_system.clone(), self.tracker.clone())
            .load_identities()
            .await?;
        let packages = identities
            .iter()
            .map(PackageIdentity::id_lowercase)
            .collect::<HashSet<_>>()
            .len();
        Ok(FeedStats {
            packages,
            versions: identities.len(),
        })
    }

    // ── Feed settings ────────────────────────────────────────────

    /// Current requirements block from the root document.
    pub async fn requirements(&self) -> SyncResult<FeedRequirements> {
        UpgradeGate::new(self.file_system.clone(), self.tracker.clone())
            .requirements()
            .await
    }

    /// Adds (or updates) a required capability in the root document.
    pub async fn add_capability(&self, capability: FeedCapability) -> SyncResult<()> {
        self.update_requirements(|reqs| {
            reqs.required_capabilities
                .retain(|c| c.name != capability.name);
            reqs.required_capabilities.push(capability.clone());
        })
        .await
    }

    /// Removes a required capability by name. Unknown names are a no-op.
    pub async fn remove_capability(&self, name: &str) -> SyncResult<()> {
        let name = name.to_ascii_lowercase();
        self.update_requirements(|reqs| {
            reqs.required_capabilities.retain(|c| c.name != name);
        })
        .await
    }

    async fn update_requirements(&self, mutate: impl Fn(&mut FeedRequirements)) -> SyncResult<()> {
        let root = self.file_system.get(ROOT_INDEX_PATH)?;
        let doc = root.read_json().await?.ok_or_else(|| {
            SyncError::Configuration(format!("feed root document {ROOT_INDEX_PATH} is missing"))
        })?;

        let mut reqs: FeedRequirements = serde_json::from_value(doc.clone())
            .map_err(|e| SyncError::Configuration(format!("invalid feed requirements: {e}")))?;
        mutate(&mut reqs);

        let mut updated = serde_json::to_value(&reqs)
            .map_err(sleet_storage::StorageError::from)?;
        if let Some(version) = doc.get(VERSION_KEY) {
            updated[VERSION_KEY] = version.clone();
        }
        root.write_json(&updated).await?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    async fn gate_checked(&self) -> SyncResult<()> {
        let gate = UpgradeGate::new(self.file_system.clone(), self.tracker.clone());
        match gate.check().await? {
            FeedStatus::Current => Ok(()),
            FeedStatus::UpgradedInPlace => {
                info!("feed format upgraded in place");
                Ok(())
            }
            FeedStatus::Blocked(reason) => Err(SyncError::VersionBlocked { reason }),
        }
    }

    fn log_summary(&self) {
        for line in self.tracker.summary() {
            info!("{line}");
        }
    }
}

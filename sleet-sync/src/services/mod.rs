//! Derived-index builders.
//!
//! Each service owns one redundant view over the package identity set and
//! can apply a planned operation to its own documents. Applies are
//! idempotent: re-applying the same context after a partial failure lands on
//! the same final state.

mod autocomplete;
mod catalog;
mod flat_container;
mod package_index;
mod registrations;
mod search;

pub use autocomplete::AutoCompleteService;
pub use catalog::CatalogService;
pub use flat_container::FlatContainerService;
pub use package_index::PackageIndexService;
pub use registrations::RegistrationsService;
pub use search::SearchService;

use crate::perf::{FileOperation, PerfScope, PerfTracker};
use crate::{ChangeContext, SyncResult};
use async_trait::async_trait;
use serde_json::Value;
use sleet_storage::StorageFile;
use sleet_types::PackageIdentity;
use std::collections::HashSet;
use std::sync::Arc;

/// A derived-index builder that can apply a planned operation to its own
/// document set.
#[async_trait]
pub trait IndexService: Send + Sync {
    /// Stable identifier for logs and failure reports.
    fn name(&self) -> &'static str;

    /// Optional warm-up hook: fetch or cache documents the apply will need.
    /// Not a correctness requirement; the default is a no-op.
    async fn pre_load(&self, _ctx: &ChangeContext) -> SyncResult<()> {
        Ok(())
    }

    /// Applies the operation to this service's documents. Must be
    /// idempotent.
    async fn apply_operation(&self, ctx: &ChangeContext) -> SyncResult<()>;
}

/// Advisory integrity check a service may support: confirm its document set
/// matches the authoritative identity list. Not part of the write path.
#[async_trait]
pub trait ValidatableService: IndexService {
    /// Returns human-readable diagnostics; empty means consistent.
    async fn validate(
        &self,
        authoritative: &HashSet<PackageIdentity>,
    ) -> SyncResult<Vec<String>>;

    /// Reports per-id documents that exist for ids outside the
    /// authoritative list. `candidate_ids` holds every lower-cased id the
    /// feed has ever seen (from the catalog log); services without per-id
    /// documents have nothing to report.
    async fn validate_candidate_ids(
        &self,
        _candidate_ids: &HashSet<String>,
        _authoritative: &HashSet<PackageIdentity>,
    ) -> SyncResult<Vec<String>> {
        Ok(Vec::new())
    }
}

pub(crate) async fn read_json_tracked(
    file: &Arc<dyn StorageFile>,
    tracker: &Arc<dyn PerfTracker>,
) -> SyncResult<Option<Value>> {
    let _scope = PerfScope::file(tracker.clone(), file.uri(), FileOperation::Get);
    Ok(file.read_json().await?)
}

pub(crate) async fn write_json_tracked(
    file: &Arc<dyn StorageFile>,
    value: &Value,
    tracker: &Arc<dyn PerfTracker>,
) -> SyncResult<()> {
    let _scope = PerfScope::file(tracker.clone(), file.uri(), FileOperation::Put);
    Ok(file.write_json(value).await?)
}

pub(crate) async fn delete_tracked(
    file: &Arc<dyn StorageFile>,
    tracker: &Arc<dyn PerfTracker>,
) -> SyncResult<()> {
    let _scope = PerfScope::file(tracker.clone(), file.uri(), FileOperation::Modify);
    Ok(file.delete().await?)
}

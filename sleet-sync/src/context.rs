//! The planned operation carried from the planner through the orchestrator
//! to every index service.

use chrono::{DateTime, Utc};
use sleet_types::{PackageIdentity, PackageInput};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// One planned add/remove operation against a feed.
///
/// Read-only once constructed; shared across all index services in the same
/// pass and discarded afterward. Additions and removals are disjoint on
/// identity.
#[derive(Debug, Clone)]
pub struct ChangeContext {
    to_add: Vec<PackageInput>,
    to_remove: HashSet<PackageIdentity>,
    existing: Arc<HashSet<PackageIdentity>>,
    commit_id: Uuid,
    commit_time: DateTime<Utc>,
}

impl ChangeContext {
    /// Creates a context. Callers must keep `to_add` and `to_remove`
    /// disjoint on identity; the planner guarantees this.
    pub fn new(
        to_add: Vec<PackageInput>,
        to_remove: HashSet<PackageIdentity>,
        existing: Arc<HashSet<PackageIdentity>>,
    ) -> Self {
        debug_assert!(
            to_add.iter().all(|a| !to_remove.contains(&a.identity)),
            "additions and removals must be disjoint"
        );
        Self {
            to_add,
            to_remove,
            existing,
            commit_id: Uuid::new_v4(),
            commit_time: Utc::now(),
        }
    }

    /// Packages to add, in the caller-supplied order.
    #[must_use]
    pub fn to_add(&self) -> &[PackageInput] {
        &self.to_add
    }

    /// Identities to remove.
    #[must_use]
    pub fn to_remove(&self) -> &HashSet<PackageIdentity> {
        &self.to_remove
    }

    /// Snapshot of the identities present before this operation.
    #[must_use]
    pub fn existing(&self) -> &HashSet<PackageIdentity> {
        &self.existing
    }

    /// Unique id of this commit, stable across idempotent re-application.
    #[must_use]
    pub fn commit_id(&self) -> Uuid {
        self.commit_id
    }

    /// Timestamp of this commit.
    #[must_use]
    pub fn commit_time(&self) -> DateTime<Utc> {
        self.commit_time
    }

    /// Returns true when the operation changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Identities present after this operation is applied.
    #[must_use]
    pub fn identities_after(&self) -> HashSet<PackageIdentity> {
        let mut after: HashSet<PackageIdentity> = self
            .existing
            .iter()
            .filter(|id| !self.to_remove.contains(id))
            .cloned()
            .collect();
        after.extend(self.to_add.iter().map(|a| a.identity.clone()));
        after
    }

    /// All ids (lower-cased) touched by this operation.
    #[must_use]
    pub fn touched_ids(&self) -> HashSet<String> {
        self.to_add
            .iter()
            .map(|a| a.identity.id_lowercase())
            .chain(self.to_remove.iter().map(PackageIdentity::id_lowercase))
            .collect()
    }
}

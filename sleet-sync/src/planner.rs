//! Operation planning: pure computation, no I/O.
//!
//! Given the existing identity snapshot and a requested add/remove set, the
//! planner computes the minimal consistent operation: it rejects duplicates
//! and missing removal targets up front, then selects additional retention
//! removals, oldest version first, never touching pinned or requested
//! identities.

use crate::{ChangeContext, SyncError, SyncResult};
use sleet_types::{PackageIdentity, PackageInput};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// A requested synchronization operation, before planning.
#[derive(Debug, Default)]
pub struct PlanRequest {
    /// Packages to add, in the order the caller supplied them.
    pub adds: Vec<PackageInput>,
    /// Identities to remove.
    pub removes: HashSet<PackageIdentity>,
    /// Identities protected from retention pruning.
    pub pinned: HashSet<PackageIdentity>,
    /// Maximum non-pinned versions retained per package id.
    pub retention_limit: Option<usize>,
    /// Allow overwriting an identity that is already present.
    pub force: bool,
}

/// Computes the operation to apply from a requested add/remove set.
pub struct OperationPlanner;

impl OperationPlanner {
    /// Plans one operation against the given snapshot.
    ///
    /// The snapshot must be captured once at the start of planning and not
    /// re-read mid-operation.
    pub fn plan(
        existing: Arc<HashSet<PackageIdentity>>,
        request: PlanRequest,
    ) -> SyncResult<ChangeContext> {
        let mut seen_adds: HashSet<&PackageIdentity> = HashSet::new();
        for add in &request.adds {
            if !seen_adds.insert(&add.identity) {
                return Err(SyncError::DuplicatePackage {
                    identity: add.identity.clone(),
                });
            }
            if request.removes.contains(&add.identity) {
                return Err(SyncError::Configuration(format!(
                    "package {} requested for both add and remove",
                    add.identity
                )));
            }
            if !request.force && existing.contains(&add.identity) {
                return Err(SyncError::DuplicatePackage {
                    identity: add.identity.clone(),
                });
            }
        }

        for remove in &request.removes {
            if !existing.contains(remove) {
                return Err(SyncError::PackageNotFound {
                    identity: remove.clone(),
                });
            }
        }

        let mut to_remove = request.removes.clone();
        if let Some(limit) = request.retention_limit {
            let pruned = Self::select_retention_removals(&existing, &request, &to_remove, limit);
            for identity in pruned {
                debug!("retention pruning {identity}");
                to_remove.insert(identity);
            }
        }

        Ok(ChangeContext::new(request.adds, to_remove, existing))
    }

    /// Selects retention removals: for every id whose post-operation count
    /// of non-pinned versions exceeds the limit, prune the oldest versions
    /// that are neither pinned nor part of the current request.
    fn select_retention_removals(
        existing: &HashSet<PackageIdentity>,
        request: &PlanRequest,
        to_remove: &HashSet<PackageIdentity>,
        limit: usize,
    ) -> Vec<PackageIdentity> {
        let added_identities: HashSet<&PackageIdentity> =
            request.adds.iter().map(|a| &a.identity).collect();

        // Group every post-operation identity by lower-cased id. A forced
        // re-add appears in both the snapshot and the adds; count it once.
        let mut by_id: HashMap<String, Vec<&PackageIdentity>> = HashMap::new();
        for identity in existing
            .iter()
            .filter(|i| !to_remove.contains(*i) && !added_identities.contains(*i))
            .chain(request.adds.iter().map(|a| &a.identity))
        {
            by_id.entry(identity.id_lowercase()).or_default().push(identity);
        }

        let mut pruned = Vec::new();
        for versions in by_id.values() {
            let mut non_pinned: Vec<&&PackageIdentity> = versions
                .iter()
                .filter(|i| !request.pinned.contains(**i))
                .collect();
            if non_pinned.len() <= limit {
                continue;
            }

            // Oldest version first by semver precedence.
            non_pinned.sort();

            let mut over = non_pinned.len() - limit;
            for candidate in non_pinned {
                if over == 0 {
                    break;
                }
                // Never prune what this request is adding.
                if added_identities.contains(*candidate) {
                    continue;
                }
                pruned.push((**candidate).clone());
                over -= 1;
            }
        }
        pruned
    }
}

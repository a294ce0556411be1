use semver::Version;
use sleet_sync::{OperationPlanner, PlanRequest, SyncError};
use sleet_types::{PackageIdentity, PackageInput};
use std::collections::HashSet;
use std::sync::Arc;

fn ident(id: &str, version: &str) -> PackageIdentity {
    PackageIdentity::new(id, Version::parse(version).unwrap())
}

fn input(id: &str, version: &str) -> PackageInput {
    PackageInput::new(ident(id, version))
}

fn existing(identities: &[PackageIdentity]) -> Arc<HashSet<PackageIdentity>> {
    Arc::new(identities.iter().cloned().collect())
}

// ── Add validation ───────────────────────────────────────────────

#[test]
fn plain_add() {
    let ctx = OperationPlanner::plan(
        existing(&[]),
        PlanRequest {
            adds: vec![input("a", "1.0.0")],
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(ctx.to_add().len(), 1);
    assert!(ctx.to_remove().is_empty());
}

#[test]
fn duplicate_add_rejected() {
    let err = OperationPlanner::plan(
        existing(&[ident("a", "1.0.0")]),
        PlanRequest {
            adds: vec![input("A", "1.0.0")],
            ..Default::default()
        },
    )
    .unwrap_err();

    assert!(matches!(err, SyncError::DuplicatePackage { .. }));
}

#[test]
fn duplicate_add_allowed_with_force() {
    let ctx = OperationPlanner::plan(
        existing(&[ident("a", "1.0.0")]),
        PlanRequest {
            adds: vec![input("a", "1.0.0")],
            force: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(ctx.to_add().len(), 1);
    // Overwrite happens through the idempotent add path, never via removal.
    assert!(ctx.to_remove().is_empty());
}

#[test]
fn duplicate_within_request_rejected() {
    let err = OperationPlanner::plan(
        existing(&[]),
        PlanRequest {
            adds: vec![input("a", "1.0.0"), input("A", "1.0.0+build")],
            force: true,
            ..Default::default()
        },
    )
    .unwrap_err();

    assert!(matches!(err, SyncError::DuplicatePackage { .. }));
}

#[test]
fn add_and_remove_of_same_identity_rejected() {
    let err = OperationPlanner::plan(
        existing(&[ident("a", "1.0.0")]),
        PlanRequest {
            adds: vec![input("a", "1.0.0")],
            removes: [ident("a", "1.0.0")].into_iter().collect(),
            force: true,
            ..Default::default()
        },
    )
    .unwrap_err();

    assert!(matches!(err, SyncError::Configuration(_)));
}

// ── Remove validation ────────────────────────────────────────────

#[test]
fn remove_of_missing_package_rejected() {
    let err = OperationPlanner::plan(
        existing(&[ident("a", "1.0.0")]),
        PlanRequest {
            removes: [ident("a", "2.0.0")].into_iter().collect(),
            ..Default::default()
        },
    )
    .unwrap_err();

    assert!(matches!(err, SyncError::PackageNotFound { .. }));
}

#[test]
fn remove_is_case_insensitive() {
    let ctx = OperationPlanner::plan(
        existing(&[ident("MyPackage", "1.0.0")]),
        PlanRequest {
            removes: [ident("mypackage", "1.0.0")].into_iter().collect(),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(ctx.to_remove().len(), 1);
}

// ── Invariants ───────────────────────────────────────────────────

#[test]
fn add_and_remove_sets_are_disjoint() {
    let ctx = OperationPlanner::plan(
        existing(&[ident("a", "1.0.0"), ident("a", "2.0.0")]),
        PlanRequest {
            adds: vec![input("a", "3.0.0")],
            removes: [ident("a", "1.0.0")].into_iter().collect(),
            retention_limit: Some(1),
            ..Default::default()
        },
    )
    .unwrap();

    for add in ctx.to_add() {
        assert!(!ctx.to_remove().contains(&add.identity));
    }
}

#[test]
fn additions_preserve_caller_order() {
    let ctx = OperationPlanner::plan(
        existing(&[]),
        PlanRequest {
            adds: vec![input("z", "1.0.0"), input("a", "1.0.0"), input("m", "1.0.0")],
            ..Default::default()
        },
    )
    .unwrap();

    let ids: Vec<&str> = ctx.to_add().iter().map(|a| a.identity.id.as_str()).collect();
    assert_eq!(ids, vec!["z", "a", "m"]);
}

// ── Retention pruning ────────────────────────────────────────────

#[test]
fn prunes_oldest_versions_beyond_limit() {
    let ctx = OperationPlanner::plan(
        existing(&[
            ident("a", "1.0.0"),
            ident("a", "2.0.0"),
            ident("a", "3.0.0"),
            ident("a", "4.0.0"),
            ident("a", "5.0.0"),
        ]),
        PlanRequest {
            retention_limit: Some(2),
            ..Default::default()
        },
    )
    .unwrap();

    // 5 non-pinned versions, limit 2: exactly 3 removals, all oldest.
    assert_eq!(ctx.to_remove().len(), 3);
    assert!(ctx.to_remove().contains(&ident("a", "1.0.0")));
    assert!(ctx.to_remove().contains(&ident("a", "2.0.0")));
    assert!(ctx.to_remove().contains(&ident("a", "3.0.0")));
}

#[test]
fn prerelease_sorts_before_release_when_pruning() {
    let ctx = OperationPlanner::plan(
        existing(&[ident("a", "1.0.0-beta.1"), ident("a", "1.0.0")]),
        PlanRequest {
            retention_limit: Some(1),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(ctx.to_remove().len(), 1);
    assert!(ctx.to_remove().contains(&ident("a", "1.0.0-beta.1")));
}

#[test]
fn pinned_versions_never_pruned() {
    for limit in 0..4 {
        let ctx = OperationPlanner::plan(
            existing(&[
                ident("a", "1.0.0"),
                ident("a", "2.0.0"),
                ident("a", "3.0.0"),
            ]),
            PlanRequest {
                pinned: [ident("a", "1.0.0")].into_iter().collect(),
                retention_limit: Some(limit),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(!ctx.to_remove().contains(&ident("a", "1.0.0")));
    }
}

#[test]
fn pinned_versions_do_not_count_against_limit() {
    let ctx = OperationPlanner::plan(
        existing(&[
            ident("a", "1.0.0"),
            ident("a", "2.0.0"),
            ident("a", "3.0.0"),
        ]),
        PlanRequest {
            pinned: [ident("a", "1.0.0")].into_iter().collect(),
            retention_limit: Some(2),
            ..Default::default()
        },
    )
    .unwrap();

    // 2 non-pinned versions at a limit of 2: nothing to prune.
    assert!(ctx.to_remove().is_empty());
}

#[test]
fn just_added_versions_never_pruned() {
    let ctx = OperationPlanner::plan(
        existing(&[ident("a", "2.0.0"), ident("a", "3.0.0")]),
        PlanRequest {
            adds: vec![input("a", "1.0.0")],
            retention_limit: Some(2),
            ..Default::default()
        },
    )
    .unwrap();

    // The incoming 1.0.0 is the oldest but must survive; the next-oldest
    // existing version goes instead.
    assert_eq!(ctx.to_remove().len(), 1);
    assert!(ctx.to_remove().contains(&ident("a", "2.0.0")));
}

#[test]
fn forced_readd_does_not_inflate_retention_count() {
    let ctx = OperationPlanner::plan(
        existing(&[ident("a", "1.0.0"), ident("a", "2.0.0")]),
        PlanRequest {
            adds: vec![input("a", "2.0.0")],
            force: true,
            retention_limit: Some(2),
            ..Default::default()
        },
    )
    .unwrap();

    // The re-added 2.0.0 counts once: two post-operation versions at a
    // limit of two leaves nothing to prune.
    assert!(ctx.to_remove().is_empty());
}

#[test]
fn retention_is_per_package_id() {
    let ctx = OperationPlanner::plan(
        existing(&[
            ident("a", "1.0.0"),
            ident("a", "2.0.0"),
            ident("b", "1.0.0"),
        ]),
        PlanRequest {
            retention_limit: Some(1),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(ctx.to_remove().len(), 1);
    assert!(ctx.to_remove().contains(&ident("a", "1.0.0")));
}

// ── Planning idempotence ─────────────────────────────────────────

#[test]
fn replanning_against_own_output_is_a_noop() {
    let before = existing(&[
        ident("a", "1.0.0"),
        ident("a", "2.0.0"),
        ident("a", "3.0.0"),
    ]);
    let first = OperationPlanner::plan(
        before,
        PlanRequest {
            retention_limit: Some(2),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(first.to_remove().len(), 1);

    let after = Arc::new(first.identities_after());
    let second = OperationPlanner::plan(
        after,
        PlanRequest {
            retention_limit: Some(2),
            ..Default::default()
        },
    )
    .unwrap();

    assert!(second.is_empty());
}

use semver::Version;
use serde_json::json;
use sleet_storage::{MemoryFileSystem, StorageFileSystem};
use sleet_sync::{
    engine_format_version, FeedStatus, NoOpPerfTracker, PerfTracker, SyncError, UpgradeGate,
    ROOT_INDEX_PATH, VERSION_KEY,
};
use std::sync::Arc;

fn tracker() -> Arc<dyn PerfTracker> {
    Arc::new(NoOpPerfTracker)
}

async fn feed_with_root(doc: serde_json::Value) -> Arc<MemoryFileSystem> {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.get(ROOT_INDEX_PATH)
        .unwrap()
        .write_json(&doc)
        .await
        .unwrap();
    fs
}

fn root_doc(version: &str) -> serde_json::Value {
    json!({
        VERSION_KEY: version,
        "sleet:creatorVersion": "0.1.0",
    })
}

// ── Version gate ─────────────────────────────────────────────────

#[tokio::test]
async fn current_when_versions_match() {
    let fs = feed_with_root(root_doc(&engine_format_version().to_string())).await;
    let gate = UpgradeGate::new(fs, tracker());

    assert_eq!(gate.check().await.unwrap(), FeedStatus::Current);
}

#[tokio::test]
async fn older_feed_upgraded_in_place() {
    let fs = feed_with_root(root_doc("1.0.0")).await;
    let gate = UpgradeGate::new(fs.clone(), tracker());

    assert_eq!(gate.check().await.unwrap(), FeedStatus::UpgradedInPlace);

    // The persisted version was rewritten forward.
    let doc = fs
        .get(ROOT_INDEX_PATH)
        .unwrap()
        .read_json()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        doc[VERSION_KEY].as_str().unwrap(),
        engine_format_version().to_string()
    );
}

#[tokio::test]
async fn newer_feed_blocked() {
    let newer = Version::new(engine_format_version().major + 1, 0, 0);
    let fs = feed_with_root(root_doc(&newer.to_string())).await;
    let gate = UpgradeGate::new(fs.clone(), tracker());

    let status = gate.check().await.unwrap();
    assert!(matches!(status, FeedStatus::Blocked(_)));

    // Blocked outcomes never write.
    let doc = fs
        .get(ROOT_INDEX_PATH)
        .unwrap()
        .read_json()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc[VERSION_KEY].as_str().unwrap(), newer.to_string());
}

#[tokio::test]
async fn build_metadata_ignored_for_equality() {
    let stored = format!("{}+build.5", engine_format_version());
    let fs = feed_with_root(root_doc(&stored)).await;
    let gate = UpgradeGate::new(fs, tracker());

    assert_eq!(gate.check().await.unwrap(), FeedStatus::Current);
}

// ── Capability gate ──────────────────────────────────────────────

#[tokio::test]
async fn unknown_required_capability_blocks_despite_version_match() {
    let mut doc = root_doc(&engine_format_version().to_string());
    doc["sleet:capabilities"] = json!(["widgets:1.0.0"]);
    let fs = feed_with_root(doc).await;
    let gate = UpgradeGate::new(fs, tracker());

    match gate.check().await.unwrap() {
        FeedStatus::Blocked(reason) => assert!(reason.contains("widgets:1.0.0")),
        other => panic!("expected Blocked, got {other:?}"),
    }
}

#[tokio::test]
async fn required_engine_version_range_blocks() {
    let mut doc = root_doc(&engine_format_version().to_string());
    doc["sleet:requiredVersion"] = json!(">=99.0.0");
    let fs = feed_with_root(doc).await;
    let gate = UpgradeGate::new(fs, tracker());

    assert!(matches!(
        gate.check().await.unwrap(),
        FeedStatus::Blocked(_)
    ));
}

// ── Malformed feeds ──────────────────────────────────────────────

#[tokio::test]
async fn missing_root_document_is_configuration_error() {
    let fs = Arc::new(MemoryFileSystem::new());
    let gate = UpgradeGate::new(fs, tracker());

    assert!(matches!(
        gate.check().await.unwrap_err(),
        SyncError::Configuration(_)
    ));
}

#[tokio::test]
async fn missing_version_key_is_configuration_error() {
    let fs = feed_with_root(json!({ "sleet:creatorVersion": "0.1.0" })).await;
    let gate = UpgradeGate::new(fs, tracker());

    assert!(matches!(
        gate.check().await.unwrap_err(),
        SyncError::Configuration(_)
    ));
}

#[tokio::test]
async fn garbage_version_is_configuration_error() {
    let fs = feed_with_root(root_doc("not-a-version")).await;
    let gate = UpgradeGate::new(fs, tracker());

    assert!(matches!(
        gate.check().await.unwrap_err(),
        SyncError::Configuration(_)
    ));
}

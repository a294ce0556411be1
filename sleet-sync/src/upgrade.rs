//! Feed format gating.
//!
//! Every synchronization starts here: the gate reads the persisted format
//! version and capability requirements from the feed root document and
//! decides whether this engine may proceed. Older stored formats are
//! rewritten forward in place (metadata only: index documents are additive
//! and backward-readable by construction); newer stored formats block the
//! engine so it cannot silently drop fields it does not understand.

use crate::services::{read_json_tracked, write_json_tracked};
use crate::{PerfTracker, SyncError, SyncResult};
use semver::Version;
use serde_json::Value;
use sleet_storage::StorageFileSystem;
use sleet_types::{FeedCapability, FeedRequirements};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::info;

/// Feed root document, relative to the feed root URI.
pub const ROOT_INDEX_PATH: &str = "index.json";

/// Root-document key holding the feed format version. The upgrade gate is
/// its sole writer.
pub const VERSION_KEY: &str = "sleet:version";

/// Feed format version this engine reads and writes.
pub fn engine_format_version() -> Version {
    Version::new(2, 1, 0)
}

/// Engine software version, checked against the feed's required range.
pub fn engine_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
}

/// Capabilities this engine implements. A feed requiring anything not in
/// this list is blocked.
pub fn engine_capabilities() -> Vec<FeedCapability> {
    Vec::new()
}

/// Outcome of the format check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    /// Stored format matches this engine.
    Current,
    /// Stored format was older; the persisted version was rewritten forward.
    UpgradedInPlace,
    /// This engine must not touch the feed.
    Blocked(String),
}

/// Reads and enforces the feed's format version and capability set.
pub struct UpgradeGate {
    file_system: Arc<dyn StorageFileSystem>,
    tracker: Arc<dyn PerfTracker>,
}

impl UpgradeGate {
    pub fn new(file_system: Arc<dyn StorageFileSystem>, tracker: Arc<dyn PerfTracker>) -> Self {
        Self {
            file_system,
            tracker,
        }
    }

    /// Checks the feed against this engine, upgrading the persisted version
    /// forward when it is older. Blocked outcomes never write.
    pub async fn check(&self) -> SyncResult<FeedStatus> {
        let file = self.file_system.get(ROOT_INDEX_PATH)?;
        let mut doc = read_json_tracked(&file, &self.tracker)
            .await?
            .ok_or_else(|| {
                SyncError::Configuration(format!(
                    "feed root document {ROOT_INDEX_PATH} is missing; initialize the feed first"
                ))
            })?;

        let stored = stored_format_version(&doc)?;
        let requirements: FeedRequirements = serde_json::from_value(doc.clone())
            .map_err(|e| SyncError::Configuration(format!("invalid feed requirements: {e}")))?;

        // Capability gate is independent of the version gate.
        let implemented = engine_capabilities();
        for required in &requirements.required_capabilities {
            let satisfied = implemented.iter().any(|cap| {
                cap.name == required.name
                    && cap.version.cmp_precedence(&required.version) != Ordering::Less
            });
            if !satisfied {
                return Ok(FeedStatus::Blocked(format!(
                    "feed requires capability {required} which this engine does not implement"
                )));
            }
        }

        if !requirements.required_version.matches(&engine_version()) {
            return Ok(FeedStatus::Blocked(format!(
                "feed requires engine version {} but this engine is {}",
                requirements.required_version,
                engine_version()
            )));
        }

        let supported = engine_format_version();
        match stored.cmp_precedence(&supported) {
            Ordering::Equal => Ok(FeedStatus::Current),
            Ordering::Greater => Ok(FeedStatus::Blocked(format!(
                "feed format {stored} is newer than the supported format {supported}"
            ))),
            Ordering::Less => {
                info!("upgrading feed format {stored} -> {supported}");
                doc[VERSION_KEY] = Value::String(supported.to_string());
                write_json_tracked(&file, &doc, &self.tracker).await?;
                Ok(FeedStatus::UpgradedInPlace)
            }
        }
    }

    /// Reads the requirements block without enforcing it.
    pub async fn requirements(&self) -> SyncResult<FeedRequirements> {
        let file = self.file_system.get(ROOT_INDEX_PATH)?;
        let doc = read_json_tracked(&file, &self.tracker)
            .await?
            .ok_or_else(|| {
                SyncError::Configuration(format!("feed root document {ROOT_INDEX_PATH} is missing"))
            })?;
        serde_json::from_value(doc)
            .map_err(|e| SyncError::Configuration(format!("invalid feed requirements: {e}")))
    }
}

fn stored_format_version(doc: &Value) -> SyncResult<Version> {
    let raw = doc
        .get(VERSION_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            SyncError::Configuration(format!("feed root document is missing {VERSION_KEY}"))
        })?;
    Version::parse(raw)
        .map_err(|e| SyncError::Configuration(format!("invalid {VERSION_KEY} `{raw}`: {e}")))
}

//! Feed synchronization engine for sleet static package feeds.
//!
//! A feed is a tree of interlinked JSON documents (catalog, per-id
//! registrations, flat file listing, search index, autocomplete index,
//! master package index) that are redundant views over one authoritative
//! fact: the current set of published package identities. This crate keeps
//! those views mutually consistent as packages are added and removed.
//!
//! # Architecture
//!
//! - **OperationPlanner**: pure computation of the operation to apply,
//!   accounting for already-present packages, pinned packages, and
//!   retention limits
//! - **UpgradeGate**: feed format-version and capability gating; older
//!   engines refuse to touch newer feeds
//! - **ServiceOrchestrator**: drives the planned operation through every
//!   index service in a fixed order, halting at the first failure
//! - **PerfTracker**: concurrent-safe telemetry accumulated across the
//!   (possibly remote, possibly slow) storage operations of one pass
//!
//! There is no multi-document transaction underneath: every service apply
//! is idempotent, and recovery from a partial failure is re-running the
//! same operation.
//!
//! # Example
//!
//! ```no_run
//! use sleet_storage::{MemoryFileSystem, StorageFileSystem};
//! use sleet_sync::{FeedSyncConfig, FeedSyncEngine};
//! use std::sync::Arc;
//!
//! # async fn run() -> sleet_sync::SyncResult<()> {
//! let fs: Arc<dyn StorageFileSystem> = Arc::new(MemoryFileSystem::new());
//! let engine = FeedSyncEngine::new(fs, FeedSyncConfig::default());
//! engine.init().await?;
//! # Ok(())
//! # }
//! ```

mod context;
mod engine;
mod error;
mod orchestrator;
mod perf;
mod planner;
pub mod services;
mod upgrade;

pub use context::ChangeContext;
pub use engine::{FeedStats, FeedSyncConfig, FeedSyncEngine};
pub use error::{SyncError, SyncResult};
pub use orchestrator::ServiceOrchestrator;
pub use perf::{
    FileOperation, NoOpPerfTracker, OperationPerfTracker, PerfEntry, PerfScope, PerfTracker,
};
pub use planner::{OperationPlanner, PlanRequest};
pub use upgrade::{
    engine_capabilities, engine_format_version, engine_version, FeedStatus, UpgradeGate,
    ROOT_INDEX_PATH, VERSION_KEY,
};

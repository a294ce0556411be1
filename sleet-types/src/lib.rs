//! Core type definitions for the sleet static feed engine.
//!
//! This crate defines the fundamental, backend-agnostic types used throughout
//! the feed synchronization engine:
//! - Package identities (case-insensitive id + semver precedence)
//! - Package inputs (identity plus the metadata needed to add a package)
//! - Feed capabilities and requirements (format gating metadata)
//!
//! Index-document shapes and storage concerns belong to the sync and storage
//! crates, not here.

mod identity;
mod input;
mod requirements;

pub use identity::PackageIdentity;
pub use input::{PackageInput, PackageMetadata};
pub use requirements::{CapabilityError, FeedCapability, FeedRequirements};

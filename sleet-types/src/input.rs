//! Package submission input: identity plus everything needed to add it.

use crate::PackageIdentity;
use serde::{Deserialize, Serialize};

/// Descriptive metadata extracted from a package manifest.
///
/// Archive parsing is a collaborator's concern; the engine only consumes the
/// already-extracted fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Author or organization, comma-separated as in the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Search tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A package submitted for addition to the feed.
///
/// Created when a package is pushed, consumed once by the planner and the
/// index services, not retained afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInput {
    /// The identity this input will publish.
    pub identity: PackageIdentity,
    /// Manifest metadata.
    #[serde(default)]
    pub metadata: PackageMetadata,
    /// Feed-relative path of the package archive payload, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
    /// Feed-relative path of the symbols payload, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols_path: Option<String>,
}

impl PackageInput {
    /// Creates an input with empty metadata and no payload references.
    pub fn new(identity: PackageIdentity) -> Self {
        Self {
            identity,
            metadata: PackageMetadata::default(),
            content_path: None,
            symbols_path: None,
        }
    }

    /// Sets the manifest metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: PackageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the archive payload path.
    #[must_use]
    pub fn with_content_path(mut self, path: impl Into<String>) -> Self {
        self.content_path = Some(path.into());
        self
    }
}

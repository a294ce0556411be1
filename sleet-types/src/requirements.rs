//! Feed format requirements persisted in the feed's root document.
//!
//! A feed can require a minimum engine version range and a set of named,
//! versioned capabilities. Both gates are checked before any write.

use semver::{Version, VersionReq};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a capability string.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability must be in name:version form, got `{0}`")]
    MissingSeparator(String),

    #[error("capability `{name}` has an invalid version: {source}")]
    InvalidVersion {
        name: String,
        source: semver::Error,
    },

    #[error("capability name must not be empty")]
    EmptyName,
}

/// A single named feature requirement, serialized as `"name:version"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedCapability {
    /// Capability name, always lower-cased.
    pub name: String,
    /// Capability version.
    pub version: Version,
}

impl FeedCapability {
    /// Creates a capability. The name is lower-cased.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            version,
        }
    }
}

impl fmt::Display for FeedCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

impl FromStr for FeedCapability {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = s
            .split_once(':')
            .ok_or_else(|| CapabilityError::MissingSeparator(s.to_string()))?;
        if name.is_empty() {
            return Err(CapabilityError::EmptyName);
        }
        let version = Version::parse(version).map_err(|source| CapabilityError::InvalidVersion {
            name: name.to_string(),
            source,
        })?;
        Ok(Self::new(name, version))
    }
}

impl Serialize for FeedCapability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FeedCapability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

fn any_version() -> VersionReq {
    VersionReq::STAR
}

/// Format requirements block stored in the feed root `index.json`.
///
/// `creator_version` is historical and advisory only; `required_version`
/// gates which engine versions may open the feed; `required_capabilities`
/// gates named features independently of the format version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRequirements {
    /// Engine version that created the feed.
    #[serde(rename = "sleet:creatorVersion")]
    pub creator_version: Version,

    /// Range of engine versions allowed to open the feed.
    /// Defaults to accepting all versions.
    #[serde(rename = "sleet:requiredVersion", default = "any_version")]
    pub required_version: VersionReq,

    /// Capabilities an engine must implement to open the feed.
    #[serde(rename = "sleet:capabilities", default)]
    pub required_capabilities: Vec<FeedCapability>,
}

impl FeedRequirements {
    /// Creates requirements with no version range and no capabilities.
    pub fn new(creator_version: Version) -> Self {
        Self {
            creator_version,
            required_version: any_version(),
            required_capabilities: Vec::new(),
        }
    }
}

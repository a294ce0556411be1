//! Package identity: the join key across every feed index.
//!
//! Identity equality is case-insensitive on the id and uses semver
//! *precedence* on the version: build metadata is ignored, pre-release
//! labels are not.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a single package version within a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
    /// Package id. Compared case-insensitively; the original casing is
    /// preserved for display.
    pub id: String,
    /// Package version. Compared by semver precedence.
    pub version: Version,
}

impl PackageIdentity {
    /// Creates a new identity.
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Returns the lower-cased id used for path segments and comparisons.
    #[must_use]
    pub fn id_lowercase(&self) -> String {
        self.id.to_ascii_lowercase()
    }

    /// Returns true if this identity refers to the same package id
    /// (any version) as `other`.
    #[must_use]
    pub fn same_id(&self, other: &PackageIdentity) -> bool {
        self.id.eq_ignore_ascii_case(&other.id)
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id)
            && self.version.cmp_precedence(&other.version) == Ordering::Equal
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id_lowercase().hash(state);
        self.version.major.hash(state);
        self.version.minor.hash(state);
        self.version.patch.hash(state);
        self.version.pre.as_str().hash(state);
        // Build metadata deliberately excluded: it does not participate
        // in precedence.
    }
}

impl PartialOrd for PackageIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id_lowercase()
            .cmp(&other.id_lowercase())
            .then_with(|| self.version.cmp_precedence(&other.version))
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ident(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::new(id, Version::parse(version).unwrap())
    }

    #[test]
    fn id_is_case_insensitive() {
        assert_eq!(ident("Newtonsoft.Json", "1.0.0"), ident("newtonsoft.json", "1.0.0"));
    }

    #[test]
    fn build_metadata_ignored() {
        assert_eq!(ident("a", "1.0.0+build.1"), ident("a", "1.0.0+build.2"));
        assert_eq!(ident("a", "1.0.0+sha"), ident("a", "1.0.0"));
    }

    #[test]
    fn prerelease_is_significant() {
        assert_ne!(ident("a", "1.0.0-beta.1"), ident("a", "1.0.0"));
        assert!(ident("a", "1.0.0-beta.1") < ident("a", "1.0.0"));
    }

    #[test]
    fn hash_matches_equality() {
        let mut set = HashSet::new();
        set.insert(ident("A", "2.0.0+meta"));
        assert!(set.contains(&ident("a", "2.0.0")));
    }

    #[test]
    fn ordering_by_id_then_version() {
        let mut v = vec![ident("b", "1.0.0"), ident("a", "2.0.0"), ident("a", "1.0.0")];
        v.sort();
        assert_eq!(v[0], ident("a", "1.0.0"));
        assert_eq!(v[1], ident("a", "2.0.0"));
        assert_eq!(v[2], ident("b", "1.0.0"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn equality_ignores_id_casing(
                id in "[a-zA-Z][a-zA-Z0-9.]{0,24}",
                major in 0u64..100,
                minor in 0u64..100,
                patch in 0u64..100,
            ) {
                let a = PackageIdentity::new(id.clone(), Version::new(major, minor, patch));
                let b = PackageIdentity::new(id.to_ascii_uppercase(), Version::new(major, minor, patch));
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(a.cmp(&b), Ordering::Equal);
            }

            #[test]
            fn ordering_agrees_with_equality(
                id_a in "[a-z]{1,8}",
                id_b in "[a-z]{1,8}",
                major in 0u64..10,
                minor in 0u64..10,
            ) {
                let a = PackageIdentity::new(id_a, Version::new(major, minor, 0));
                let b = PackageIdentity::new(id_b, Version::new(major, minor, 0));
                prop_assert_eq!(a == b, a.cmp(&b) == Ordering::Equal);
            }
        }
    }
}

//! Module `version` defines the version-constraint primitives the solver
//! operates on.
//!
//! ## NIH?
//! The semver crate's `Version` is fine. What's not fine is their
//! `VersionReq`: its vector-of-predicates representation is too flexible to
//! support the operations a solver actually needs (intersection, emptiness,
//! containment checks between whole requirements). Instead we restrict
//! requirements to a four-case set (nothing, everything, one version, or a
//! half-open range), which keeps every operation total and cheap.
//!
//! A range `[lower, upper)` includes its lower bound and excludes its upper
//! bound, matching the caret/tilde desugarings of Cargo and Pub.

use semver::Version;
use std::fmt;

/// A set of concrete versions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VersionSet {
    /// No versions at all.
    Empty,
    /// Every version.
    Any,
    /// Exactly one version.
    Exact(Version),
    /// The half-open interval `[lower, upper)`.
    Range { lower: Version, upper: Version },
}

impl VersionSet {
    /// Creates a range set, collapsing nonsensical bounds into `Empty`.
    pub fn range(lower: Version, upper: Version) -> Self {
        if lower >= upper {
            VersionSet::Empty
        } else {
            VersionSet::Range { lower, upper }
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionSet::Empty => false,
            VersionSet::Any => true,
            VersionSet::Exact(v) => v == version,
            VersionSet::Range { lower, upper } => lower <= version && version < upper,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &VersionSet::Empty
    }

    /// Whether every version of `self` also lies in `other`.
    pub fn subset_of(&self, other: &VersionSet) -> bool {
        match (self, other) {
            (VersionSet::Empty, _) => true,
            (_, VersionSet::Any) => true,
            (_, VersionSet::Empty) => false,
            (VersionSet::Any, _) => false,
            (VersionSet::Exact(a), o) => o.contains(a),
            // A half-open range can never collapse to a single point we can
            // name, so it is only a subset of another range.
            (VersionSet::Range { .. }, VersionSet::Exact(_)) => false,
            (
                VersionSet::Range { lower, upper },
                VersionSet::Range {
                    lower: olo,
                    upper: ohi,
                },
            ) => olo <= lower && upper <= ohi,
        }
    }

    pub fn intersection(&self, other: &VersionSet) -> VersionSet {
        match (self, other) {
            (VersionSet::Empty, _) | (_, VersionSet::Empty) => VersionSet::Empty,
            (VersionSet::Any, s) => s.clone(),
            (s, VersionSet::Any) => s.clone(),
            (VersionSet::Exact(v), s) | (s, VersionSet::Exact(v)) => {
                if s.contains(v) {
                    VersionSet::Exact(v.clone())
                } else {
                    VersionSet::Empty
                }
            }
            (
                VersionSet::Range { lower, upper },
                VersionSet::Range {
                    lower: olo,
                    upper: ohi,
                },
            ) => {
                let lower = if lower >= olo { lower } else { olo };
                let upper = if upper <= ohi { upper } else { ohi };
                VersionSet::range(lower.clone(), upper.clone())
            }
        }
    }
}

impl fmt::Display for VersionSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VersionSet::Empty => write!(f, "no versions"),
            VersionSet::Any => write!(f, "any"),
            VersionSet::Exact(v) => write!(f, "{}", v),
            VersionSet::Range { lower, upper } => write!(f, ">= {} < {}", lower, upper),
        }
    }
}

/// What a dependency declaration may demand of a package: a set of released
/// versions, a specific source revision, or a local unversioned tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Requirement {
    Set(VersionSet),
    Revision(String),
    Unversioned,
}

impl Requirement {
    pub fn any() -> Self {
        Requirement::Set(VersionSet::Any)
    }

    pub fn exact(version: Version) -> Self {
        Requirement::Set(VersionSet::Exact(version))
    }

    pub fn range(lower: Version, upper: Version) -> Self {
        Requirement::Set(VersionSet::range(lower, upper))
    }

    pub fn as_set(&self) -> Option<&VersionSet> {
        if let Requirement::Set(s) = self {
            Some(s)
        } else {
            None
        }
    }
}

impl From<VersionSet> for Requirement {
    fn from(s: VersionSet) -> Self {
        Requirement::Set(s)
    }
}

impl From<Version> for Requirement {
    fn from(v: Version) -> Self {
        Requirement::exact(v)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Requirement::Set(s) => write!(f, "{}", s),
            Requirement::Revision(r) => write!(f, "revision {}", r),
            Requirement::Unversioned => write!(f, "unversioned"),
        }
    }
}

/// The final, concrete form of a resolved package binding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundVersion {
    Version(Version),
    Revision(String),
    Unversioned,
}

impl fmt::Display for BoundVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BoundVersion::Version(v) => write!(f, "{}", v),
            BoundVersion::Revision(r) => write!(f, "revision {}", r),
            BoundVersion::Unversioned => write!(f, "unversioned"),
        }
    }
}

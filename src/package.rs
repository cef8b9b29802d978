//! Module `package` defines the identifier abstraction the solver is generic
//! over, plus the id-at-a-version pairing used when registering dependencies.

use semver::Version;
use std::{
    fmt::{self, Debug, Display},
    hash::Hash,
};

/// Anything usable as a package identifier: cheap to clone, hashable, totally
/// ordered, and printable. Automatically implemented; the solver never asks
/// for more than this.
pub trait PackageName: Clone + Eq + Ord + Hash + Debug + Display {}

impl<T: Clone + Eq + Ord + Hash + Debug + Display> PackageName for T {}

/// A package at a concrete version.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Summary<P> {
    pub id: P,
    pub version: Version,
}

impl<P: PackageName> Summary<P> {
    pub fn new(id: P, version: Version) -> Self {
        Summary { id, version }
    }

    pub fn id(&self) -> &P {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl<P: PackageName> fmt::Display for Summary<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

//! Interfaces for retrieving package metadata.
//!
//! The solver never touches manifests, registries or the network itself; it
//! consumes [`Container`]s handed to it by a [`ContainerProvider`], and the
//! [`ContainerCache`](cache::ContainerCache) makes sure each package's
//! metadata is only fetched once no matter how often the search revisits it.

pub mod cache;

pub use self::cache::ContainerCache;

use crate::{
    package::PackageName,
    resolve::incompat::Incompatibility,
    term::Term,
    util::errors::ErrorKind,
    version::Requirement,
};
use indexmap::IndexMap;
use semver::Version;

/// Everything the solver needs to know about one package: which versions
/// exist, and what each of them (or each known revision) depends on.
///
/// Versions are kept newest-first so that "the first match" is always "the
/// latest match".
#[derive(Clone, Debug, PartialEq)]
pub struct Container<P> {
    id: P,
    releases: Vec<(Version, Vec<(P, Requirement)>)>,
    revisions: IndexMap<String, Vec<(P, Requirement)>>,
}

impl<P: PackageName> Container<P> {
    pub fn new(id: P, mut releases: Vec<(Version, Vec<(P, Requirement)>)>) -> Self {
        releases.sort_by(|a, b| b.0.cmp(&a.0));
        Container {
            id,
            releases,
            revisions: IndexMap::new(),
        }
    }

    /// Adds the dependency list for a source revision.
    pub fn with_revision(mut self, revision: &str, deps: Vec<(P, Requirement)>) -> Self {
        self.revisions.insert(revision.to_string(), deps);
        self
    }

    pub fn id(&self) -> &P {
        &self.id
    }

    /// The container's versions, newest first, filtered.
    pub fn versions<'a, F>(&'a self, filter: F) -> impl Iterator<Item = &'a Version> + 'a
    where
        F: Fn(&Version) -> bool + 'a,
    {
        self.releases
            .iter()
            .map(|(v, _)| v)
            .filter(move |v| filter(v))
    }

    pub fn dependencies(&self, version: &Version) -> Option<&[(P, Requirement)]> {
        self.releases
            .iter()
            .find(|(v, _)| v == version)
            .map(|(_, deps)| deps.as_slice())
    }

    pub fn revision_dependencies(&self, revision: &str) -> Option<&[(P, Requirement)]> {
        self.revisions.get(revision).map(|deps| deps.as_slice())
    }
}

/// The source of containers. Implementations do whatever I/O they like;
/// they must be shareable across threads so the cache can prefetch in the
/// background.
///
/// `skip_update` hints that a fresh copy of the metadata is not worth
/// another round-trip; the cache sets it for background prefetches.
pub trait ContainerProvider<P: PackageName>: Send + Sync {
    fn fetch(&self, id: &P, skip_update: bool) -> Result<Container<P>, ErrorKind>;
}

/// A reporting sink for resolution progress. Purely observational; the
/// solver behaves identically with or without one.
pub trait Delegate<P: PackageName> {
    fn fetching(&self, _pkg: &P) {}
    fn decided(&self, _term: &Term<P>) {}
    fn derived(&self, _term: &Term<P>) {}
    fn conflict(&self, _inc: &Incompatibility<P>) {}
    fn backtracked(&self, _level: u16) {}
}

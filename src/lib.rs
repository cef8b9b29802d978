//! A version solver for package dependency resolution.
//!
//! `solvent` implements the Pubgrub algorithm as used by Dart's Pub
//! (https://github.com/dart-lang/pub/blob/master/doc/solver.md): a
//! conflict-driven search which learns an incompatibility from every dead
//! end it hits, so that whole families of doomed assignments are ruled out
//! at once instead of being re-explored. When no assignment exists at all,
//! the trail of learned incompatibilities doubles as a human-readable
//! explanation of why.
//!
//! The solver is parametrised over the package identifier type; anything
//! hashable, totally ordered and displayable works. Package metadata is
//! pulled in through a [`ContainerProvider`](retrieve::ContainerProvider),
//! memoised by a [`ContainerCache`](retrieve::ContainerCache), and the
//! search itself lives in [`Resolver`](resolve::Resolver).

pub mod package;
pub mod resolve;
pub mod retrieve;
pub mod term;
pub mod util;
pub mod version;

pub use crate::{
    package::{PackageName, Summary},
    resolve::Resolver,
    retrieve::{Container, ContainerCache, ContainerProvider, Delegate},
    term::Term,
    util::errors::{Error, ErrorKind, Res},
    version::{BoundVersion, Requirement, VersionSet},
};

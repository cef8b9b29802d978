//! Because nothing ever works correctly...

use failure::Fail;

pub use failure::Error;

pub type Res<T> = Result<T, Error>;

/// The failures the solver itself can produce. Fetch failures keep the
/// provider's message as a string so the whole kind stays cloneable and can
/// be memoised by the container cache.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "package doesn't exist in the provider")]
    PackageNotFound,
    #[fail(display = "package has no entry for the requested revision")]
    RevisionNotFound,
    #[fail(display = "could not fetch package metadata: {}", _0)]
    CannotFetch(String),
    #[fail(display = "conflict resolution failure")]
    NoConflictRes,
    #[fail(display = "dependency resolution was cancelled")]
    Cancelled,
}

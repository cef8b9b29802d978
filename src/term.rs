//! Module `term` defines the term algebra: polarity-carrying predicates on a
//! single package's chosen version, and the satisfies/intersect operations
//! unit propagation and conflict resolution are built from.

use crate::{
    package::{PackageName, Summary},
    resolve::solution::PartialSolution,
    version::{Requirement, VersionSet},
};
use semver::Version;
use std::fmt;

/// A statement about one package: positive terms assert that the chosen
/// version lies in the requirement, negative terms assert that it does not.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Term<P> {
    pub package: P,
    pub requirement: Requirement,
    pub positive: bool,
}

impl<P: PackageName> Term<P> {
    pub fn new(package: P, requirement: Requirement, positive: bool) -> Self {
        Term {
            package,
            requirement,
            positive,
        }
    }

    pub fn positive(package: P, requirement: Requirement) -> Self {
        Term::new(package, requirement, true)
    }

    pub fn negative(package: P, requirement: Requirement) -> Self {
        Term::new(package, requirement, false)
    }

    /// The positive term pinning a summary's package to exactly its version.
    pub fn exact(summary: &Summary<P>) -> Self {
        Term::positive(
            summary.id.clone(),
            Requirement::exact(summary.version.clone()),
        )
    }

    pub fn package(&self) -> &P {
        &self.package
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Flips polarity only.
    pub fn inverse(&self) -> Term<P> {
        Term::new(
            self.package.clone(),
            self.requirement.clone(),
            !self.positive,
        )
    }

    /// Whether `self` being true forces `other` to be true. Terms about
    /// different packages never satisfy each other.
    ///
    /// For version sets this is the subset lattice: a positive term forces a
    /// positive term of a wider set, forces a negative term of a disjoint
    /// set, and a negative term only forces a negative term of a narrower
    /// set. A negative term never forces a positive one, since it does not
    /// even assert that the package is selected.
    pub fn satisfies(&self, other: &Term<P>) -> bool {
        if self.package != other.package {
            return false;
        }

        match (&self.requirement, &other.requirement) {
            (Requirement::Set(s), Requirement::Set(o)) => {
                match (self.positive, other.positive) {
                    (true, true) => s.subset_of(o),
                    (true, false) => s.intersection(o).is_empty(),
                    (false, true) => false,
                    (false, false) => o.subset_of(s),
                }
            }
            // Revisions behave like singleton sets: equal ids force each
            // other, a selected revision rules every other revision out.
            (Requirement::Revision(a), Requirement::Revision(b)) => {
                match (self.positive, other.positive) {
                    (true, true) => a == b,
                    (true, false) => a != b,
                    (false, true) => false,
                    (false, false) => a == b,
                }
            }
            (Requirement::Unversioned, Requirement::Unversioned) => false,
            _ => false,
        }
    }

    /// Whether choosing `version` would make this term true. Only positive
    /// version-set terms can be satisfied by a concrete version.
    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        match &self.requirement {
            Requirement::Set(s) => self.positive && s.contains(version),
            _ => false,
        }
    }

    /// The strongest term implied by both `self` and `other`, or `None` when
    /// the two cannot be combined into a single term: different packages,
    /// non-version-set requirements, or a combination with no single-range
    /// representation.
    pub fn intersect(&self, other: &Term<P>) -> Option<Term<P>> {
        if self.package != other.package {
            return None;
        }
        if self == other {
            return Some(self.clone());
        }

        let s = self.requirement.as_set()?;
        let o = other.requirement.as_set()?;

        if self.positive && other.positive {
            let both = s.intersection(o);
            if both.is_empty() {
                None
            } else {
                Some(Term::positive(self.package.clone(), both.into()))
            }
        } else if !self.positive && !other.positive {
            // Two negative ranges only merge when they overlap; the union is
            // then again a single range.
            match (s, o) {
                (
                    VersionSet::Range { lower, upper },
                    VersionSet::Range {
                        lower: olo,
                        upper: ohi,
                    },
                ) => {
                    if s.intersection(o).is_empty() {
                        None
                    } else {
                        let lower = if lower <= olo { lower } else { olo };
                        let upper = if upper >= ohi { upper } else { ohi };
                        Some(Term::negative(
                            self.package.clone(),
                            Requirement::range(lower.clone(), upper.clone()),
                        ))
                    }
                }
                _ => None,
            }
        } else {
            let (pos, neg) = if self.positive { (s, o) } else { (o, s) };
            difference(pos, neg)
                .map(|set| Term::positive(self.package.clone(), set.into()))
        }
    }

    /// `self` with everything `other` allows removed.
    pub fn difference(&self, other: &Term<P>) -> Option<Term<P>> {
        self.intersect(&other.inverse())
    }

    /// Whether deciding `self` is consistent with the solution so far: no
    /// prior decision for this package, and every prior assignment about it
    /// is satisfied by `self`.
    pub fn is_valid_decision(&self, solution: &PartialSolution<P>) -> bool {
        for assignment in solution.assignments() {
            if assignment.term().package() != &self.package {
                continue;
            }
            if assignment.is_decision() {
                return false;
            }
            if !self.satisfies(assignment.term()) {
                return false;
            }
        }
        true
    }
}

/// The versions in `pos` not in `neg`, when that is again a single set.
fn difference(pos: &VersionSet, neg: &VersionSet) -> Option<VersionSet> {
    match (pos, neg) {
        (VersionSet::Empty, _) => None,
        (_, VersionSet::Empty) => Some(pos.clone()),
        (_, VersionSet::Any) => None,
        // Removing a point or a range from "any" leaves a set with a hole.
        (VersionSet::Any, _) => None,
        (VersionSet::Exact(a), n) => {
            if n.contains(a) {
                None
            } else {
                Some(pos.clone())
            }
        }
        (VersionSet::Range { .. }, VersionSet::Exact(b)) => {
            if pos.contains(b) {
                None
            } else {
                Some(pos.clone())
            }
        }
        (
            VersionSet::Range { lower, upper },
            r @ VersionSet::Range {
                lower: nlo,
                upper: nhi,
            },
        ) => {
            if pos.intersection(r).is_empty() {
                Some(pos.clone())
            } else if nlo <= lower && nhi >= upper {
                None
            } else if nhi >= upper {
                // The negative range covers our upper end; the prefix below
                // it survives.
                let clipped = VersionSet::range(lower.clone(), nlo.clone());
                if clipped.is_empty() {
                    None
                } else {
                    Some(clipped)
                }
            } else if nlo <= lower {
                // It covers our lower end; the suffix from its upper bound
                // survives.
                let clipped = VersionSet::range(nhi.clone(), upper.clone());
                if clipped.is_empty() {
                    None
                } else {
                    Some(clipped)
                }
            } else {
                // Strictly interior: the remainder is two disjoint pieces.
                None
            }
        }
    }
}

impl<P: PackageName> fmt::Display for Term<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.positive {
            write!(f, "{} {}", self.package, self.requirement)
        } else {
            write!(f, "not {} {}", self.package, self.requirement)
        }
    }
}

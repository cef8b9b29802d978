//! Incompatibilities for the dependency resolver.

use crate::{
    package::{PackageName, Summary},
    term::Term,
    version::Requirement,
};
use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt;

/// Where an incompatibility came from. `Derived` holds the store indices of
/// the two parents it was resolved from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncompatibilityCause<P> {
    /// The clause forcing the root package to be selected.
    Root,
    /// A dependency declared by the contained package.
    Dependency(P),
    /// No version of the mentioned package matches the mentioned requirement.
    Unavailable,
    Derived(usize, usize),
}

/// A set of terms which cannot all be true at once. Terms are keyed by
/// package; duplicates handed to the constructor are merged.
#[derive(Clone)]
pub struct Incompatibility<P> {
    terms: IndexMap<P, Term<P>>,
    cause: IncompatibilityCause<P>,
}

impl<P: PackageName> PartialEq for Incompatibility<P> {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms && self.cause == other.cause
    }
}

impl<P: PackageName> Eq for Incompatibility<P> {}

/// How the partial solution relates to an incompatibility.
#[derive(Clone, Debug)]
pub enum IncompatMatch<P> {
    /// Every term is satisfied: the solution violates the incompatibility.
    Satisfied,
    /// Every term but this one is satisfied.
    Almost(Term<P>),
    Unsatisfied,
}

impl<P: PackageName> Incompatibility<P> {
    pub fn new(terms: Vec<Term<P>>, cause: IncompatibilityCause<P>) -> Self {
        let mut map: IndexMap<P, Term<P>> = IndexMap::new();
        for term in terms {
            let key = term.package().clone();
            let merged = match map.get(&key) {
                Some(existing) => existing.intersect(&term).unwrap_or(term),
                None => term,
            };
            map.insert(key, merged);
        }

        if let IncompatibilityCause::Derived(_, _) = cause {
            // Conflict resolution may legitimately resolve down to nothing;
            // an empty derived clause is the "no solution at all" sentinel.
        } else {
            assert!(
                !map.is_empty(),
                "external incompatibility with no terms"
            );
        }

        Incompatibility { terms: map, cause }
    }

    /// The clause encoding "`depender` at its version requires `dep`".
    pub fn from_dep(depender: &Summary<P>, dep: (P, Requirement)) -> Self {
        let cause = IncompatibilityCause::Dependency(depender.id.clone());
        Incompatibility::new(
            vec![Term::exact(depender), Term::negative(dep.0, dep.1)],
            cause,
        )
    }

    pub fn terms(&self) -> &IndexMap<P, Term<P>> {
        &self.terms
    }

    pub fn term_for(&self, pkg: &P) -> Option<&Term<P>> {
        self.terms.get(pkg)
    }

    pub fn cause(&self) -> &IncompatibilityCause<P> {
        &self.cause
    }

    pub fn derived(&self) -> Option<(usize, usize)> {
        if let IncompatibilityCause::Derived(l, r) = self.cause {
            Some((l, r))
        } else {
            None
        }
    }

    pub fn is_derived(&self) -> bool {
        self.derived().is_some()
    }

    pub fn show(&self) -> String {
        match &self.cause {
            IncompatibilityCause::Dependency(_) => {
                assert!(self.terms.len() == 2);
                let depender = self.terms.get_index(0).unwrap().1;
                let dependee = self.terms.get_index(1).unwrap().1;
                format!(
                    "{} {} depends on {} {}",
                    depender.package(),
                    depender.requirement(),
                    dependee.package(),
                    dependee.requirement(),
                )
            }
            IncompatibilityCause::Unavailable => {
                assert!(self.terms.len() == 1);
                let term = self.terms.get_index(0).unwrap().1;
                format!("{} {} is unavailable", term.package(), term.requirement())
            }
            IncompatibilityCause::Root => "the root package was chosen".to_string(),
            IncompatibilityCause::Derived(_, _) => {
                if self.terms.is_empty() {
                    "no set of package versions can work".to_string()
                } else if self.terms.len() == 1 {
                    let term = self.terms.get_index(0).unwrap().1;
                    format!("{} is impossible", term)
                } else if self.terms.len() == 2 {
                    let t1 = self.terms.get_index(0).unwrap().1;
                    let t2 = self.terms.get_index(1).unwrap().1;
                    format!("{} is incompatible with {}", t1, t2)
                } else {
                    format!(
                        "one of {} must be false",
                        self.terms.values().map(|t| t.to_string()).join("; ")
                    )
                }
            }
        }
    }

    // TODO: Actually special-case stuff to look nicer.
    pub fn show_combine(
        &self,
        other: &Incompatibility<P>,
        self_linum: Option<u16>,
        other_linum: Option<u16>,
    ) -> String {
        if let Some(b) = self.show_combine_same(other, self_linum) {
            return b;
        }

        let mut buf = self.show();
        if let Some(l) = self_linum {
            buf.push_str(" (");
            buf.push_str(&l.to_string());
            buf.push(')');
        }
        buf.push_str(" and ");
        buf.push_str(&other.show());
        if let Some(l) = other_linum {
            buf.push_str(" (");
            buf.push_str(&l.to_string());
            buf.push(')');
        }

        buf
    }

    fn show_combine_same(
        &self,
        other: &Incompatibility<P>,
        self_linum: Option<u16>,
    ) -> Option<String> {
        if self == other {
            let mut buf = self.show();
            if let Some(l) = self_linum {
                buf.push_str(" (");
                buf.push_str(&l.to_string());
                buf.push(')');
            }
            Some(buf)
        } else {
            None
        }
    }
}

impl<P: PackageName> fmt::Debug for Incompatibility<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Incompatibility::{:?}({})",
            self.cause,
            self.terms.values().map(|t| t.to_string()).join("; "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn duplicate_packages_merge() {
        let ic = Incompatibility::new(
            vec![
                Term::positive("a", Requirement::range(v("1.0.0"), v("3.0.0"))),
                Term::positive("a", Requirement::range(v("2.0.0"), v("4.0.0"))),
            ],
            IncompatibilityCause::Unavailable,
        );
        assert_eq!(ic.terms().len(), 1);
        assert_eq!(
            ic.term_for(&"a").unwrap().requirement(),
            &Requirement::range(v("2.0.0"), v("3.0.0"))
        );
    }

    #[test]
    fn dependency_clause_shape() {
        let app = Summary::new("app", v("1.0.0"));
        let ic = Incompatibility::from_dep(
            &app,
            ("b", Requirement::range(v("1.0.0"), v("2.0.0"))),
        );
        assert_eq!(ic.terms().len(), 2);
        assert!(ic.term_for(&"app").unwrap().positive);
        assert!(!ic.term_for(&"b").unwrap().positive);
        assert_eq!(
            ic.show(),
            "app 1.0.0 depends on b >= 1.0.0 < 2.0.0"
        );
    }
}

//! The partial solution: the ordered log of assignments made so far, with
//! the per-package views the resolver consults during propagation, decision
//! making and conflict resolution.

use crate::{
    package::PackageName,
    resolve::{
        assignment::{Assignment, AssignmentType},
        incompat::{IncompatMatch, Incompatibility},
    },
    term::Term,
};
use indexmap::{indexset, IndexMap};
use std::cmp;

/// How the solution's accumulated knowledge about a package relates to a
/// single term.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TermRelation {
    /// The solution forces the term to be true.
    Satisfied,
    /// The solution forces the term to be false.
    Contradicted,
    /// Neither; the term could still go either way.
    Inconclusive,
}

#[derive(Clone, Debug)]
pub struct PartialSolution<P> {
    assignments: Vec<Assignment<P>>,
    /// Decision terms by package.
    decisions: IndexMap<P, Term<P>>,
    /// Per-package accumulated knowledge: whether any assignment about the
    /// package was positive (positivity is sticky), and the fold of every
    /// assignment about it through `Term::intersect`. The fold is `None`
    /// once it hits a pair with no single-term intersection; the individual
    /// assignments then remain the source of truth.
    relation: IndexMap<P, (bool, Option<Term<P>>)>,
    level: u16,
    step: u16,
}

impl<P: PackageName> PartialSolution<P> {
    pub fn new() -> Self {
        PartialSolution {
            assignments: vec![],
            decisions: IndexMap::new(),
            relation: IndexMap::new(),
            level: 0,
            step: 1,
        }
    }

    pub fn assignments(&self) -> &[Assignment<P>] {
        &self.assignments
    }

    pub fn decisions(&self) -> &IndexMap<P, Term<P>> {
        &self.decisions
    }

    pub fn decision_level(&self) -> u16 {
        self.level
    }

    /// Appends a derivation forced by the incompatibility at `cause`, at the
    /// current decision level.
    pub fn derive(&mut self, term: Term<P>, cause: usize) {
        let a = Assignment::new(
            self.step,
            self.level,
            term,
            AssignmentType::Derivation { cause },
        );
        self.register(&a);
        self.assignments.push(a);
        self.step += 1;
    }

    /// Appends a decision; the decision level becomes the number of decision
    /// assignments in the log.
    pub fn decide(&mut self, term: Term<P>) {
        self.level += 1;
        let a = Assignment::new(self.step, self.level, term.clone(), AssignmentType::Decision);
        self.decisions.insert(term.package().clone(), term);
        self.register(&a);
        self.assignments.push(a);
        self.step += 1;
        debug_assert_eq!(self.level as usize, self.decisions.len());
    }

    /// How the accumulated assignments about `term`'s package relate to the
    /// term itself. When the fold is intact it answers for the conjunction
    /// of everything known; when it is broken, any single assignment that
    /// forces the term (or its inverse) still decides the question.
    pub fn relation(&self, term: &Term<P>) -> TermRelation {
        match self.relation.get(term.package()) {
            None => TermRelation::Inconclusive,
            // An assignment of literally this term always makes it true,
            // which matters for revision and unversioned terms that the
            // satisfaction lattice itself cannot vouch for.
            Some((_, Some(folded))) => {
                let inverse = term.inverse();
                if folded == term || folded.satisfies(term) {
                    TermRelation::Satisfied
                } else if folded == &inverse || folded.satisfies(&inverse) {
                    TermRelation::Contradicted
                } else {
                    TermRelation::Inconclusive
                }
            }
            Some((_, None)) => {
                let mut about = self
                    .assignments
                    .iter()
                    .filter(|a| a.pkg() == term.package());
                let inverse = term.inverse();
                if about
                    .clone()
                    .any(|a| a.term() == term || a.term().satisfies(term))
                {
                    TermRelation::Satisfied
                } else if about.any(|a| a.term() == &inverse || a.term().satisfies(&inverse)) {
                    TermRelation::Contradicted
                } else {
                    TermRelation::Inconclusive
                }
            }
        }
    }

    /// How this solution relates to `inc` as a whole: every term satisfied,
    /// every term but one (the returned one), or neither. A single
    /// contradicted term means the incompatibility can no longer fire at
    /// all.
    pub fn satisfies(&self, inc: &Incompatibility<P>) -> IncompatMatch<P> {
        let mut unsatisfied = None;
        for term in inc.terms().values() {
            match self.relation(term) {
                TermRelation::Satisfied => {}
                TermRelation::Contradicted => return IncompatMatch::Unsatisfied,
                TermRelation::Inconclusive => {
                    if unsatisfied.is_none() {
                        unsatisfied = Some(term.clone());
                    } else {
                        return IncompatMatch::Unsatisfied;
                    }
                }
            }
        }

        match unsatisfied {
            None => IncompatMatch::Satisfied,
            Some(t) => IncompatMatch::Almost(t),
        }
    }

    /// The earliest assignments relevant to a satisfied incompatibility: the
    /// `satisfier` is the first assignment whose prefix satisfies `inc`, and
    /// `previous` is the first assignment whose prefix, together with the
    /// satisfier, already satisfies it. `previous` is `None` when the
    /// satisfier alone suffices, and both are `None` while `inc` is not
    /// satisfied at all.
    pub fn earliest_satisfiers(
        &self,
        inc: &Incompatibility<P>,
    ) -> (Option<&Assignment<P>>, Option<&Assignment<P>>) {
        let satisfier_ix =
            (0..self.assignments.len()).find(|&ix| self.prefix_satisfies(inc, Some(ix), None));
        let satisfier_ix = match satisfier_ix {
            Some(ix) => ix,
            None => return (None, None),
        };

        if self.prefix_satisfies(inc, None, Some(satisfier_ix)) {
            return (None, Some(&self.assignments[satisfier_ix]));
        }
        let previous_ix = (0..=satisfier_ix)
            .find(|&ix| self.prefix_satisfies(inc, Some(ix), Some(satisfier_ix)))
            .unwrap_or(satisfier_ix);

        (
            Some(&self.assignments[previous_ix]),
            Some(&self.assignments[satisfier_ix]),
        )
    }

    /// Whether the assignments up to and including `upto` (plus, optionally,
    /// one re-appended assignment) satisfy every term of `inc`. A term is
    /// satisfied when the running intersection of the prefix's assignments
    /// about its package forces it, or, failing a representable
    /// intersection, when a single assignment does.
    fn prefix_satisfies(
        &self,
        inc: &Incompatibility<P>,
        upto: Option<usize>,
        extra: Option<usize>,
    ) -> bool {
        let end = upto.map(|ix| ix + 1).unwrap_or(0);
        inc.terms().values().all(|term| {
            let mut folded: Option<Term<P>> = None;
            let mut any_alone = false;
            for a in self.assignments[..end]
                .iter()
                .chain(extra.map(|ix| &self.assignments[ix]))
            {
                if a.pkg() != term.package() {
                    continue;
                }
                any_alone = any_alone || a.term() == term || a.term().satisfies(term);
                folded = match folded {
                    None => Some(a.term().clone()),
                    Some(f) => f.intersect(a.term()),
                };
            }
            any_alone || folded.map(|f| f.satisfies(term)).unwrap_or(false)
        })
    }

    /// Drops every assignment above `to_level`, preserving the order of the
    /// remainder, and rebuilds the per-package views for the packages that
    /// lost assignments.
    pub fn backtrack(&mut self, to_level: u16) {
        debug_assert!(to_level <= self.level);
        let mut packages = indexset!();
        self.level = cmp::min(self.level, to_level);

        while let Some(last) = self.assignments.pop() {
            if last.level() > to_level {
                self.step -= 1;
                packages.insert(last.pkg().clone());
            } else {
                self.assignments.push(last);
                break;
            }
        }

        for pkg in &packages {
            self.decisions.remove(pkg);
            self.relation.remove(pkg);
        }

        let assignments = self.assignments.clone();
        for a in assignments {
            if packages.contains(a.pkg()) {
                self.register(&a);
            }
        }
    }

    /// The fold of every assignment about `pkg` through `Term::intersect`.
    pub fn version_intersection(&self, pkg: &P) -> Option<Term<P>> {
        self.relation.get(pkg).and_then(|(_, t)| t.clone())
    }

    /// Every package some positive assignment mentions, with its folded
    /// term when one is representable.
    pub fn positive_packages<'a>(&'a self) -> impl Iterator<Item = (&'a P, Option<&'a Term<P>>)> + 'a {
        self.relation
            .iter()
            .filter(|(_, (positive, _))| *positive)
            .map(|(p, (_, t))| (p, t.as_ref()))
    }

    /// Decision candidates: positively-constrained packages with no decision
    /// yet, each represented by its folded term, or by its most recent
    /// positive assignment's term when the fold is broken.
    pub fn unsatisfied(&self) -> Vec<Term<P>> {
        self.positive_packages()
            .filter(|(p, _)| !self.decisions.contains_key(*p))
            .map(|(p, folded)| match folded {
                Some(t) => t.clone(),
                None => self
                    .assignments
                    .iter()
                    .rev()
                    .find(|a| a.pkg() == p && a.term().positive)
                    .map(|a| a.term().clone())
                    .expect("positively-constrained package with no positive assignment"),
            })
            .collect()
    }

    fn register(&mut self, a: &Assignment<P>) {
        let pkg = a.pkg().clone();
        let (positive, folded) = match self.relation.get(&pkg) {
            Some((positive, Some(existing))) => {
                (*positive || a.term().positive, existing.intersect(a.term()))
            }
            Some((positive, None)) => (*positive || a.term().positive, None),
            None => (a.term().positive, Some(a.term().clone())),
        };
        self.relation.insert(pkg, (positive, folded));
    }
}

impl<P: PackageName> Default for PartialSolution<P> {
    fn default() -> Self {
        PartialSolution::new()
    }
}

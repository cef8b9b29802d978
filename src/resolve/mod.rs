//! Module `resolve` implements dependency resolution.
//!
//! The solver uses the Pubgrub algorithm, as used by Dart's Pub
//! (https://github.com/dart-lang/pub/blob/master/doc/solver.md): unit
//! propagation derives everything the current incompatibilities force, a
//! violated incompatibility is resolved into a learned clause plus a
//! backjump, and decision making picks the latest version of some package
//! that still needs one. The three phases hand off to each other until
//! either every positively-constrained package has a decision or conflict
//! resolution runs out of road, in which case the trail of learned clauses
//! is rendered into an explanation.

pub mod assignment;
pub mod incompat;
pub mod report;
pub mod solution;

use failure::bail;
use indexmap::{indexset, IndexMap};
use semver::Version;
use slog::{error, info, o, trace, Logger};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use textwrap::fill;

use self::{
    incompat::{IncompatMatch, Incompatibility, IncompatibilityCause},
    report::report,
    solution::PartialSolution,
};
use crate::{
    package::{PackageName, Summary},
    retrieve::{Container, ContainerCache, Delegate},
    term::Term,
    util::errors::{ErrorKind, Res},
    version::{BoundVersion, Requirement, VersionSet},
};

pub struct Resolver<'c, P: PackageName> {
    solution: PartialSolution<P>,
    incompats: Vec<Incompatibility<P>>,
    incompat_ixs: IndexMap<P, Vec<usize>>,
    cache: &'c ContainerCache<P>,
    root: P,
    root_requirement: Requirement,
    root_constraints: Vec<(P, Requirement)>,
    pins: IndexMap<P, Requirement>,
    delegate: Option<&'c dyn Delegate<P>>,
    cancelled: Option<Arc<AtomicBool>>,
    /// The incompatibility conflict resolution bottomed out on, if it did.
    terminal: Option<usize>,
    pub logger: Logger,
}

impl<'c, P: PackageName> Resolver<'c, P> {
    pub fn new(
        plog: &Logger,
        cache: &'c ContainerCache<P>,
        root: P,
        pins: Vec<(P, Requirement)>,
    ) -> Self {
        let logger = plog.new(o!("phase" => "resolve"));
        Resolver {
            solution: PartialSolution::new(),
            incompats: vec![],
            incompat_ixs: IndexMap::new(),
            cache,
            root,
            root_requirement: Requirement::any(),
            root_constraints: vec![],
            pins: pins.into_iter().collect(),
            delegate: None,
            cancelled: None,
            terminal: None,
            logger,
        }
    }

    /// Builds a resolver from a flat list of constraints; the first
    /// constraint names the root package, the rest become dependencies of
    /// it.
    pub fn from_constraints(
        plog: &Logger,
        cache: &'c ContainerCache<P>,
        constraints: Vec<(P, Requirement)>,
        pins: Vec<(P, Requirement)>,
    ) -> Res<Self> {
        let mut constraints = constraints.into_iter();
        let (root, root_requirement) = match constraints.next() {
            Some(c) => c,
            None => bail!("solving requires at least one constraint"),
        };

        let mut resolver = Resolver::new(plog, cache, root, pins);
        resolver.root_requirement = root_requirement;
        resolver.root_constraints = constraints.collect();
        Ok(resolver)
    }

    pub fn with_delegate(mut self, delegate: &'c dyn Delegate<P>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Hands the resolver a flag it checks between iterations of the outer
    /// loop; raising it makes the solve return promptly with an error.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    pub fn solve(self) -> Res<Vec<(P, BoundVersion)>> {
        let mut s = self;

        info!(s.logger, "beginning dependency resolution");
        match s.solve_loop() {
            Ok(bindings) => {
                info!(s.logger, "solve successful");
                Ok(bindings)
            }
            Err(e) => {
                error!(s.logger, "solve failed");
                match s.terminal {
                    Some(ix) => {
                        // Wrap line by line so the cascade's numbering and
                        // paragraph breaks survive.
                        let explanation = report(&s.incompats, ix)
                            .lines()
                            .map(|l| fill(l, 80))
                            .collect::<Vec<_>>()
                            .join("\n");
                        bail!("{}", explanation)
                    }
                    None => Err(e),
                }
            }
        }
    }

    fn solve_loop(&mut self) -> Res<Vec<(P, BoundVersion)>> {
        let root_term = Term::negative(self.root.clone(), self.root_requirement.clone());
        self.incompatibility(vec![root_term], IncompatibilityCause::Root);
        for (dep, req) in self.root_constraints.clone() {
            let terms = vec![
                Term::positive(self.root.clone(), Requirement::any()),
                Term::negative(dep, req),
            ];
            self.incompatibility(terms, IncompatibilityCause::Dependency(self.root.clone()));
        }

        let mut next = Some(self.root.clone());
        while let Some(n) = next {
            self.check_cancelled()?;
            self.propagate(n)?;
            next = self.choose_pkg_version()?;
        }

        Ok(self.bindings())
    }

    // 1: Unit propagation
    fn propagate(&mut self, pkg: P) -> Res<()> {
        let mut changed = indexset!(pkg);

        while let Some(package) = changed.pop() {
            if let Some(icixs) = self.incompat_ixs.get(&package).cloned() {
                'f: for icix in icixs.iter().rev() {
                    match self.propagate_incompat(*icix) {
                        IncompatMatch::Almost(term) => {
                            changed.insert(term.package().clone());
                        }
                        IncompatMatch::Satisfied => {
                            if let Some(d) = self.delegate {
                                d.conflict(&self.incompats[*icix]);
                            }
                            let root = self.resolve_conflict(*icix)?;
                            changed.clear();
                            if let IncompatMatch::Almost(term) = self.propagate_incompat(root) {
                                changed.insert(term.package().clone());
                            } else {
                                unreachable!(
                                    "learned clause does not almost-satisfy the backtracked solution"
                                );
                            }
                            break 'f;
                        }
                        IncompatMatch::Unsatisfied => {}
                    }
                }
            }
        }

        Ok(())
    }

    fn propagate_incompat(&mut self, icix: usize) -> IncompatMatch<P> {
        let inc = self.incompats[icix].clone();
        match self.solution.satisfies(&inc) {
            IncompatMatch::Almost(term) => {
                self.derivation(term.inverse(), icix);
                IncompatMatch::Almost(term)
            }
            m => m,
        }
    }

    // 2: Conflict resolution
    fn resolve_conflict(&mut self, conflict_ix: usize) -> Res<usize> {
        trace!(self.logger, "entering conflict resolution");
        let mut inc_ix = conflict_ix;
        let mut new_incompatibility = false;

        while !self.is_failure(&self.incompats[inc_ix]) {
            let inc = self.incompats[inc_ix].clone();
            let (previous, satisfier) = {
                let (p, s) = self.solution.earliest_satisfiers(&inc);
                (p.cloned(), s.cloned())
            };
            let satisfier = satisfier.expect("conflicting incompatibility is not satisfied");
            let term = inc
                .term_for(satisfier.pkg())
                .expect("satisfier's package missing from its incompatibility")
                .clone();
            let previous_level = previous.map(|a| a.level()).unwrap_or(1);

            if satisfier.is_decision() || previous_level != satisfier.level() {
                self.solution.backtrack(previous_level);
                if let Some(d) = self.delegate {
                    d.backtracked(previous_level);
                }
                if new_incompatibility {
                    self.incompat_ixs(inc_ix);
                }
                trace!(
                    self.logger, "conflict resolved";
                    "learned" => format!("{:?}", self.incompats[inc_ix]),
                    "level" => previous_level
                );
                return Ok(inc_ix);
            }

            // The satisfier is a derivation at the same level as its
            // previous satisfier; resolve it against its own cause.
            let cause_ix = satisfier
                .cause()
                .expect("satisfier at its own level must be a derivation");
            let cause = self.incompats[cause_ix].clone();

            let mut new_terms: Vec<Term<P>> = inc
                .terms()
                .values()
                .filter(|t| t.package() != satisfier.pkg())
                .cloned()
                .collect();
            new_terms.extend(
                cause
                    .terms()
                    .values()
                    .filter(|t| t.package() != satisfier.pkg())
                    .cloned(),
            );
            if !satisfier.term().satisfies(&term) {
                let inverse = satisfier.term().inverse();
                if inverse != term {
                    new_terms.push(inverse);
                }
            }

            let new_inc =
                Incompatibility::new(new_terms, IncompatibilityCause::Derived(inc_ix, cause_ix));
            trace!(self.logger, "resolvent"; "incompat" => format!("{:?}", new_inc));
            inc_ix = self.incompats.len();
            self.incompats.push(new_inc);
            new_incompatibility = true;
        }

        self.terminal = Some(inc_ix);
        Err(ErrorKind::NoConflictRes.into())
    }

    fn is_failure(&self, inc: &Incompatibility<P>) -> bool {
        inc.terms().is_empty()
            || (inc.terms().len() == 1 && inc.terms().get_index(0).unwrap().0 == &self.root)
    }

    // 3: Decision making
    fn choose_pkg_version(&mut self) -> Res<Option<P>> {
        let candidates = self.solution.unsatisfied();

        for candidate in candidates {
            // An unversioned term satisfies nothing, itself included, so no
            // decision for it can ever be valid; it stays underived and is
            // bound as unversioned at the end.
            if candidate.requirement() == &Requirement::Unversioned {
                continue;
            }
            let pkg = candidate.package().clone();

            if let Some(d) = self.delegate {
                d.fetching(&pkg);
            }
            let container = match self.cache.get(&pkg) {
                Ok(c) => c,
                Err(kind) => return Err(kind.into()),
            };

            match candidate.requirement().clone() {
                Requirement::Set(_) => match self.best(&container, &pkg) {
                    Some(version) => {
                        let sum = Summary::new(pkg.clone(), version.clone());
                        let deps = container
                            .dependencies(&version)
                            .expect("chosen version vanished from its container")
                            .to_vec();
                        for dep in deps {
                            self.incompatibility_of(Incompatibility::from_dep(&sum, dep));
                        }
                        self.decision(Term::exact(&sum));
                        return Ok(Some(pkg));
                    }
                    None => {
                        trace!(
                            self.logger, "no matching version";
                            "package" => pkg.to_string(),
                            "requirement" => candidate.requirement().to_string()
                        );
                        self.incompatibility(vec![candidate], IncompatibilityCause::Unavailable);
                        return Ok(Some(pkg));
                    }
                },
                Requirement::Revision(rev) => {
                    let rev_term = Term::positive(pkg.clone(), Requirement::Revision(rev.clone()));
                    if !rev_term.is_valid_decision(&self.solution) {
                        continue;
                    }
                    match container.revision_dependencies(&rev) {
                        Some(deps) => {
                            let deps = deps.to_vec();
                            for (dep, req) in deps {
                                let terms = vec![rev_term.clone(), Term::negative(dep, req)];
                                self.incompatibility(
                                    terms,
                                    IncompatibilityCause::Dependency(pkg.clone()),
                                );
                            }
                            self.decision(rev_term);
                            return Ok(Some(pkg));
                        }
                        None => {
                            self.incompatibility(
                                vec![candidate],
                                IncompatibilityCause::Unavailable,
                            );
                            return Ok(Some(pkg));
                        }
                    }
                }
                Requirement::Unversioned => continue,
            }
        }

        Ok(None)
    }

    /// The version to decide for a candidate package: the pinned version
    /// when one is given and still allowed, otherwise the newest allowed
    /// version. A version is allowed when deciding it would be consistent
    /// with every assignment made about the package so far.
    fn best(&self, container: &Container<P>, pkg: &P) -> Option<Version> {
        let allowed = |v: &Version| {
            Term::positive(pkg.clone(), Requirement::exact(v.clone()))
                .is_valid_decision(&self.solution)
        };

        if let Some(Requirement::Set(pin)) = self.pins.get(pkg) {
            let pinned = container
                .versions(|v| allowed(v) && pin.contains(v))
                .next()
                .cloned();
            if pinned.is_some() {
                return pinned;
            }
        }

        let result = container.versions(|v| allowed(v)).next().cloned();
        result
    }

    fn bindings(&self) -> Vec<(P, BoundVersion)> {
        let mut out = vec![];
        for (pkg, folded) in self.solution.positive_packages() {
            let bound = match self.solution.decisions().get(pkg) {
                Some(decision) => match decision.requirement() {
                    Requirement::Set(VersionSet::Exact(v)) => BoundVersion::Version(v.clone()),
                    Requirement::Revision(r) => BoundVersion::Revision(r.clone()),
                    req => panic!("{} was decided to the non-concrete {}", pkg, req),
                },
                None => match folded.map(Term::requirement) {
                    Some(Requirement::Unversioned) | Some(Requirement::Set(VersionSet::Any)) => {
                        BoundVersion::Unversioned
                    }
                    Some(req) => panic!("solved state left {} constrained to {}", pkg, req),
                    None => panic!("solved state has no usable constraint for {}", pkg),
                },
            };
            out.push((pkg.clone(), bound));
        }
        out
    }

    fn check_cancelled(&self) -> Res<()> {
        if let Some(flag) = &self.cancelled {
            if flag.load(Ordering::SeqCst) {
                return Err(ErrorKind::Cancelled.into());
            }
        }
        Ok(())
    }

    fn decision(&mut self, term: Term<P>) {
        trace!(
            self.logger, "new decision";
            "level" => self.solution.decision_level() + 1,
            "term" => term.to_string()
        );
        if let Some(d) = self.delegate {
            d.decided(&term);
        }
        self.solution.decide(term);
    }

    fn derivation(&mut self, term: Term<P>, cause: usize) {
        trace!(
            self.logger, "new derivation";
            "level" => self.solution.decision_level(),
            "term" => term.to_string()
        );
        if let Some(d) = self.delegate {
            d.derived(&term);
        }
        self.solution.derive(term, cause);
    }

    fn incompatibility(
        &mut self,
        terms: Vec<Term<P>>,
        cause: IncompatibilityCause<P>,
    ) -> usize {
        self.incompatibility_of(Incompatibility::new(terms, cause))
    }

    fn incompatibility_of(&mut self, ic: Incompatibility<P>) -> usize {
        // Re-registering an identical clause would only bloat the store;
        // this happens whenever a backjump makes the same decision twice.
        if let Some(ix) = self.incompats.iter().position(|i| i == &ic) {
            return ix;
        }

        trace!(self.logger, "new incompat"; "incompat" => format!("{:?}", ic));
        let new_ix = self.incompats.len();
        self.incompats.push(ic);
        self.incompat_ixs(new_ix);

        new_ix
    }

    fn incompat_ixs(&mut self, icix: usize) {
        let ic = &self.incompats[icix];
        for pkg in ic.terms().keys() {
            self.incompat_ixs
                .entry(pkg.clone())
                .or_insert_with(Vec::new)
                .push(icix);
        }
    }
}

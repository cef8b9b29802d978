//! Rendering the derivation graph of a failed solve into prose.
//!
//! A terminal incompatibility is the root of a DAG of `Derived` causes.
//! The walk below narrates that DAG as a cascade of "Because X and Y, Z."
//! lines; incompatibilities referred to more than once get a stable line
//! number so later lines can cite them instead of repeating their whole
//! derivation. None of this touches solver state.

use crate::{package::PackageName, resolve::incompat::Incompatibility};
use indexmap::IndexMap;
use petgraph::{graphmap::DiGraphMap, Direction};

/// Renders the explanation for the incompatibility at `terminal`.
pub fn report<P: PackageName>(incompats: &[Incompatibility<P>], terminal: usize) -> String {
    let mut out = String::from("version solving has failed\n\n");

    if !incompats[terminal].is_derived() {
        out.push_str(&incompats[terminal].show());
        out.push('.');
        out.push('\n');
        return out;
    }

    Reporter::new(incompats, terminal).narrate(&mut out);
    out
}

struct Reporter<'a, P: PackageName> {
    incompats: &'a [Incompatibility<P>],
    terminal: usize,
    /// Edges from each derived incompatibility to its parents, restricted
    /// to the part of the store reachable from the terminal.
    graph: DiGraphMap<usize, ()>,
    linum: IndexMap<usize, u16>,
    cur_linum: u16,
}

impl<'a, P: PackageName> Reporter<'a, P> {
    fn new(incompats: &'a [Incompatibility<P>], terminal: usize) -> Self {
        let mut graph = DiGraphMap::new();
        let mut stack = vec![terminal];
        graph.add_node(terminal);
        while let Some(ix) = stack.pop() {
            if let Some((l, r)) = incompats[ix].derived() {
                for p in &[l, r] {
                    let seen = graph.contains_node(*p);
                    graph.add_edge(ix, *p, ());
                    if !seen {
                        stack.push(*p);
                    }
                }
            }
        }

        Reporter {
            incompats,
            terminal,
            graph,
            linum: IndexMap::new(),
            cur_linum: 1,
        }
    }

    fn narrate(&mut self, out: &mut String) {
        self.visit(self.terminal, out);
    }

    /// How many derivations refer to this incompatibility.
    fn shared(&self, ix: usize) -> bool {
        self.graph
            .neighbors_directed(ix, Direction::Incoming)
            .count()
            >= 2
    }

    /// A derivation is single-line when at least one of its parents is
    /// external, so it can be told without a sub-derivation of its own.
    fn single_line(&self, ix: usize) -> bool {
        self.incompats[ix]
            .derived()
            .map(|(l, r)| !self.incompats[l].is_derived() || !self.incompats[r].is_derived())
            .unwrap_or(false)
    }

    /// A derived parent collapses into its own derivation when nothing else
    /// refers to it and exactly one of its parents is derived and still
    /// unnumbered: "And because <its external> and <ours>, ...".
    fn collapse_target(&self, dix: usize) -> Option<(usize, usize)> {
        if self.shared(dix) {
            return None;
        }
        let (a, b) = self.incompats[dix].derived()?;
        match (self.incompats[a].is_derived(), self.incompats[b].is_derived()) {
            (true, false) if !self.linum.contains_key(&a) => Some((a, b)),
            (false, true) if !self.linum.contains_key(&b) => Some((b, a)),
            _ => None,
        }
    }

    fn visit(&mut self, ix: usize, out: &mut String) {
        let incompats = self.incompats;
        let inc = &incompats[ix];
        let (lix, rix) = inc
            .derived()
            .expect("only derived incompatibilities are narrated");
        let (left, right) = (&incompats[lix], &incompats[rix]);

        match (left.is_derived(), right.is_derived()) {
            (true, true) => {
                let left_line = self.linum.get(&lix).cloned();
                let right_line = self.linum.get(&rix).cloned();

                match (left_line, right_line) {
                    (Some(l), Some(r)) => {
                        let text = format!(
                            "Because {}, {}.",
                            left.show_combine(right, Some(l), Some(r)),
                            inc.show()
                        );
                        self.line(out, text, ix);
                    }
                    (Some(l), None) => {
                        self.visit(rix, out);
                        let text =
                            format!("And because {} ({}), {}.", left.show(), l, inc.show());
                        self.line(out, text, ix);
                    }
                    (None, Some(r)) => {
                        self.visit(lix, out);
                        let text =
                            format!("And because {} ({}), {}.", right.show(), r, inc.show());
                        self.line(out, text, ix);
                    }
                    (None, None) => {
                        if self.single_line(lix) {
                            self.visit(lix, out);
                            self.visit(rix, out);
                            self.line(out, format!("Thus, {}.", inc.show()), ix);
                        } else if self.single_line(rix) {
                            self.visit(rix, out);
                            self.visit(lix, out);
                            self.line(out, format!("Thus, {}.", inc.show()), ix);
                        } else {
                            // Both sides need their own paragraphs; number
                            // them and refer back.
                            self.visit(lix, out);
                            let l = self.ensure_numbered(out, lix);
                            out.push('\n');
                            self.visit(rix, out);
                            let r = self.ensure_numbered(out, rix);
                            out.push('\n');
                            let text = format!(
                                "Because {}, {}.",
                                left.show_combine(right, Some(l), Some(r)),
                                inc.show()
                            );
                            self.line(out, text, ix);
                        }
                    }
                }
            }
            (false, false) => {
                let text = format!(
                    "Because {}, {}.",
                    left.show_combine(right, None, None),
                    inc.show()
                );
                self.line(out, text, ix);
            }
            _ => {
                let (dix, eix) = if left.is_derived() { (lix, rix) } else { (rix, lix) };
                let derived = &incompats[dix];
                let external = &incompats[eix];

                if let Some(n) = self.linum.get(&dix).cloned() {
                    let text = format!(
                        "Because {}, {}.",
                        external.show_combine(derived, None, Some(n)),
                        inc.show()
                    );
                    self.line(out, text, ix);
                } else if let Some((prior_dix, prior_eix)) = self.collapse_target(dix) {
                    self.visit(prior_dix, out);
                    let text = format!(
                        "And because {}, {}.",
                        incompats[prior_eix].show_combine(external, None, None),
                        inc.show()
                    );
                    self.line(out, text, ix);
                } else {
                    self.visit(dix, out);
                    let text = format!("And because {}, {}.", external.show(), inc.show());
                    self.line(out, text, ix);
                }
            }
        }
    }

    fn line(&mut self, out: &mut String, text: String, ix: usize) {
        out.push_str(&text);
        if self.shared(ix) {
            self.number(out, ix);
        }
        out.push('\n');
    }

    fn number(&mut self, out: &mut String, ix: usize) -> u16 {
        let n = self.cur_linum;
        self.cur_linum += 1;
        self.linum.insert(ix, n);
        out.push_str(" (");
        out.push_str(&n.to_string());
        out.push(')');
        n
    }

    /// Numbers the just-emitted conclusion of `ix` if it has no number yet.
    fn ensure_numbered(&mut self, out: &mut String, ix: usize) -> u16 {
        if let Some(n) = self.linum.get(&ix) {
            return *n;
        }
        out.pop();
        let n = self.number(out, ix);
        out.push('\n');
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resolve::incompat::IncompatibilityCause,
        term::Term,
        version::Requirement,
    };
    use semver::Version;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn two_external_parents_make_one_line() {
        let unavailable = Incompatibility::new(
            vec![Term::positive("b", Requirement::range(v("3.0.0"), v("4.0.0")))],
            IncompatibilityCause::Unavailable,
        );
        let dep = Incompatibility::new(
            vec![
                Term::positive("app", Requirement::exact(v("1.0.0"))),
                Term::negative("b", Requirement::range(v("3.0.0"), v("4.0.0"))),
            ],
            IncompatibilityCause::Dependency("app"),
        );
        let terminal = Incompatibility::new(
            vec![Term::positive("app", Requirement::exact(v("1.0.0")))],
            IncompatibilityCause::Derived(0, 1),
        );

        let out = report(&[unavailable, dep, terminal], 2);
        assert_eq!(
            out,
            "version solving has failed\n\n\
             Because b >= 3.0.0 < 4.0.0 is unavailable and \
             app 1.0.0 depends on b >= 3.0.0 < 4.0.0, \
             app 1.0.0 is impossible.\n"
        );
    }

    #[test]
    fn external_terminal_is_shown_directly() {
        let unavailable = Incompatibility::new(
            vec![Term::positive("b", Requirement::any())],
            IncompatibilityCause::Unavailable,
        );
        let out = report(&[unavailable], 0);
        assert_eq!(out, "version solving has failed\n\nb any is unavailable.\n");
    }
}

//! Assignments for the dependency resolver.

use crate::{package::PackageName, term::Term};

/// One entry in the partial solution's log: a term recorded as true, either
/// by decision or because an incompatibility forced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment<P> {
    step: u16,
    level: u16,
    term: Term<P>,
    ty: AssignmentType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssignmentType {
    Decision,
    /// Derived from the incompatibility at the given store index.
    Derivation { cause: usize },
}

impl<P: PackageName> Assignment<P> {
    pub fn new(step: u16, level: u16, term: Term<P>, ty: AssignmentType) -> Self {
        Assignment {
            step,
            level,
            term,
            ty,
        }
    }

    pub fn step(&self) -> u16 {
        self.step
    }

    pub fn level(&self) -> u16 {
        self.level
    }

    pub fn term(&self) -> &Term<P> {
        &self.term
    }

    pub fn pkg(&self) -> &P {
        self.term.package()
    }

    pub fn ty(&self) -> &AssignmentType {
        &self.ty
    }

    pub fn cause(&self) -> Option<usize> {
        match &self.ty {
            AssignmentType::Decision => None,
            AssignmentType::Derivation { cause } => Some(*cause),
        }
    }

    pub fn is_decision(&self) -> bool {
        self.ty == AssignmentType::Decision
    }
}

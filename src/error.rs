//! Error and outcome types.
//!
//! A boolean SAT solver typically has one failure mode (UNSAT) and reports
//! it with a plain `bool`/`Option` return. This crate's surface has more
//! failure modes, so pre-solve failures get a proper `thiserror` enum.
//! `Contradiction` stays a plain value (never a panic) since the conflict
//! analyzer must run on the post-contradiction trail.

use crate::ids::VarId;
use thiserror::Error;

/// Pre-solve failures: a malformed model description. These are always
/// the caller's fault and are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("variable {0:?} referenced before it was created")]
    UnknownVariable(VarId),

    #[error("variable {0:?} was given an empty initial domain")]
    EmptyDomain(VarId),

    #[error("clause constraint references variable {0:?} more than once")]
    DuplicateClauseVariable(VarId),

    #[error("constraint parameter out of bounds: {0}")]
    ParameterOutOfBounds(String),
}

/// A narrowing emptied a variable's domain. Always recoverable by
/// backtracking unless it occurs at decision level 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contradiction {
    pub var: VarId,
}

impl Contradiction {
    pub fn new(var: VarId) -> Self {
        Contradiction { var }
    }
}

/// The result of a `solve()` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved,
    Unsatisfiable,
    Interrupted,
}

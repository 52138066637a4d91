//! The `Constraint` capability set: a fixed method set over dynamic
//! inheritance — one flat interface, implemented by several concrete
//! propagator kinds, rather than a class hierarchy.

use crate::database::VariableDatabase;
use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, VarId};
use crate::literal::Literal;
use crate::queue::PropagationQueue;
use crate::store::VarStore;
use crate::trail::DecisionLevel;
use crate::watch::WatchDispatcher;

/// Context passed to [`Constraint::explain`]: which variable's narrowing is
/// being explained, and as of which trail timestamp.
#[derive(Clone, Copy, Debug)]
pub struct ExplainContext {
    pub var: VarId,
    pub timestamp: u32,
}

/// The fixed method set every propagator implements.
///
/// Generic over `D: VarStore` so the same constraint type can run either
/// against the solver's real [`VariableDatabase`] or against a
/// [`crate::committable::CommittableDatabase`] overlay, the way `Disjunction`
/// needs to. `explain` and `check_conflicting` stay pinned to
/// the concrete database: they are only ever called against the solver's
/// single real trail (after a real contradiction, or from a test), never
/// through a buffered overlay.
pub trait Constraint<D: VarStore = VariableDatabase> {
    /// Installs watches and performs any one-time simplification (e.g. unit
    /// propagation for a two-literal clause). Called once, before solving
    /// starts.
    fn initialize(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction>;

    /// Called after a backtrack crosses this constraint's saved state, so
    /// per-level caches (matching state, SCC splits) can be rebuilt from the
    /// now-current domains. Most constraints need nothing here.
    fn reset(&mut self, _db: &mut D) {}

    /// A watch belonging to this constraint fired: `var` was narrowed from
    /// `previous` to its current value set. May narrow other variables,
    /// request replacement watches, or enqueue itself for full
    /// `propagate`.
    fn on_variable_narrowed(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
        queue: &mut PropagationQueue,
        var: VarId,
        previous: &ValueSet,
    ) -> Result<(), Contradiction>;

    /// Full propagation pass, run when this constraint is popped off the
    /// queue. Constraints that do all their work inline in
    /// `on_variable_narrowed` (plain clauses) leave this at the default.
    fn propagate(
        &mut self,
        _self_id: ConstraintId,
        _db: &mut D,
        _watches: &mut WatchDispatcher,
        _queue: &mut PropagationQueue,
    ) -> Result<(), Contradiction> {
        Ok(())
    }

    /// The reason this constraint narrowed `ctx.var` as of `ctx.timestamp`:
    /// a list of literals, all falsified by the database at that time,
    /// whose conjunction implied the narrowing.
    fn explain(&self, db: &VariableDatabase, ctx: ExplainContext) -> Vec<Literal>;

    /// True if this constraint is currently violated by the database's
    /// current domains (used by tests and by conflict-detection callers).
    fn check_conflicting(&self, db: &VariableDatabase) -> bool;

    /// True if this constraint keeps per-level state that must be restored
    /// on backtrack via `reset` rather than being purely a function of the
    /// current domains.
    fn is_backtracking(&self) -> bool {
        false
    }

    /// Called once per backtrack with the level being rewound to, for
    /// constraints that answer `true` to `is_backtracking`.
    fn on_backtrack(&mut self, _db: &mut D, _level: DecisionLevel) {}

    /// Lets the solver's learned-clause reduction pass reach the concrete
    /// clause behind this constraint's trait object without a general
    /// downcast facility: activity/LBD bookkeeping is clause-specific, so
    /// every other constraint kind leaves this `None`.
    fn as_clause_mut(&mut self) -> Option<&mut crate::clause::ClauseConstraint> {
        None
    }
}

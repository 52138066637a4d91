//! `Disjunction`: `C1 OR C2` between two arbitrary built-in constraints.
//!
//! Both sides propagate speculatively against a buffered overlay until one
//! side proves unsatisfiable, then the sibling's buffered narrowing is
//! committed for real and propagated directly from then on: a two-phase
//! shape (speculate, then commit-on-sibling-unsat). This deliberately skips
//! "fully satisfied level" bookkeeping: every inner constraint kind here is
//! cheap to re-propagate from scratch, so there's no need to remember "this
//! side was already proven satisfied as of level L" to skip redundant
//! work.

use std::collections::HashMap;

use crate::all_different::AllDifferentConstraint;
use crate::cardinality::CardinalityConstraint;
use crate::clause::ClauseConstraint;
use crate::committable::CommittableDatabase;
use crate::constraint::{Constraint, ExplainContext};
use crate::database::VariableDatabase;
use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, VarId};
use crate::inequality::InequalityConstraint;
use crate::literal::Literal;
use crate::queue::PropagationQueue;
use crate::store::VarStore;
use crate::trail::DecisionLevel;
use crate::watch::WatchDispatcher;

/// The built-in constraint kinds a `Disjunction` side may hold.
///
/// A `Box<dyn Constraint<CommittableDatabase<'p>>>` would need a
/// higher-ranked trait bound (`for<'p> Constraint<CommittableDatabase<'p>>`)
/// to work across calls with differently-lived overlays, which is easy to
/// get subtly wrong without a compiler to check it. Every constrained kind
/// here already implements `Constraint<D>` generically over any `D: VarStore`
/// (see their `impl<D: VarStore> Constraint<D> for ...` blocks), so a plain
/// enum dispatching by hand is both simpler and verifiably sound. This means
/// a `Disjunction` side cannot itself be another `Disjunction`.
pub enum InnerConstraint {
    Clause(ClauseConstraint),
    AllDifferent(AllDifferentConstraint),
    Cardinality(CardinalityConstraint),
    Inequality(InequalityConstraint),
}

impl InnerConstraint {
    pub(crate) fn vars(&self) -> Vec<VarId> {
        match self {
            InnerConstraint::Clause(c) => c.vars(),
            InnerConstraint::AllDifferent(c) => c.vars().to_vec(),
            InnerConstraint::Cardinality(c) => c.vars().to_vec(),
            InnerConstraint::Inequality(c) => c.vars(),
        }
    }

    fn initialize<D: VarStore>(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction> {
        match self {
            InnerConstraint::Clause(c) => Constraint::<D>::initialize(c, self_id, db, watches),
            InnerConstraint::AllDifferent(c) => Constraint::<D>::initialize(c, self_id, db, watches),
            InnerConstraint::Cardinality(c) => Constraint::<D>::initialize(c, self_id, db, watches),
            InnerConstraint::Inequality(c) => Constraint::<D>::initialize(c, self_id, db, watches),
        }
    }

    fn on_variable_narrowed<D: VarStore>(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
        queue: &mut PropagationQueue,
        var: VarId,
        previous: &ValueSet,
    ) -> Result<(), Contradiction> {
        match self {
            InnerConstraint::Clause(c) => {
                Constraint::<D>::on_variable_narrowed(c, self_id, db, watches, queue, var, previous)
            }
            InnerConstraint::AllDifferent(c) => {
                Constraint::<D>::on_variable_narrowed(c, self_id, db, watches, queue, var, previous)
            }
            InnerConstraint::Cardinality(c) => {
                Constraint::<D>::on_variable_narrowed(c, self_id, db, watches, queue, var, previous)
            }
            InnerConstraint::Inequality(c) => {
                Constraint::<D>::on_variable_narrowed(c, self_id, db, watches, queue, var, previous)
            }
        }
    }

    fn explain(&self, db: &VariableDatabase, ctx: ExplainContext) -> Vec<Literal> {
        match self {
            InnerConstraint::Clause(c) => Constraint::<VariableDatabase>::explain(c, db, ctx),
            InnerConstraint::AllDifferent(c) => Constraint::<VariableDatabase>::explain(c, db, ctx),
            InnerConstraint::Cardinality(c) => Constraint::<VariableDatabase>::explain(c, db, ctx),
            InnerConstraint::Inequality(c) => Constraint::<VariableDatabase>::explain(c, db, ctx),
        }
    }

    fn on_backtrack(&mut self, db: &mut VariableDatabase, level: DecisionLevel) {
        match self {
            InnerConstraint::Clause(c) => Constraint::<VariableDatabase>::on_backtrack(c, db, level),
            InnerConstraint::AllDifferent(c) => Constraint::<VariableDatabase>::on_backtrack(c, db, level),
            InnerConstraint::Cardinality(c) => Constraint::<VariableDatabase>::on_backtrack(c, db, level),
            InnerConstraint::Inequality(c) => Constraint::<VariableDatabase>::on_backtrack(c, db, level),
        }
    }
}

struct Side {
    inner: InnerConstraint,
    vars: Vec<VarId>,
    /// The buffered overlay's accumulated narrowing, as of the last call
    /// that touched this side, folded back to a plain map between calls
    /// since a `CommittableDatabase` can't outlive one dispatch (its
    /// lifetime is tied to the `&mut VariableDatabase` borrow it was built
    /// from).
    shadow: HashMap<VarId, ValueSet>,
    /// Set once this side's speculative propagation hits a contradiction:
    /// the level it happened at, and the manually-built explanation (see
    /// `unsat_explanation`).
    unsat: Option<(DecisionLevel, Vec<Literal>)>,
}

impl Side {
    fn new(inner: InnerConstraint) -> Self {
        let vars = inner.vars();
        Side {
            inner,
            vars,
            shadow: HashMap::new(),
            unsat: None,
        }
    }

    fn involves(&self, var: VarId) -> bool {
        self.vars.contains(&var)
    }
}

/// `side_a OR side_b`: at least one side's inner constraint must hold.
///
/// Both sides propagate against a buffered [`CommittableDatabase`] overlay
/// until one proves unsatisfiable; at that point the other side's entire
/// buffered shadow is committed to the real database for real, and from then
/// on that side's inner constraint is driven directly against the real
/// database — the disjunction has resolved to its surviving side.
///
/// Only implements `Constraint<VariableDatabase>` rather than being generic
/// over `D: VarStore`: a `Disjunction` itself never needs to run inside
/// another `Disjunction`'s speculative overlay (see `InnerConstraint`'s
/// doc comment), so there's no caller that needs `Constraint<CommittableDatabase>`
/// for this type.
pub struct DisjunctionConstraint {
    sides: [Side; 2],
    committed_side: Option<usize>,
    committed_at_level: Option<DecisionLevel>,
}

impl DisjunctionConstraint {
    pub fn new(a: InnerConstraint, b: InnerConstraint) -> Self {
        DisjunctionConstraint {
            sides: [Side::new(a), Side::new(b)],
            committed_side: None,
            committed_at_level: None,
        }
    }

    /// Builds the unsat explanation for a side that failed while still
    /// speculative: every variable it had buffered a narrowing for, paired
    /// with the complement of that narrowing. This is sound (the clause
    /// "any of these being untrue would have avoided the contradiction" is
    /// always falsified by the domains that produced it) but not minimal,
    /// the same relaxation `inequality.rs`/`sum.rs` document for their own
    /// `explain` implementations — here it's necessary rather than a choice,
    /// since the failed narrowing never made it into the real trail for an
    /// ordinary `explain` call to read back.
    fn unsat_explanation(shadow: &HashMap<VarId, ValueSet>) -> Vec<Literal> {
        shadow
            .iter()
            .map(|(&var, values)| Literal::new(var, values.complement()))
            .collect()
    }

    fn commit_side(
        &mut self,
        self_id: ConstraintId,
        db: &mut VariableDatabase,
        winner: usize,
    ) -> Result<(), Contradiction> {
        let shadow = std::mem::take(&mut self.sides[winner].shadow);
        CommittableDatabase::with_seed(db, shadow).commit(Some(self_id))?;
        self.committed_side = Some(winner);
        self.committed_at_level = Some(db.decision_level());
        Ok(())
    }

    fn speculate(
        &mut self,
        self_id: ConstraintId,
        db: &mut VariableDatabase,
        watches: &mut WatchDispatcher,
        i: usize,
        run: impl FnOnce(&mut InnerConstraint, &mut CommittableDatabase<'_>, &mut WatchDispatcher) -> Result<(), Contradiction>,
    ) -> Result<(), Contradiction> {
        let shadow = self.sides[i].shadow.clone();
        let mut cdb = CommittableDatabase::with_seed(db, shadow);
        // `run` only drives `initialize`/`on_variable_narrowed`, neither of
        // which enqueues work for these constraint kinds (see
        // `all_different.rs`/`cardinality.rs`: both do all their work
        // inline), so it never needs a `PropagationQueue` of its own here.
        let result = run(&mut self.sides[i].inner, &mut cdb, watches);
        match result {
            Ok(()) => {
                self.sides[i].shadow = cdb.into_shadow();
                Ok(())
            }
            Err(_) => {
                let shadow = cdb.into_shadow();
                let explanation = Self::unsat_explanation(&shadow);
                let level = db.decision_level();
                self.sides[i].unsat = Some((level, explanation));
                let other = 1 - i;
                if self.sides[other].unsat.is_some() {
                    return Err(Contradiction::new(VarId::INVALID));
                }
                self.commit_side(self_id, db, other)
            }
        }
    }
}

impl Constraint<VariableDatabase> for DisjunctionConstraint {
    fn initialize(
        &mut self,
        self_id: ConstraintId,
        db: &mut VariableDatabase,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction> {
        // Unlike `on_variable_narrowed`, a side here may still need its
        // *first* `initialize` call when its sibling already failed: the
        // generic `speculate`/`commit_side` pair assumes the committed side
        // was already speculatively initialized (has a shadow worth
        // folding in), which isn't true for whichever side hasn't run yet.
        // So side 0 and side 1 are each driven through by hand here.
        let shadow0 = self.sides[0].shadow.clone();
        let mut cdb0 = CommittableDatabase::with_seed(db, shadow0);
        match self.sides[0].inner.initialize(self_id, &mut cdb0, watches) {
            Ok(()) => self.sides[0].shadow = cdb0.into_shadow(),
            Err(_) => {
                let shadow = cdb0.into_shadow();
                self.sides[0].unsat = Some((db.decision_level(), Self::unsat_explanation(&shadow)));
                self.sides[1].inner.initialize(self_id, db, watches)?;
                self.committed_side = Some(1);
                self.committed_at_level = Some(db.decision_level());
                return Ok(());
            }
        }

        let shadow1 = self.sides[1].shadow.clone();
        let mut cdb1 = CommittableDatabase::with_seed(db, shadow1);
        match self.sides[1].inner.initialize(self_id, &mut cdb1, watches) {
            Ok(()) => {
                self.sides[1].shadow = cdb1.into_shadow();
                Ok(())
            }
            Err(_) => {
                let shadow = cdb1.into_shadow();
                self.sides[1].unsat = Some((db.decision_level(), Self::unsat_explanation(&shadow)));
                self.commit_side(self_id, db, 0)
            }
        }
    }

    fn on_variable_narrowed(
        &mut self,
        self_id: ConstraintId,
        db: &mut VariableDatabase,
        watches: &mut WatchDispatcher,
        _queue: &mut PropagationQueue,
        var: VarId,
        previous: &ValueSet,
    ) -> Result<(), Contradiction> {
        if let Some(winner) = self.committed_side {
            let mut dummy_queue = PropagationQueue::new();
            return self.sides[winner]
                .inner
                .on_variable_narrowed(self_id, db, watches, &mut dummy_queue, var, previous);
        }

        for i in 0..2 {
            if self.committed_side.is_some() {
                break;
            }
            if !self.sides[i].involves(var) || self.sides[i].unsat.is_some() {
                continue;
            }
            // Replay the real narrowing onto the overlay before handing off
            // to the inner constraint. A side's buffered shadow can hold a
            // speculative value for `var` from an earlier round that the
            // real database has since moved past (e.g. a decision landed on
            // the value this side had speculatively excluded); without this,
            // `inner.on_variable_narrowed` would read a stale overlay domain
            // through `cdb.get_potential` and never notice the conflict,
            // since it only narrows *other* variables in reaction to `var`.
            let new_domain = VarStore::get_potential(db, var);
            self.speculate(self_id, db, watches, i, |inner, cdb, w| {
                cdb.narrow(var, &new_domain, None)?;
                let mut q = PropagationQueue::new();
                inner.on_variable_narrowed(self_id, cdb, w, &mut q, var, previous)
            })?;
        }
        Ok(())
    }

    fn explain(&self, db: &VariableDatabase, ctx: ExplainContext) -> Vec<Literal> {
        if let Some(winner) = self.committed_side {
            return self.sides[winner].inner.explain(db, ctx);
        }
        // No side has committed: `ctx.var` must have been narrowed by the
        // side that just went unsat (the other side's narrowing never
        // reached the real trail).
        for side in &self.sides {
            if let Some((_, explanation)) = &side.unsat {
                return explanation.clone();
            }
        }
        Vec::new()
    }

    fn check_conflicting(&self, db: &VariableDatabase) -> bool {
        match self.committed_side {
            // A committed disjunction is conflicting exactly when its
            // surviving side is conflicting; the other side already proved
            // unsatisfiable and no longer matters.
            Some(winner) => conflicting(&self.sides[winner].inner, db),
            None => self.sides[0].unsat.is_some() && self.sides[1].unsat.is_some(),
        }
    }

    fn is_backtracking(&self) -> bool {
        true
    }

    fn on_backtrack(&mut self, db: &mut VariableDatabase, level: DecisionLevel) {
        for side in self.sides.iter_mut() {
            side.inner.on_backtrack(db, level);
            if let Some((since, _)) = side.unsat {
                if since > level {
                    side.unsat = None;
                }
            }
        }
        if let Some(since) = self.committed_at_level {
            if since > level {
                self.committed_side = None;
                self.committed_at_level = None;
            }
        }
    }
}

fn conflicting(inner: &InnerConstraint, db: &VariableDatabase) -> bool {
    match inner {
        InnerConstraint::Clause(c) => Constraint::<VariableDatabase>::check_conflicting(c, db),
        InnerConstraint::AllDifferent(c) => Constraint::<VariableDatabase>::check_conflicting(c, db),
        InnerConstraint::Cardinality(c) => Constraint::<VariableDatabase>::check_conflicting(c, db),
        InnerConstraint::Inequality(c) => Constraint::<VariableDatabase>::check_conflicting(c, db),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Idx;
    use crate::inequality::CompareOp;

    fn cid(n: usize) -> ConstraintId {
        ConstraintId::unidx(n)
    }

    #[test]
    fn committing_sibling_on_unsat_side() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        let c = db.new_variable("c", vec![0, 1]);

        // (a = 1) OR (b < c), with a already pinned to 0 so the clause side
        // is unsatisfiable from the start and b < c must be committed.
        db.narrow(a, &ValueSet::singleton(2, 0), None).unwrap();

        let mut watches = WatchDispatcher::new();
        let mut disj = DisjunctionConstraint::new(
            InnerConstraint::Clause(ClauseConstraint::new(vec![Literal::eq_value(a, 2, 1)])),
            InnerConstraint::Inequality(InequalityConstraint::new(b, c, CompareOp::Lt)),
        );
        Constraint::<VariableDatabase>::initialize(&mut disj, cid(1), &mut db, &mut watches).unwrap();

        assert_eq!(disj.committed_side, Some(1));
        // b < c forces b <= 0 (since c's max is 1) and c >= 1.
        assert!(!db.is_possible(b, 1));
        assert!(!db.is_possible(c, 0));
    }

    #[test]
    fn both_sides_unsat_is_a_contradiction() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        db.narrow(a, &ValueSet::singleton(2, 0), None).unwrap();
        db.narrow(b, &ValueSet::singleton(2, 0), None).unwrap();

        let mut watches = WatchDispatcher::new();
        let mut disj = DisjunctionConstraint::new(
            InnerConstraint::Clause(ClauseConstraint::new(vec![Literal::eq_value(a, 2, 1)])),
            InnerConstraint::Clause(ClauseConstraint::new(vec![Literal::eq_value(b, 2, 1)])),
        );
        let result = Constraint::<VariableDatabase>::initialize(&mut disj, cid(1), &mut db, &mut watches);
        assert!(result.is_err());
    }
}

//! `Inequality`: a binary ordering constraint between two variables.
//!
//! Rather than Hall intervals, a direct `exclude_less_than`/
//! `exclude_greater_than` tightening per comparison operator, the same
//! primitives `all_different.rs`'s `propagate_bounds` uses. `explain` is
//! non-minimal but sound: the reason for narrowing one side is simply "the
//! other side's domain, as of the narrowing, excludes its own complement" —
//! always falsified by construction, and tied to the right decision level
//! since it's read from `value_before` at the narrowing's own timestamp.

use crate::constraint::{Constraint, ExplainContext};
use crate::database::VariableDatabase;
use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, VarId};
use crate::literal::Literal;
use crate::queue::PropagationQueue;
use crate::store::VarStore;
use crate::watch::{TriggerSpec, WatchDispatcher};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CompareOp {
    Lt,
    Leq,
    Gt,
    Geq,
    Eq,
    Neq,
}

pub struct InequalityConstraint {
    a: VarId,
    b: VarId,
    op: CompareOp,
}

impl InequalityConstraint {
    pub fn new(a: VarId, b: VarId, op: CompareOp) -> Self {
        InequalityConstraint { a, b, op }
    }

    pub fn vars(&self) -> Vec<VarId> {
        vec![self.a, self.b]
    }

    fn propagate_bounds<D: VarStore>(&self, self_id: ConstraintId, db: &mut D) -> Result<(), Contradiction> {
        match self.op {
            CompareOp::Lt => {
                if let Some(bmax) = db.get_max(self.b) {
                    db.exclude_greater_than(self.a, bmax - 1, Some(self_id))?;
                }
                if let Some(amin) = db.get_min(self.a) {
                    db.exclude_less_than(self.b, amin + 1, Some(self_id))?;
                }
            }
            CompareOp::Leq => {
                if let Some(bmax) = db.get_max(self.b) {
                    db.exclude_greater_than(self.a, bmax, Some(self_id))?;
                }
                if let Some(amin) = db.get_min(self.a) {
                    db.exclude_less_than(self.b, amin, Some(self_id))?;
                }
            }
            CompareOp::Gt => {
                if let Some(bmin) = db.get_min(self.b) {
                    db.exclude_less_than(self.a, bmin + 1, Some(self_id))?;
                }
                if let Some(amax) = db.get_max(self.a) {
                    db.exclude_greater_than(self.b, amax - 1, Some(self_id))?;
                }
            }
            CompareOp::Geq => {
                if let Some(bmin) = db.get_min(self.b) {
                    db.exclude_less_than(self.a, bmin, Some(self_id))?;
                }
                if let Some(amax) = db.get_max(self.a) {
                    db.exclude_greater_than(self.b, amax, Some(self_id))?;
                }
            }
            CompareOp::Eq => {
                if let (Some(amin), Some(bmin)) = (db.get_min(self.a), db.get_min(self.b)) {
                    let lo = amin.max(bmin);
                    db.exclude_less_than(self.a, lo, Some(self_id))?;
                    db.exclude_less_than(self.b, lo, Some(self_id))?;
                }
                if let (Some(amax), Some(bmax)) = (db.get_max(self.a), db.get_max(self.b)) {
                    let hi = amax.min(bmax);
                    db.exclude_greater_than(self.a, hi, Some(self_id))?;
                    db.exclude_greater_than(self.b, hi, Some(self_id))?;
                }
            }
            CompareOp::Neq => {
                if let Some(v) = db.solved_value(self.a) {
                    db.exclude_value(self.b, v, Some(self_id))?;
                }
                if let Some(v) = db.solved_value(self.b) {
                    db.exclude_value(self.a, v, Some(self_id))?;
                }
            }
        }
        Ok(())
    }

    fn register_watches(&self, self_id: ConstraintId, watches: &mut WatchDispatcher) {
        match self.op {
            CompareOp::Neq => {
                watches.register(self.a, self_id, TriggerSpec::BecameSingleton);
                watches.register(self.b, self_id, TriggerSpec::BecameSingleton);
            }
            _ => {
                for &v in &[self.a, self.b] {
                    watches.register(v, self_id, TriggerSpec::LowerBoundRaised);
                    watches.register(v, self_id, TriggerSpec::UpperBoundLowered);
                }
            }
        }
    }
}

impl<D: VarStore> Constraint<D> for InequalityConstraint {
    fn initialize(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction> {
        self.register_watches(self_id, watches);
        self.propagate_bounds(self_id, db)
    }

    fn on_variable_narrowed(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        _watches: &mut WatchDispatcher,
        _queue: &mut PropagationQueue,
        _var: VarId,
        _previous: &ValueSet,
    ) -> Result<(), Contradiction> {
        self.propagate_bounds(self_id, db)
    }

    fn explain(&self, db: &VariableDatabase, ctx: ExplainContext) -> Vec<Literal> {
        let other = if ctx.var == self.a { self.b } else { self.a };
        let (history, _) = db.value_before(other, ctx.timestamp);
        vec![Literal::new(other, history.complement())]
    }

    fn check_conflicting(&self, db: &VariableDatabase) -> bool {
        let (amin, amax) = (db.get_min(self.a), db.get_max(self.a));
        let (bmin, bmax) = (db.get_min(self.b), db.get_max(self.b));
        match (amin, amax, bmin, bmax) {
            (Some(amin), Some(amax), Some(bmin), Some(bmax)) => match self.op {
                CompareOp::Lt => amin >= bmax,
                CompareOp::Leq => amin > bmax,
                CompareOp::Gt => amax <= bmin,
                CompareOp::Geq => amax < bmin,
                CompareOp::Eq => amin > bmax || bmin > amax,
                CompareOp::Neq => {
                    db.solved_value(self.a).is_some() && db.solved_value(self.a) == db.solved_value(self.b)
                }
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Idx;

    fn cid(n: usize) -> ConstraintId {
        ConstraintId::unidx(n)
    }

    #[test]
    fn lt_tightens_both_bounds() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1, 2, 3]);
        let b = db.new_variable("b", vec![0, 1, 2, 3]);
        db.narrow(a, &ValueSet::range(4, 2, 3), None).unwrap();

        let mut watches = WatchDispatcher::new();
        let mut cons = InequalityConstraint::new(a, b, CompareOp::Lt);
        Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches).unwrap();
        // a in {2,3} and a < b forces b >= 3.
        assert!(!db.is_possible(b, 0));
        assert!(!db.is_possible(b, 1));
        assert!(!db.is_possible(b, 2));
        assert!(db.is_possible(b, 3));
    }

    #[test]
    fn neq_excludes_solved_sibling_value() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        db.narrow(a, &ValueSet::singleton(2, 0), None).unwrap();

        let mut watches = WatchDispatcher::new();
        let mut cons = InequalityConstraint::new(a, b, CompareOp::Neq);
        Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches).unwrap();
        assert!(!db.is_possible(b, 0));
        assert!(db.is_possible(b, 1));
    }
}

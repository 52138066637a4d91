//! `Sum`: `Σ cᵢ·xᵢ <op> k`.
//!
//! Bounds-consistency only, the same interval-bounds style as
//! `all_different.rs`'s `propagate_bounds` (tighten each variable from the
//! combined min/max of the others) but without Hall-set reasoning: a weighted
//! sum has no notion of "two variables competing for the same value", so the
//! per-variable tightening is a closed-form division rather than a matching
//! pass.

use crate::constraint::{Constraint, ExplainContext};
use crate::database::VariableDatabase;
use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, VarId};
use crate::inequality::CompareOp;
use crate::literal::Literal;
use crate::queue::PropagationQueue;
use crate::store::VarStore;
use crate::watch::{TriggerSpec, WatchDispatcher};

fn div_floor(a: i64, b: i64) -> i64 {
    let d = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        d - 1
    } else {
        d
    }
}

fn div_ceil(a: i64, b: i64) -> i64 {
    let d = a / b;
    let r = a % b;
    if r != 0 && (r < 0) == (b < 0) {
        d + 1
    } else {
        d
    }
}

pub struct SumConstraint {
    vars: Vec<VarId>,
    coeffs: Vec<i64>,
    op: CompareOp,
    k: i64,
}

impl SumConstraint {
    /// `op` is restricted to `Leq`/`Geq`/`Eq`: the other `CompareOp`
    /// variants (`Lt`, `Gt`, `Neq`) don't have a useful closed-form bounds
    /// tightening for a weighted sum; this only needs "sum of mins/maxes"
    /// consistency.
    pub fn new(vars: Vec<VarId>, coeffs: Vec<i64>, op: CompareOp, k: i64) -> Self {
        debug_assert_eq!(vars.len(), coeffs.len());
        SumConstraint { vars, coeffs, op, k }
    }

    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    fn bounds<D: VarStore>(&self, db: &D) -> (i64, i64) {
        let mut sum_min = 0i64;
        let mut sum_max = 0i64;
        for (i, &v) in self.vars.iter().enumerate() {
            let c = self.coeffs[i];
            let dmin = db.get_min(v).expect("non-empty domain") as i64;
            let dmax = db.get_max(v).expect("non-empty domain") as i64;
            if c >= 0 {
                sum_min += c * dmin;
                sum_max += c * dmax;
            } else {
                sum_min += c * dmax;
                sum_max += c * dmin;
            }
        }
        (sum_min, sum_max)
    }

    fn tighten_for_leq<D: VarStore>(
        &self,
        self_id: ConstraintId,
        db: &mut D,
        sum_min: i64,
    ) -> Result<(), Contradiction> {
        if sum_min > self.k {
            return Err(Contradiction::new(self.vars.first().copied().unwrap_or(VarId::INVALID)));
        }
        for (i, &v) in self.vars.iter().enumerate() {
            let c = self.coeffs[i];
            if c == 0 {
                continue;
            }
            let dmin = db.get_min(v).expect("non-empty domain") as i64;
            let dmax = db.get_max(v).expect("non-empty domain") as i64;
            let contrib_min = if c >= 0 { c * dmin } else { c * dmax };
            let slack = self.k - (sum_min - contrib_min);
            if c > 0 {
                db.exclude_greater_than(v, div_floor(slack, c) as i32, Some(self_id))?;
            } else {
                db.exclude_less_than(v, div_ceil(slack, c) as i32, Some(self_id))?;
            }
        }
        Ok(())
    }

    fn tighten_for_geq<D: VarStore>(
        &self,
        self_id: ConstraintId,
        db: &mut D,
        sum_max: i64,
    ) -> Result<(), Contradiction> {
        if sum_max < self.k {
            return Err(Contradiction::new(self.vars.first().copied().unwrap_or(VarId::INVALID)));
        }
        for (i, &v) in self.vars.iter().enumerate() {
            let c = self.coeffs[i];
            if c == 0 {
                continue;
            }
            let dmin = db.get_min(v).expect("non-empty domain") as i64;
            let dmax = db.get_max(v).expect("non-empty domain") as i64;
            let contrib_max = if c >= 0 { c * dmax } else { c * dmin };
            let slack = self.k - (sum_max - contrib_max);
            if c > 0 {
                db.exclude_less_than(v, div_ceil(slack, c) as i32, Some(self_id))?;
            } else {
                db.exclude_greater_than(v, div_floor(slack, c) as i32, Some(self_id))?;
            }
        }
        Ok(())
    }

    fn propagate_bounds<D: VarStore>(&self, self_id: ConstraintId, db: &mut D) -> Result<(), Contradiction> {
        let (sum_min, sum_max) = self.bounds(db);
        match self.op {
            CompareOp::Leq => self.tighten_for_leq(self_id, db, sum_min),
            CompareOp::Geq => self.tighten_for_geq(self_id, db, sum_max),
            CompareOp::Eq => {
                self.tighten_for_leq(self_id, db, sum_min)?;
                let (sum_min2, _) = self.bounds(db);
                self.tighten_for_geq(self_id, db, self.bounds(db).1)?;
                let _ = sum_min2;
                Ok(())
            }
            CompareOp::Lt | CompareOp::Gt | CompareOp::Neq => {
                debug_assert!(false, "Sum only supports Leq/Geq/Eq");
                Ok(())
            }
        }
    }
}

impl<D: VarStore> Constraint<D> for SumConstraint {
    fn initialize(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction> {
        for &v in &self.vars {
            watches.register(v, self_id, TriggerSpec::LowerBoundRaised);
            watches.register(v, self_id, TriggerSpec::UpperBoundLowered);
        }
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
        // Every sibling variable's domain, as of the narrowing, contributed
        // to the tightened bound: the reason is "every other variable's
        // current value set excludes its own complement", mirroring
        // `inequality.rs`'s non-minimal-but-sound explanation shape.
        self.vars
            .iter()
            .filter(|&&v| v != ctx.var)
            .map(|&v| {
                let (history, _) = db.value_before(v, ctx.timestamp);
                Literal::new(v, history.complement())
            })
            .collect()
    }

    fn check_conflicting(&self, db: &VariableDatabase) -> bool {
        let (sum_min, sum_max) = self.bounds(db);
        match self.op {
            CompareOp::Leq => sum_min > self.k,
            CompareOp::Geq => sum_max < self.k,
            CompareOp::Eq => sum_min > self.k || sum_max < self.k,
            CompareOp::Lt | CompareOp::Gt | CompareOp::Neq => false,
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
    fn leq_tightens_every_term() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1, 2, 3]);
        let b = db.new_variable("b", vec![0, 1, 2, 3]);

        let mut watches = WatchDispatcher::new();
        // a + b <= 3
        let mut cons = SumConstraint::new(vec![a, b], vec![1, 1], CompareOp::Leq, 3);
        Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches).unwrap();
        assert!(db.is_possible(a, 3));
        assert!(db.is_possible(b, 3));

        db.narrow(a, &ValueSet::singleton(4, 3), None).unwrap();
        Constraint::<VariableDatabase>::on_variable_narrowed(
            &mut cons,
            cid(1),
            &mut db,
            &mut watches,
            &mut PropagationQueue::new(),
            a,
            &ValueSet::full(4),
        )
        .unwrap();
        // a = 3 forces b <= 0.
        assert!(db.is_possible(b, 0));
        assert!(!db.is_possible(b, 1));
    }

    #[test]
    fn infeasible_sum_is_a_contradiction() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![2, 3]);
        let b = db.new_variable("b", vec![2, 3]);

        let mut watches = WatchDispatcher::new();
        // a + b <= 3 is infeasible since both minimums already sum to 4.
        let mut cons = SumConstraint::new(vec![a, b], vec![1, 1], CompareOp::Leq, 3);
        let result = Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches);
        assert!(result.is_err());
    }
}

//! `Table`: an extensional constraint over a fixed list of allowed tuples.
//!
//! Implements naive GAC-by-enumeration: a value is supported iff some row is
//! still fully compatible with every variable's current domain, recomputed
//! from scratch on every propagation (acceptable at the row counts this is
//! meant for — hundreds, not millions).

use crate::constraint::{Constraint, ExplainContext};
use crate::database::VariableDatabase;
use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, VarId};
use crate::literal::Literal;
use crate::queue::PropagationQueue;
use crate::store::VarStore;
use crate::watch::{TriggerSpec, WatchDispatcher};

pub struct TableConstraint {
    vars: Vec<VarId>,
    rows: Vec<Vec<i32>>,
}

impl TableConstraint {
    /// `rows` must each have exactly `vars.len()` entries (checked by the
    /// caller).
    pub fn new(vars: Vec<VarId>, rows: Vec<Vec<i32>>) -> Self {
        TableConstraint { vars, rows }
    }

    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    /// A row is live iff every one of its entries is still possible for the
    /// corresponding variable.
    fn row_is_live<D: VarStore>(&self, db: &D, row: &[i32]) -> bool {
        self.vars.iter().zip(row.iter()).all(|(&v, &val)| db.is_possible(v, val))
    }

    fn propagate<D: VarStore>(&self, self_id: ConstraintId, db: &mut D) -> Result<(), Contradiction> {
        let mut supported: Vec<ValueSet> = self
            .vars
            .iter()
            .map(|&v| ValueSet::empty(db.domain_size(v)))
            .collect();

        for row in &self.rows {
            if !self.row_is_live(db, row) {
                continue;
            }
            for (i, &v) in self.vars.iter().enumerate() {
                if let Some(idx) = db.index_of(v, row[i]) {
                    supported[i].insert(idx);
                }
            }
        }

        for (i, &v) in self.vars.iter().enumerate() {
            db.narrow(v, &supported[i], Some(self_id))?;
        }
        Ok(())
    }
}

impl<D: VarStore> Constraint<D> for TableConstraint {
    fn initialize(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction> {
        for &v in &self.vars {
            watches.register(v, self_id, TriggerSpec::AnyChange);
        }
        self.propagate(self_id, db)
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
        self.propagate(self_id, db)
    }

    fn explain(&self, db: &VariableDatabase, ctx: ExplainContext) -> Vec<Literal> {
        // Non-minimal but sound, the same relaxed shape `inequality.rs`/
        // `sum.rs` document: every other variable's domain as of the
        // narrowing ruled out the rows that would have kept `ctx.var`'s
        // excluded values supported.
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
        !self.rows.iter().any(|row| self.row_is_live(db, row))
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
    fn pinning_one_column_prunes_the_other() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        db.narrow(a, &ValueSet::singleton(2, 0), None).unwrap();

        let mut watches = WatchDispatcher::new();
        // (a,b) in {(0,1), (1,0)}
        let mut cons = TableConstraint::new(vec![a, b], vec![vec![0, 1], vec![1, 0]]);
        Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches).unwrap();
        assert_eq!(db.solved_value(b), Some(1));
    }

    #[test]
    fn no_live_row_is_conflicting() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        db.narrow(a, &ValueSet::singleton(2, 0), None).unwrap();
        db.narrow(b, &ValueSet::singleton(2, 0), None).unwrap();

        let mut watches = WatchDispatcher::new();
        let mut cons = TableConstraint::new(vec![a, b], vec![vec![0, 1], vec![1, 0]]);
        let result = Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches);
        assert!(result.is_err());
    }
}

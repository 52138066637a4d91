//! `Iff`: `head <-> (body0 OR body1 OR ...)`.
//!
//! A head literal, a disjunction of body literals, and a three-valued
//! `body_satisfaction` (`Unknown`/`Sat`/`Unsat`) driving two propagation
//! directions (`propagate_body_true`/`propagate_body_false`). Both
//! directions are direct consistency checks run from scratch on every
//! `on_variable_narrowed` rather than incremental per-level state, the same
//! "thin propagator" style `inequality.rs`/`sum.rs` use.

use crate::constraint::{Constraint, ExplainContext};
use crate::database::VariableDatabase;
use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, VarId};
use crate::literal::Literal;
use crate::queue::PropagationQueue;
use crate::store::VarStore;
use crate::watch::{TriggerSpec, WatchDispatcher};

/// Whether a literal is definitely true, definitely false, or still
/// undetermined given the database's current domains.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Satisfaction {
    Unknown,
    Sat,
    Unsat,
}

fn literal_satisfaction<D: VarStore>(db: &D, lit: &Literal) -> Satisfaction {
    let current = db.get_potential(lit.var);
    if current.is_subset_of(&lit.values) {
        Satisfaction::Sat
    } else if current.is_disjoint(&lit.values) {
        Satisfaction::Unsat
    } else {
        Satisfaction::Unknown
    }
}

pub struct IffConstraint {
    head: Literal,
    body: Vec<Literal>,
}

impl IffConstraint {
    pub fn new(head: Literal, body: Vec<Literal>) -> Self {
        IffConstraint { head, body }
    }

    pub fn vars(&self) -> Vec<VarId> {
        let mut vars = vec![self.head.var];
        vars.extend(self.body.iter().map(|l| l.var));
        vars
    }

    /// `Sat` if some body literal definitely holds, `Unsat` if none can
    /// possibly hold, `Unknown` otherwise. Recomputed from scratch each call
    /// rather than cached.
    fn body_satisfaction<D: VarStore>(&self, db: &D) -> Satisfaction {
        let mut any_unknown = false;
        for lit in &self.body {
            match literal_satisfaction(db, lit) {
                Satisfaction::Sat => return Satisfaction::Sat,
                Satisfaction::Unknown => any_unknown = true,
                Satisfaction::Unsat => {}
            }
        }
        if any_unknown {
            Satisfaction::Unknown
        } else {
            Satisfaction::Unsat
        }
    }

    /// The head is true: the body disjunction must hold. If every body
    /// literal but one is already falsified, the survivor is forced (unit
    /// propagation); if none can possibly hold, the head's truth is itself a
    /// contradiction.
    fn propagate_body_true<D: VarStore>(
        &self,
        self_id: ConstraintId,
        db: &mut D,
    ) -> Result<(), Contradiction> {
        let mut candidate: Option<usize> = None;
        for (i, lit) in self.body.iter().enumerate() {
            if literal_satisfaction(db, lit) != Satisfaction::Unsat {
                if candidate.is_some() {
                    return Ok(());
                }
                candidate = Some(i);
            }
        }
        match candidate {
            None => Err(Contradiction::new(self.head.var)),
            Some(i) => {
                let lit = self.body[i].clone();
                db.narrow(lit.var, &lit.values, Some(self_id))?;
                Ok(())
            }
        }
    }

    /// The head is false: every body literal must be excluded.
    fn propagate_body_false<D: VarStore>(
        &self,
        self_id: ConstraintId,
        db: &mut D,
    ) -> Result<(), Contradiction> {
        for lit in &self.body {
            db.exclude(lit.var, &lit.values, Some(self_id))?;
        }
        Ok(())
    }

    fn propagate<D: VarStore>(&self, self_id: ConstraintId, db: &mut D) -> Result<(), Contradiction> {
        match literal_satisfaction(db, &self.head) {
            Satisfaction::Sat => self.propagate_body_true(self_id, db)?,
            Satisfaction::Unsat => self.propagate_body_false(self_id, db)?,
            Satisfaction::Unknown => {}
        }
        match self.body_satisfaction(db) {
            Satisfaction::Sat => {
                db.narrow(self.head.var, &self.head.values, Some(self_id))?;
            }
            Satisfaction::Unsat => {
                db.exclude(self.head.var, &self.head.values, Some(self_id))?;
            }
            Satisfaction::Unknown => {}
        }
        Ok(())
    }
}

impl<D: VarStore> Constraint<D> for IffConstraint {
    fn initialize(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction> {
        for &v in &self.vars() {
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
        // Non-minimal but sound: every other variable's domain, as of the
        // narrowing, is part of why this one had to move (the same relaxed
        // shape `inequality.rs`/`sum.rs` document).
        self.vars()
            .into_iter()
            .filter(|&v| v != ctx.var)
            .map(|v| {
                let (history, _) = db.value_before(v, ctx.timestamp);
                Literal::new(v, history.complement())
            })
            .collect()
    }

    fn check_conflicting(&self, db: &VariableDatabase) -> bool {
        matches!(
            (literal_satisfaction(db, &self.head), self.body_satisfaction(db)),
            (Satisfaction::Sat, Satisfaction::Unsat) | (Satisfaction::Unsat, Satisfaction::Sat)
        )
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
    fn head_true_forces_sole_surviving_disjunct() {
        let mut db = VariableDatabase::new();
        let h = db.new_variable("h", vec![0, 1]);
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        db.narrow(h, &ValueSet::singleton(2, 1), None).unwrap();
        db.narrow(a, &ValueSet::singleton(2, 0), None).unwrap();

        let mut watches = WatchDispatcher::new();
        let mut cons = IffConstraint::new(
            Literal::eq_value(h, 2, 1),
            vec![Literal::eq_value(a, 2, 1), Literal::eq_value(b, 2, 1)],
        );
        Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches).unwrap();
        assert_eq!(db.solved_value(b), Some(1));
    }

    #[test]
    fn body_entailed_forces_head() {
        let mut db = VariableDatabase::new();
        let h = db.new_variable("h", vec![0, 1]);
        let a = db.new_variable("a", vec![0, 1]);
        db.narrow(a, &ValueSet::singleton(2, 1), None).unwrap();

        let mut watches = WatchDispatcher::new();
        let mut cons = IffConstraint::new(Literal::eq_value(h, 2, 1), vec![Literal::eq_value(a, 2, 1)]);
        Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches).unwrap();
        assert_eq!(db.solved_value(h), Some(1));
    }

    #[test]
    fn head_false_excludes_every_disjunct() {
        let mut db = VariableDatabase::new();
        let h = db.new_variable("h", vec![0, 1]);
        let a = db.new_variable("a", vec![0, 1]);
        db.narrow(h, &ValueSet::singleton(2, 0), None).unwrap();

        let mut watches = WatchDispatcher::new();
        let mut cons = IffConstraint::new(Literal::eq_value(h, 2, 1), vec![Literal::eq_value(a, 2, 1)]);
        Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches).unwrap();
        assert_eq!(db.solved_value(a), Some(0));
    }
}

//! `ClauseConstraint`: two-watched-literal clause over `Literal` (variable,
//! ValueSet) pairs, with swap-to-front replacement search on conflict and
//! learned-clause activity/decay/reduction bookkeeping.

use crate::constraint::{Constraint, ExplainContext};
use crate::database::VariableDatabase;
use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, VarId};
use crate::literal::Literal;
use crate::queue::PropagationQueue;
use crate::store::{Narrowed, VarStore};
use crate::trail::DecisionLevel;
use crate::watch::{TriggerSpec, WatchDispatcher, WatchHandle};

/// Bookkeeping attached only to learned clauses.
#[derive(Clone, Debug)]
pub struct ExtendedInfo {
    pub activity: f64,
    pub lbd: u32,
    pub lock_count: u32,
    pub is_permanent: bool,
    pub promotion_source: Option<ConstraintId>,
}

impl ExtendedInfo {
    pub fn new_learned() -> Self {
        ExtendedInfo {
            activity: 0.0,
            lbd: u32::MAX,
            lock_count: 0,
            is_permanent: false,
            promotion_source: None,
        }
    }
}

/// Above this domain size, the clause skips re-scanning positions `2..n`
/// every single time the same big-domain watched variable narrows further
/// within the same decision level ("watcher-disable").
const LARGE_DOMAIN_THRESHOLD: usize = 64;

#[derive(Default)]
struct WatchSlot {
    handle: Option<WatchHandle>,
    disabled_since: Option<DecisionLevel>,
}

pub struct ClauseConstraint {
    literals: Vec<Literal>,
    slots: [WatchSlot; 2],
    pub ext: Option<ExtendedInfo>,
}

impl ClauseConstraint {
    pub fn new(literals: Vec<Literal>) -> Self {
        ClauseConstraint {
            literals,
            slots: Default::default(),
            ext: None,
        }
    }

    pub fn learned(literals: Vec<Literal>) -> Self {
        ClauseConstraint {
            literals,
            slots: Default::default(),
            ext: Some(ExtendedInfo::new_learned()),
        }
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn vars(&self) -> Vec<VarId> {
        self.literals.iter().map(|l| l.var).collect()
    }

    pub fn is_learned(&self) -> bool {
        self.ext.is_some()
    }

    pub fn lock_count(&self) -> u32 {
        self.ext.as_ref().map(|e| e.lock_count).unwrap_or(0)
    }

    pub fn lock(&mut self) {
        if let Some(e) = self.ext.as_mut() {
            e.lock_count += 1;
        }
    }

    pub fn unlock(&mut self) {
        if let Some(e) = self.ext.as_mut() {
            e.lock_count = e.lock_count.saturating_sub(1);
        }
    }

    /// Recomputes LBD: the number of distinct decision levels among the
    /// clause's literals' latest modifications.
    pub fn recompute_lbd(&mut self, db: &VariableDatabase) {
        if let Some(ext) = self.ext.as_mut() {
            let mut levels: Vec<DecisionLevel> =
                self.literals.iter().map(|l| db.level_of(l.var)).collect();
            levels.sort_by_key(|l| l.0);
            levels.dedup();
            ext.lbd = levels.len() as u32;
        }
    }

    pub fn bump_activity(&mut self, increment: f64) {
        if let Some(ext) = self.ext.as_mut() {
            ext.activity += increment;
        }
    }

    pub fn decay_activity(&mut self, decay: f64) {
        if let Some(ext) = self.ext.as_mut() {
            ext.activity *= decay;
        }
    }

    /// Whether this clause may be deleted right now: never permanent, never
    /// locked, and either low activity or high LBD.
    pub fn is_deletable(&self, lbd_keep_threshold: u32, activity_floor: f64) -> bool {
        match &self.ext {
            None => false,
            Some(e) => {
                !e.is_permanent
                    && e.lock_count == 0
                    && (e.lbd > lbd_keep_threshold || e.activity < activity_floor)
            }
        }
    }

    fn is_possible<D: VarStore>(&self, db: &D, i: usize) -> bool {
        db.any_possible(self.literals[i].var, &self.literals[i].values)
    }

    fn register_watch(
        &mut self,
        self_id: ConstraintId,
        watches: &mut WatchDispatcher,
        slot: usize,
    ) {
        let lit = &self.literals[slot];
        let handle = watches.register(
            lit.var,
            self_id,
            TriggerSpec::ValueSetDisjointFrom(lit.values.clone()),
        );
        self.slots[slot] = WatchSlot {
            handle: Some(handle),
            disabled_since: None,
        };
    }

    fn unregister_watch(&mut self, watches: &mut WatchDispatcher, slot: usize) {
        if let Some(h) = self.slots[slot].handle.take() {
            watches.request_remove(h);
        }
    }

    /// Drops both watched-literal registrations. Called once by the solver
    /// when a learned clause is deleted from the constraint store.
    pub fn teardown_watches(&mut self, watches: &mut WatchDispatcher) {
        self.unregister_watch(watches, 0);
        self.unregister_watch(watches, 1);
    }
}

impl<D: VarStore> Constraint<D> for ClauseConstraint {
    fn initialize(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction> {
        let supported: Vec<usize> = (0..self.literals.len())
            .filter(|&i| self.is_possible(db, i))
            .collect();

        if supported.is_empty() {
            let nominal = self.literals.first().map(|l| l.var).unwrap_or(VarId::INVALID);
            return Err(Contradiction::new(nominal));
        }

        if supported.len() == 1 {
            let i = supported[0];
            let lit = self.literals[i].clone();
            db.narrow(lit.var, &lit.values, Some(self_id))?;
            return Ok(());
        }

        let (first, second) = (supported[0], supported[1]);
        self.literals.swap(0, first);
        // If `second` was the literal we just moved out of slot 0, it now
        // lives at `first`'s old position.
        let second = if second == 0 { first } else { second };
        self.literals.swap(1, second);

        self.register_watch(self_id, watches, 0);
        self.register_watch(self_id, watches, 1);
        Ok(())
    }

    fn on_variable_narrowed(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
        _queue: &mut PropagationQueue,
        var: VarId,
        _previous: &ValueSet,
    ) -> Result<(), Contradiction> {
        let i = if self.literals[0].var == var {
            0
        } else if self.literals[1].var == var {
            1
        } else {
            return Ok(());
        };
        let j = 1 - i;

        if self.is_possible(db, i) {
            return Ok(());
        }

        let current_level = db.decision_level();
        let skip_rescan = self.slots[i]
            .disabled_since
            .map(|since| since == current_level)
            .unwrap_or(false);

        let replacement = if skip_rescan {
            None
        } else {
            (2..self.literals.len()).find(|&k| self.is_possible(db, k))
        };

        match replacement {
            Some(k) => {
                self.unregister_watch(watches, i);
                self.literals.swap(i, k);
                self.register_watch(self_id, watches, i);
                Ok(())
            }
            None => {
                if db.domain_size(var) > LARGE_DOMAIN_THRESHOLD {
                    self.slots[i].disabled_since = Some(current_level);
                }
                let lj = self.literals[j].clone();
                db.narrow(lj.var, &lj.values, Some(self_id))?;
                Ok(())
            }
        }
    }

    fn explain(&self, _db: &VariableDatabase, _ctx: ExplainContext) -> Vec<Literal> {
        // A clause propagates literal `lits[j]` exactly when every other
        // literal is currently impossible, i.e. falsified (matches
        // `check_conflicting`'s definition of violated). The clause's own
        // literals, as stored, already are that falsified set; no inversion
        // is needed.
        self.literals.clone()
    }

    fn check_conflicting(&self, db: &VariableDatabase) -> bool {
        self.literals.iter().all(|l| !db.any_possible(l.var, &l.values))
    }

    fn is_backtracking(&self) -> bool {
        true
    }

    fn on_backtrack(&mut self, _db: &mut D, level: DecisionLevel) {
        for slot in self.slots.iter_mut() {
            if let Some(since) = slot.disabled_since {
                if since > level {
                    slot.disabled_since = None;
                }
            }
        }
    }

    fn as_clause_mut(&mut self) -> Option<&mut ClauseConstraint> {
        Some(self)
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
    fn unit_propagation_on_initialize() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        // b = 1 is already excluded, so the clause (a=0) or (b=1) is unit on a=0.
        db.narrow(b, &ValueSet::singleton(2, 0), None).unwrap();

        let mut watches = WatchDispatcher::new();
        let mut clause = ClauseConstraint::new(vec![
            Literal::eq_value(a, 2, 0),
            Literal::eq_value(b, 2, 1),
        ]);
        clause.initialize(cid(1), &mut db, &mut watches).unwrap();
        assert_eq!(db.solved_value(a), Some(0));
    }
}

//! The decision heuristic: VSIDS-style activity bump/decay/rescale with a
//! `random_freq` tie-break.
//!
//! Scans all unassigned variables directly rather than keeping a priority
//! heap: the variable counts this targets (tens to a few hundred per model)
//! make an O(n) scan per decision negligible, and a flat `Vec<f64>` needs no
//! `update`/`heapify` bookkeeping to keep a heap ordering consistent with
//! the activity array.

use crate::database::VariableDatabase;
use crate::ids::{Idx, VarId};
use crate::literal::Literal;
use crate::random::Random;

const ACTIVITY_RESCALE_THRESHOLD: f64 = 1e100;
const ACTIVITY_RESCALE_FACTOR: f64 = 1e-100;

pub struct DecisionHeuristic {
    var_inc: f64,
    var_decay: f64,
    activity: Vec<f64>,
    rand: Random,
    random_freq: f64,
}

impl DecisionHeuristic {
    pub fn new(var_decay: f64, random_freq: f64, seed: u64) -> Self {
        DecisionHeuristic {
            var_inc: 1.0,
            var_decay,
            activity: Vec::new(),
            rand: Random::new(seed),
            random_freq,
        }
    }

    /// Registers a freshly created variable so its activity participates in
    /// decision ordering. Called once per variable ahead of `solve`.
    pub fn init_var(&mut self, v: VarId) {
        let idx = v.idx() - 1;
        if self.activity.len() <= idx {
            self.activity.resize(idx + 1, 0.0);
        }
    }

    fn bump(&mut self, v: VarId) {
        let idx = v.idx() - 1;
        if idx >= self.activity.len() {
            return;
        }
        self.activity[idx] += self.var_inc;
        if self.activity[idx] > ACTIVITY_RESCALE_THRESHOLD {
            for a in self.activity.iter_mut() {
                *a *= ACTIVITY_RESCALE_FACTOR;
            }
            self.var_inc *= ACTIVITY_RESCALE_FACTOR;
        }
    }

    /// Bumps every variable that contributed a resolution step during
    /// conflict analysis.
    pub fn on_conflict_activity(&mut self, lit: &Literal) {
        self.bump(lit.var);
    }

    /// Same bump, keyed directly by variable: `ConflictAnalyzer::analyze`
    /// only has the variable on hand (not a `Literal`) at the point it bumps.
    pub fn bump_var(&mut self, v: VarId) {
        self.bump(v);
    }

    /// Reseeds the tie-break generator for a fresh `solve()` call without
    /// discarding accumulated activities.
    pub fn reseed(&mut self, seed: u64) {
        self.rand = Random::new(seed);
    }

    /// Bumps variables appearing in a constraint's `explain` output even
    /// when they don't end up seen for the first time — every literal
    /// touched while resolving a reason, not only newly-seen ones.
    pub fn on_reason_activity(&mut self, lit: &Literal) {
        self.bump(lit.var);
    }

    pub fn on_variable_assigned(&mut self, _v: VarId) {}

    pub fn on_variable_unassigned(&mut self, _v: VarId) {}

    /// Decays `var_inc` once per conflict, after every learned clause.
    pub fn decay(&mut self) {
        self.var_inc /= self.var_decay;
    }

    /// Picks the next `(variable, value)` decision: an unassigned variable
    /// (random with probability `random_freq`, else highest activity),
    /// paired with the smallest value remaining in its domain:
    /// smallest-first gives deterministic, auditable search order for the
    /// same seed.
    pub fn pick_decision(&mut self, db: &VariableDatabase) -> Option<(VarId, i32)> {
        let num_vars = db.num_vars();
        let candidates: Vec<usize> = (1..=num_vars).filter(|&i| !db.is_solved(VarId::unidx(i))).collect();
        if candidates.is_empty() {
            return None;
        }

        let chosen = if self.rand.chance(self.random_freq) {
            candidates[self.rand.next_below(candidates.len())]
        } else {
            *candidates
                .iter()
                .max_by(|&&a, &&b| {
                    let aa = self.activity.get(a - 1).copied().unwrap_or(0.0);
                    let bb = self.activity.get(b - 1).copied().unwrap_or(0.0);
                    aa.partial_cmp(&bb).unwrap_or(std::cmp::Ordering::Equal)
                })
                .expect("candidates is non-empty")
        };

        let var = VarId::unidx(chosen);
        let value = db.get_min(var).expect("unassigned variable has a non-empty domain");
        Some((var, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValueSet;

    #[test]
    fn prefers_higher_activity_variable() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);

        let mut h = DecisionHeuristic::new(0.95, 0.0, 1);
        h.init_var(a);
        h.init_var(b);
        h.on_conflict_activity(&Literal::eq_value(b, 2, 0));
        h.on_conflict_activity(&Literal::eq_value(b, 2, 0));

        let (chosen, _) = h.pick_decision(&db).unwrap();
        assert_eq!(chosen, b);
    }

    #[test]
    fn skips_already_solved_variables() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        db.narrow(a, &ValueSet::singleton(2, 0), None).unwrap();

        let mut h = DecisionHeuristic::new(0.95, 0.0, 1);
        h.init_var(a);
        h.init_var(b);

        let (chosen, value) = h.pick_decision(&db).unwrap();
        assert_eq!(chosen, b);
        assert_eq!(value, 0);
    }
}

//! `ConflictAnalyzer` — first-UIP conflict-driven clause learning.
//!
//! Walks the global trail backwards from the conflict, resolving the reason
//! of whichever trailed variable is still "on the path" at the current
//! decision level, until exactly one remains — the first unique implication
//! point. Generalized from boolean clause literals to `Literal(var,
//! ValueSet)` antecedents resolved through `Constraint::explain` rather than
//! direct clause storage, since this crate's propagators aren't all clauses.
//!
//! This skips learned-clause minimization: with reasons resolved through an
//! arbitrary `Constraint::explain` rather than a concrete reason clause to
//! recurse into, minimization would need to re-invoke `explain` speculatively
//! for every candidate literal. The learned clause may end up with a few
//! more literals than the minimal one; it is always sound, and the asserting
//! literal and backtrack level (the parts that actually drive search) are
//! unaffected.

use std::collections::HashSet;

use crate::constraint::ExplainContext;
use crate::database::VariableDatabase;
use crate::ids::{ConstraintId, VarId};
use crate::literal::Literal;
use crate::trail::{DecisionLevel, GROUND_LEVEL};

/// The outcome of [`ConflictAnalyzer::analyze`].
pub enum Conflict {
    /// The conflict persisted all the way to ground level: no clause can be
    /// learned, the problem is unsatisfiable.
    Ground,
    /// A single-literal clause was learned; the solver backtracks straight
    /// to ground level and asserts it.
    Unit(Literal),
    /// A multi-literal clause was learned. `backtrack_level` is the second
    /// highest decision level among its literals; `literals[0]` is the
    /// asserting literal (the one that becomes unit once the solver
    /// backtracks there).
    Learned {
        backtrack_level: DecisionLevel,
        literals: Vec<Literal>,
    },
}

pub struct ConflictAnalyzer {
    seen: HashSet<VarId>,
}

impl ConflictAnalyzer {
    pub fn new() -> Self {
        ConflictAnalyzer { seen: HashSet::new() }
    }

    /// Analyzes the conflict raised when `conflicting_constraint` tried (and
    /// failed) to narrow `conflicting_var`. `explain` resolves a
    /// `ConstraintId` to its `Constraint::explain` output — the solver owns
    /// the constraint store and is the only thing that may do that
    /// resolution, so it's threaded through as a callback rather than this
    /// module holding a reference to the store itself. `bump_var` is the
    /// decision heuristic's activity-bump hook, called once per variable
    /// that enters the learned clause's resolution.
    pub fn analyze(
        &mut self,
        db: &VariableDatabase,
        conflicting_constraint: ConstraintId,
        conflicting_var: VarId,
        mut explain: impl FnMut(ConstraintId, ExplainContext) -> Vec<Literal>,
        mut bump_var: impl FnMut(VarId),
    ) -> Conflict {
        let current_level = db.decision_level();
        if current_level == GROUND_LEVEL {
            return Conflict::Ground;
        }

        self.seen.clear();
        let mut out_learnt: Vec<Literal> = Vec::new();
        let mut path_c: i64 = 0;

        // The failing narrow attempt never reached the trail (database.rs
        // reverts it on contradiction), so there's no real timestamp for it;
        // `u32::MAX` asks every `explain` impl for "the reason as of right
        // now", which every existing `explain` (being oblivious to its own
        // `ctx.timestamp` beyond an `Option`-typed `value_before` fallback)
        // already tolerates.
        let mut literals = explain(
            conflicting_constraint,
            ExplainContext { var: conflicting_var, timestamp: u32::MAX },
        );

        let entries = db.trail().entries();
        let mut index = entries.len();

        loop {
            for lit in literals.drain(..) {
                let v = lit.var;
                if self.seen.contains(&v) {
                    continue;
                }
                let level = db.level_of(v);
                if level == GROUND_LEVEL {
                    // Ground facts need no further resolution and never
                    // contribute to the learned clause or path count.
                    continue;
                }
                self.seen.insert(v);
                bump_var(v);
                if level >= current_level {
                    path_c += 1;
                } else {
                    out_learnt.push(lit);
                }
            }

            let pl_index = loop {
                index = index
                    .checked_sub(1)
                    .expect("path_c must reach 0 before the trail is exhausted");
                if self.seen.contains(&entries[index].var) {
                    break index;
                }
            };
            let pl_var = entries[pl_index].var;
            self.seen.remove(&pl_var);
            path_c -= 1;
            if path_c <= 0 {
                let asserting = Literal::new(pl_var, db.get_potential(pl_var).complement());
                out_learnt.insert(0, asserting);
                break;
            }

            let cause = entries[pl_index].cause.expect(
                "a variable still on the path at the conflict level must have been propagated by something",
            );
            literals = explain(
                cause,
                ExplainContext { var: pl_var, timestamp: entries[pl_index].timestamp },
            );
        }

        if out_learnt.len() == 1 {
            Conflict::Unit(out_learnt.into_iter().next().expect("len == 1"))
        } else {
            let mut max_i = 1;
            let mut max_level = db.level_of(out_learnt[1].var);
            for i in 2..out_learnt.len() {
                let level = db.level_of(out_learnt[i].var);
                if level > max_level {
                    max_level = level;
                    max_i = i;
                }
            }
            out_learnt.swap(1, max_i);
            Conflict::Learned {
                backtrack_level: max_level,
                literals: out_learnt,
            }
        }
    }
}

impl Default for ConflictAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValueSet;
    use crate::ids::Idx;
    use crate::store::VarStore;

    fn cid(n: usize) -> ConstraintId {
        ConstraintId::unidx(n)
    }

    /// Two decisions (level 1: a=0, level 2: b=0) plus a clause `(a=1) or
    /// (b=1)` whose propagation at level 2 conflicts with `b`'s own domain
    /// (already forced to 0 by the decision). `b`'s decision is the only
    /// variable at the conflict level, so it is the first UIP: the learned
    /// clause asserts `b != 0` alongside `a`'s (earlier-level) contribution,
    /// backtracking to level 1.
    #[test]
    fn two_level_conflict_learns_clause_over_second_decision() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);

        db.new_decision_level();
        db.narrow(a, &ValueSet::singleton(2, 0), None).unwrap();

        db.new_decision_level();
        db.narrow(b, &ValueSet::singleton(2, 0), None).unwrap();

        // Simulate the clause (a=1) or (b=1) discovering, once b=0, that it
        // is violated (both disjuncts false): explain returns both literals
        // as stored, no inversion.
        let clause_literals = vec![Literal::eq_value(a, 2, 1), Literal::eq_value(b, 2, 1)];

        let mut analyzer = ConflictAnalyzer::new();
        let mut bumped = Vec::new();
        let outcome = analyzer.analyze(
            &db,
            cid(1),
            b,
            |_id, _ctx| clause_literals.clone(),
            |v| bumped.push(v),
        );

        match outcome {
            Conflict::Learned { backtrack_level, literals } => {
                assert_eq!(backtrack_level, DecisionLevel(1));
                assert_eq!(literals[0].var, b);
                assert!(literals[0].values.contains(1));
                assert!(!literals[0].values.contains(0));
                assert!(literals.iter().any(|l| l.var == a));
            }
            _ => panic!("expected a learned clause"),
        }
    }

    #[test]
    fn conflict_at_ground_level_is_unsatisfiable() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let mut analyzer = ConflictAnalyzer::new();
        let outcome = analyzer.analyze(&db, cid(1), a, |_id, _ctx| Vec::new(), |_v| {});
        assert!(matches!(outcome, Conflict::Ground));
    }
}

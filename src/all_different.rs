//! `AllDifferent` — no two variables in the constrained set may be assigned
//! the same value.
//!
//! Offers two consistency levels: "weak" (arc-consistency, watch only
//! `BecameSingleton` and exclude a just-solved value from every sibling) and
//! "strong"/bounds (`HallIntervalPropagator` over `[min, max]` per variable,
//! run once on the normal value order and once on the negated order to
//! tighten both bounds, then a weak-mode sweep over any variable the Hall
//! pass itself pinned to a singleton). Conflict explanations for both modes
//! go through [`crate::max_occurrence::explain`]: a `MaxOccurrenceExplainer`
//! configured with capacity 1 per value, since `AllDifferent` is
//! `Cardinality` with every bound pinned to `[0, 1]`.

use crate::constraint::{Constraint, ExplainContext};
use crate::database::VariableDatabase;
use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::hall::{check_and_prune, Interval};
use crate::ids::{ConstraintId, VarId};
use crate::literal::Literal;
use crate::max_occurrence::{self, Edge};
use crate::queue::PropagationQueue;
use crate::store::VarStore;
use crate::watch::{TriggerSpec, WatchDispatcher, WatchHandle};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Weak,
    Bounds,
}

pub struct AllDifferentConstraint {
    vars: Vec<VarId>,
    consistency: Consistency,
    watches: Vec<WatchHandle>,
}

impl AllDifferentConstraint {
    pub fn new(vars: Vec<VarId>, consistency: Consistency) -> Self {
        AllDifferentConstraint {
            vars,
            consistency,
            watches: Vec::new(),
        }
    }

    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    fn exclude_solved_value<D: VarStore>(
        &self,
        self_id: ConstraintId,
        db: &mut D,
        solved_var: VarId,
        value: i32,
    ) -> Result<(), Contradiction> {
        for &other in &self.vars {
            if other == solved_var {
                continue;
            }
            db.exclude_value(other, value, Some(self_id))?;
        }
        Ok(())
    }

    fn propagate_weak<D: VarStore>(&self, self_id: ConstraintId, db: &mut D) -> Result<(), Contradiction> {
        for &v in &self.vars {
            if let Some(value) = db.solved_value(v) {
                self.exclude_solved_value(self_id, db, v, value)?;
            }
        }
        Ok(())
    }

    fn propagate_bounds<D: VarStore>(
        &self,
        self_id: ConstraintId,
        db: &mut D,
    ) -> Result<(), Contradiction> {
        let mut intervals: Vec<Interval> = self
            .vars
            .iter()
            .enumerate()
            .map(|(i, &v)| Interval {
                key: i,
                min_value: db.get_min(v).unwrap_or(0),
                max_value: db.get_max(v).unwrap_or(0),
            })
            .collect();
        let mut raises: Vec<(usize, i32)> = Vec::new();
        if !check_and_prune(&mut intervals, |_| 1, |key, new_min| raises.push((key, new_min))) {
            return Err(self.contradiction_for_matching_failure(db));
        }
        for (key, new_min) in raises {
            db.exclude_less_than(self.vars[key], new_min, Some(self_id))?;
        }

        let mut inverted: Vec<Interval> = self
            .vars
            .iter()
            .enumerate()
            .map(|(i, &v)| Interval {
                key: i,
                min_value: -db.get_max(v).unwrap_or(0),
                max_value: -db.get_min(v).unwrap_or(0),
            })
            .collect();
        let mut lowers: Vec<(usize, i32)> = Vec::new();
        if !check_and_prune(&mut inverted, |_| 1, |key, new_min| lowers.push((key, new_min))) {
            return Err(self.contradiction_for_matching_failure(db));
        }
        for (key, new_min) in lowers {
            db.exclude_greater_than(self.vars[key], -new_min, Some(self_id))?;
        }

        // Bounds-tightening above can itself pin a variable to a singleton;
        // run the weak-mode exclusion over every currently-solved variable
        // so that value is removed from every sibling before the next
        // decision, not just the ones whose own bound moved.
        self.propagate_weak(self_id, db)
    }

    fn contradiction_for_matching_failure<D: VarStore>(&self, _db: &D) -> Contradiction {
        Contradiction::new(self.vars.first().copied().unwrap_or(VarId::INVALID))
    }

    /// Builds the bipartite GAC graph (one node per candidate value) and
    /// delegates to `MaxOccurrenceExplainer`, translating node ids back to
    /// real literals that all share one excluded-value complement.
    fn explain_via_matching(&self, db: &VariableDatabase, removed: Option<(VarId, i32)>) -> Vec<Literal> {
        let mut values: Vec<i32> = Vec::new();
        for &v in &self.vars {
            for i in 0..db.domain_size(v) {
                let val = db.value_at(v, i);
                if !values.contains(&val) {
                    values.push(val);
                }
            }
        }
        values.sort_unstable();

        let mut edges = Vec::new();
        for (vi, &v) in self.vars.iter().enumerate() {
            for (ni, &val) in values.iter().enumerate() {
                if db.is_possible(v, val) {
                    edges.push(Edge { var: vi, value_node: ni });
                }
            }
        }

        let mut matching = crate::matching::BipartiteMatching::new(self.vars.len(), values.len());
        for e in &edges {
            matching.add_edge(e.var, e.value_node);
        }
        let deprioritize = removed.and_then(|(var, _)| self.vars.iter().position(|&v| v == var));
        matching.compute_maximal_matching(deprioritize);

        let matched_value_of: Vec<Option<usize>> =
            (0..self.vars.len()).map(|i| matching.matched_right_of(i)).collect();
        let unconstrained = vec![false; values.len()];
        let removed_nodes: Vec<usize> = removed
            .and_then(|(_, val)| values.iter().position(|&x| x == val))
            .into_iter()
            .collect();

        let explanation = max_occurrence::explain(
            self.vars.len(),
            values.len(),
            &edges,
            &matched_value_of,
            &unconstrained,
            &removed_nodes,
        );

        let size = values.len();
        let mut excluded = ValueSet::empty(size);
        for n in explanation.explaining_value_nodes {
            excluded.insert(n);
        }
        // Translate into each variable's own domain indexing.
        explanation
            .explaining_vars
            .into_iter()
            .map(|vi| {
                let var = self.vars[vi];
                let mut as_own_domain = ValueSet::empty(db.domain_size(var));
                for n in excluded.iter() {
                    if let Some(idx) = db.index_of(var, values[n]) {
                        as_own_domain.insert(idx);
                    }
                }
                Literal {
                    var,
                    values: as_own_domain.complement(),
                }
            })
            .collect()
    }
}

impl<D: VarStore> Constraint<D> for AllDifferentConstraint {
    fn initialize(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction> {
        match self.consistency {
            Consistency::Weak => {
                for &v in &self.vars {
                    let h = watches.register(v, self_id, TriggerSpec::BecameSingleton);
                    self.watches.push(h);
                }
                self.propagate_weak(self_id, db)
            }
            Consistency::Bounds => {
                for &v in &self.vars {
                    let h1 = watches.register(v, self_id, TriggerSpec::LowerBoundRaised);
                    let h2 = watches.register(v, self_id, TriggerSpec::UpperBoundLowered);
                    self.watches.push(h1);
                    self.watches.push(h2);
                }
                self.propagate_bounds(self_id, db)
            }
        }
    }

    fn on_variable_narrowed(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        _watches: &mut WatchDispatcher,
        _queue: &mut PropagationQueue,
        var: VarId,
        _previous: &ValueSet,
    ) -> Result<(), Contradiction> {
        match self.consistency {
            Consistency::Weak => {
                if let Some(value) = db.solved_value(var) {
                    self.exclude_solved_value(self_id, db, var, value)?;
                }
                Ok(())
            }
            Consistency::Bounds => self.propagate_bounds(self_id, db),
        }
    }

    fn explain(&self, db: &VariableDatabase, ctx: ExplainContext) -> Vec<Literal> {
        let value = db.solved_value(ctx.var).or_else(|| {
            let (prev, _) = db.value_before(ctx.var, ctx.timestamp);
            prev.first().map(|i| db.value_at(ctx.var, i))
        });
        self.explain_via_matching(db, value.map(|v| (ctx.var, v)))
    }

    fn check_conflicting(&self, db: &VariableDatabase) -> bool {
        let mut seen = Vec::new();
        for &v in &self.vars {
            if let Some(val) = db.solved_value(v) {
                if seen.contains(&val) {
                    return true;
                }
                seen.push(val);
            }
        }
        false
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
    fn weak_mode_excludes_solved_value_from_siblings() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        db.narrow(a, &ValueSet::singleton(2, 0), None).unwrap();

        let mut watches = WatchDispatcher::new();
        let mut c = AllDifferentConstraint::new(vec![a, b], Consistency::Weak);
        Constraint::<VariableDatabase>::initialize(&mut c, cid(1), &mut db, &mut watches).unwrap();
        assert!(!db.is_possible(b, 0));
        assert!(db.is_possible(b, 1));
    }

    #[test]
    fn bounds_mode_detects_pigeonhole_infeasibility() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        let c = db.new_variable("c", vec![0, 1]);

        let mut watches = WatchDispatcher::new();
        let mut cons = AllDifferentConstraint::new(vec![a, b, c], Consistency::Bounds);
        let result = Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches);
        assert!(result.is_err());
    }
}

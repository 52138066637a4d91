//! `Cardinality` — given a set of variables and, for some subset of values, a
//! required `[min, max]` occurrence count, ensure every value's count across
//! the variables stays within its declared range. `AllDifferent` is the
//! special case where every value's range is `[0,1]`.
//!
//! An upper-bound constraint (UBC) enforced via maximum bipartite matching
//! plus strongly-connected-components over the matching's implicit residual
//! graph (Régin's generalized-arc-consistency algorithm for `gcc`), and a
//! lower-bound constraint (LBC) enforced separately by direct counting: if
//! exactly as many candidates remain for a value as it still needs, they are
//! all forced to it. The matching and SCCs are recomputed from scratch on
//! every `propagate` call rather than maintained incrementally; this changes
//! how much gets pruned per call, not soundness.

use std::collections::HashMap;

use crate::constraint::{Constraint, ExplainContext};
use crate::database::VariableDatabase;
use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, VarId};
use crate::literal::Literal;
use crate::matching::BipartiteMatching;
use crate::max_occurrence::{self, Edge};
use crate::queue::PropagationQueue;
use crate::scc::strongly_connected_components;
use crate::store::VarStore;
use crate::trail::DecisionLevel;
use crate::watch::{TriggerSpec, WatchDispatcher, WatchHandle};

pub struct CardinalityConstraint {
    vars: Vec<VarId>,
    mins: HashMap<i32, usize>,
    maxs: HashMap<i32, usize>,
    watches: Vec<WatchHandle>,
}

impl CardinalityConstraint {
    pub fn new(vars: Vec<VarId>, mins: HashMap<i32, usize>, maxs: HashMap<i32, usize>) -> Self {
        CardinalityConstraint {
            vars,
            mins,
            maxs,
            watches: Vec::new(),
        }
    }

    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    fn value_universe<D: VarStore>(&self, db: &D) -> Vec<i32> {
        let mut values: Vec<i32> = Vec::new();
        for &v in &self.vars {
            for i in 0..db.domain_size(v) {
                let val = db.value_at(v, i);
                if !values.contains(&val) {
                    values.push(val);
                }
            }
        }
        for &k in self.mins.keys().chain(self.maxs.keys()) {
            if !values.contains(&k) {
                values.push(k);
            }
        }
        values.sort_unstable();
        values
    }

    fn max_of(&self, v: i32) -> usize {
        self.maxs.get(&v).copied().unwrap_or(self.vars.len())
    }

    fn build_matching<D: VarStore>(
        &self,
        db: &D,
        values: &[i32],
        deprioritize: Option<usize>,
    ) -> (BipartiteMatching, Vec<Edge>) {
        let mut matching = BipartiteMatching::new(self.vars.len(), values.len());
        for (ni, &val) in values.iter().enumerate() {
            matching.set_right_capacity(ni, self.max_of(val));
        }
        let mut edges = Vec::new();
        for (vi, &v) in self.vars.iter().enumerate() {
            for (ni, &val) in values.iter().enumerate() {
                if db.is_possible(v, val) {
                    matching.add_edge(vi, ni);
                    edges.push(Edge { var: vi, value_node: ni });
                }
            }
        }
        matching.compute_maximal_matching(deprioritize);
        (matching, edges)
    }

    fn explain_via_matching<D: VarStore>(&self, db: &D, removed: Option<(VarId, i32)>) -> Vec<Literal> {
        let values = self.value_universe(db);
        let deprioritize = removed.and_then(|(var, _)| self.vars.iter().position(|&v| v == var));
        let (matching, edges) = self.build_matching(db, &values, deprioritize);

        let matched_value_of: Vec<Option<usize>> =
            (0..self.vars.len()).map(|i| matching.matched_right_of(i)).collect();
        let unconstrained: Vec<bool> = values.iter().map(|&v| !self.maxs.contains_key(&v)).collect();
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

        let mut excluded = ValueSet::empty(values.len());
        for n in &explanation.explaining_value_nodes {
            excluded.insert(*n);
        }
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

    /// Régin's GAC pruning pass: an edge (variable, value) that isn't part
    /// of the current matching can be removed from the variable's domain if
    /// the value is neither in the same SCC as the variable nor reachable
    /// from a value with spare capacity.
    fn prune_via_scc<D: VarStore>(
        &self,
        self_id: ConstraintId,
        db: &mut D,
        values: &[i32],
        matching: &BipartiteMatching,
        edges: &[Edge],
    ) -> Result<(), Contradiction> {
        let num_vars = self.vars.len();
        let num_values = values.len();
        let total = num_vars + num_values;

        let mut by_value: Vec<Vec<usize>> = vec![Vec::new(); num_values];
        for e in edges {
            by_value[e.value_node].push(e.var);
        }
        let matched_value_of: Vec<Option<usize>> =
            (0..num_vars).map(|i| matching.matched_right_of(i)).collect();

        let successors = |node: usize| -> Vec<usize> {
            if node < num_vars {
                match matched_value_of[node] {
                    Some(n) => vec![num_vars + n],
                    None => Vec::new(),
                }
            } else {
                let n = node - num_vars;
                by_value[n]
                    .iter()
                    .copied()
                    .filter(|&v| matched_value_of[v] != Some(n))
                    .collect()
            }
        };
        let scc = strongly_connected_components(total, successors);

        let has_spare_capacity = |n: usize| -> bool {
            !self.maxs.contains_key(&values[n]) || matching.num_matched_on_right(n) < matching.right_capacity(n)
        };
        let mut reachable_from_free = vec![false; total];
        {
            let mut stack: Vec<usize> = (0..num_values).filter(|&n| has_spare_capacity(n)).map(|n| num_vars + n).collect();
            while let Some(node) = stack.pop() {
                if reachable_from_free[node] {
                    continue;
                }
                reachable_from_free[node] = true;
                for s in successors(node) {
                    if !reachable_from_free[s] {
                        stack.push(s);
                    }
                }
            }
        }

        for e in edges {
            if matched_value_of[e.var] == Some(e.value_node) {
                continue;
            }
            let var_node = e.var;
            let val_node = num_vars + e.value_node;
            if scc[var_node] == scc[val_node] || reachable_from_free[val_node] {
                continue;
            }
            db.exclude_value(self.vars[e.var], values[e.value_node], Some(self_id))?;
        }
        Ok(())
    }

    fn process_upper_bound<D: VarStore>(&self, self_id: ConstraintId, db: &mut D) -> Result<(), Contradiction> {
        let values = self.value_universe(db);
        let (matching, edges) = self.build_matching(db, &values, None);
        if matching.matched_right_of(0).is_some() || self.vars.is_empty() {
            // fallthrough; matched count checked below regardless
        }
        let matched_count = (0..self.vars.len()).filter(|&i| matching.matched_right_of(i).is_some()).count();
        if matched_count < self.vars.len() {
            return Err(Contradiction::new(self.vars.first().copied().unwrap_or(VarId::INVALID)));
        }
        self.prune_via_scc(self_id, db, &values, &matching, &edges)
    }

    /// Counting-based lower-bound enforcement (see module docs): a value
    /// whose remaining required count equals its remaining candidate count
    /// forces every candidate to it.
    fn process_lower_bound<D: VarStore>(&self, self_id: ConstraintId, db: &mut D) -> Result<(), Contradiction> {
        for (&value, &min_count) in self.mins.iter() {
            if min_count == 0 {
                continue;
            }
            let solved_count = self
                .vars
                .iter()
                .filter(|&&v| db.solved_value(v) == Some(value))
                .count();
            if solved_count >= min_count {
                continue;
            }
            let needed = min_count - solved_count;
            let candidates: Vec<VarId> = self
                .vars
                .iter()
                .copied()
                .filter(|&v| !db.is_solved(v) && db.is_possible(v, value))
                .collect();
            if candidates.len() < needed {
                return Err(Contradiction::new(
                    candidates.first().copied().unwrap_or(VarId::INVALID),
                ));
            }
            if candidates.len() == needed {
                for var in candidates {
                    if let Some(idx) = db.index_of(var, value) {
                        let size = db.domain_size(var);
                        let singleton = ValueSet::singleton(size, idx);
                        db.narrow(var, &singleton, Some(self_id))?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl<D: VarStore> Constraint<D> for CardinalityConstraint {
    fn initialize(
        &mut self,
        self_id: ConstraintId,
        db: &mut D,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction> {
        for &v in &self.vars {
            let h1 = watches.register(v, self_id, TriggerSpec::LowerBoundRaised);
            let h2 = watches.register(v, self_id, TriggerSpec::UpperBoundLowered);
            let h3 = watches.register(v, self_id, TriggerSpec::BecameSingleton);
            self.watches.push(h1);
            self.watches.push(h2);
            self.watches.push(h3);
        }
        self.process_upper_bound(self_id, db)?;
        self.process_lower_bound(self_id, db)
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
        self.process_upper_bound(self_id, db)?;
        self.process_lower_bound(self_id, db)
    }

    fn explain(&self, db: &VariableDatabase, ctx: ExplainContext) -> Vec<Literal> {
        let value = db.solved_value(ctx.var).or_else(|| {
            let (prev, _) = db.value_before(ctx.var, ctx.timestamp);
            prev.first().map(|i| db.value_at(ctx.var, i))
        });
        self.explain_via_matching(db, value.map(|v| (ctx.var, v)))
    }

    fn check_conflicting(&self, db: &VariableDatabase) -> bool {
        let mut counts: HashMap<i32, usize> = HashMap::new();
        for &v in &self.vars {
            if let Some(val) = db.solved_value(v) {
                *counts.entry(val).or_insert(0) += 1;
            }
        }
        for (&val, &max_count) in self.maxs.iter() {
            if counts.get(&val).copied().unwrap_or(0) > max_count {
                return true;
            }
        }
        false
    }

    fn is_backtracking(&self) -> bool {
        false
    }

    fn on_backtrack(&mut self, _db: &mut D, _level: DecisionLevel) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Idx;

    fn cid(n: usize) -> ConstraintId {
        ConstraintId::unidx(n)
    }

    #[test]
    fn upper_bound_prunes_oversaturated_value() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![0, 1]);
        let c = db.new_variable("c", vec![0, 1]);

        let mut maxs = HashMap::new();
        maxs.insert(0, 1);
        maxs.insert(1, 2);
        let mins = HashMap::new();

        let mut watches = WatchDispatcher::new();
        let mut cons = CardinalityConstraint::new(vec![a, b, c], mins, maxs);
        let result = Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches);
        assert!(result.is_ok());
    }

    #[test]
    fn lower_bound_forces_last_candidate() {
        let mut db = VariableDatabase::new();
        let a = db.new_variable("a", vec![0, 1]);
        let b = db.new_variable("b", vec![1]);
        db.narrow(a, &ValueSet::singleton(2, 1), None).unwrap();

        let mut mins = HashMap::new();
        mins.insert(0, 1);
        let maxs = HashMap::new();

        let mut watches = WatchDispatcher::new();
        let mut cons = CardinalityConstraint::new(vec![a, b], mins, maxs);
        let result = Constraint::<VariableDatabase>::initialize(&mut cons, cid(1), &mut db, &mut watches);
        // both a and b are pinned to 1, so value 0's required minimum of 1
        // can never be met: this must be detected as a contradiction.
        assert!(result.is_err());
    }
}

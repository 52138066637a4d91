//! `VariableDatabase` owns domains and the trail, and exposes the narrowing
//! API every constraint is built on.
//!
//! Generalizes a two-valued boolean assignment trail to arbitrary finite
//! integer domains: `new_var`/`narrow`/`backtrack_to` play the roles a
//! boolean SAT assignment stack plays, widened to value sets.

use std::collections::{HashMap, HashSet};

use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, IdxVec, VarId};
use crate::trail::{AssignmentTrail, DecisionLevel, TrailEntry, GROUND_LEVEL};

struct VarRecord {
    name: String,
    /// The actual integer domain values, ascending, indexed the same way as
    /// the variable's `ValueSet`s — an arbitrary sorted value list rather
    /// than assuming a contiguous range.
    values: Vec<i32>,
    current: ValueSet,
    last_mod_time: Option<u32>,
}

impl VarRecord {
    fn index_of(&self, v: i32) -> Option<usize> {
        self.values.binary_search(&v).ok()
    }
}

/// The outcome of a [`VariableDatabase::narrow`] call that didn't
/// contradict. `Unchanged` means no trail entry was created and no watch
/// needs to be dispatched.
pub enum NarrowOutcome {
    Unchanged,
    Changed { previous: ValueSet, timestamp: u32 },
}

pub struct VariableDatabase {
    vars: IdxVec<VarId, VarRecord>,
    trail: AssignmentTrail,
    in_progress: HashSet<VarId>,
    fully_satisfied: HashMap<ConstraintId, DecisionLevel>,
}

impl VariableDatabase {
    pub fn new() -> Self {
        VariableDatabase {
            vars: IdxVec::new(),
            trail: AssignmentTrail::new(),
            in_progress: HashSet::new(),
            fully_satisfied: HashMap::new(),
        }
    }

    /// Creates a new variable with the given discrete domain. The domain is
    /// sorted and deduplicated; `values` must be non-empty (checked by the
    /// caller).
    pub fn new_variable(&mut self, name: impl Into<String>, mut values: Vec<i32>) -> VarId {
        values.sort_unstable();
        values.dedup();
        let size = values.len();
        self.vars.push(VarRecord {
            name: name.into(),
            values,
            current: ValueSet::full(size),
            last_mod_time: None,
        })
    }

    pub fn name(&self, var: VarId) -> &str {
        &self.vars[var].name
    }

    pub fn domain_size(&self, var: VarId) -> usize {
        self.vars[var].values.len()
    }

    pub fn value_at(&self, var: VarId, index: usize) -> i32 {
        self.vars[var].values[index]
    }

    pub fn index_of(&self, var: VarId, v: i32) -> Option<usize> {
        self.vars[var].index_of(v)
    }

    pub fn decision_level(&self) -> DecisionLevel {
        self.trail.decision_level()
    }

    pub fn new_decision_level(&mut self) {
        self.trail.new_decision_level();
    }

    pub fn trail(&self) -> &AssignmentTrail {
        &self.trail
    }

    // -- read API --------------------------------------------------------

    pub fn get_potential(&self, var: VarId) -> &ValueSet {
        &self.vars[var].current
    }

    pub fn get_min(&self, var: VarId) -> Option<i32> {
        let rec = &self.vars[var];
        rec.current.first().map(|i| rec.values[i])
    }

    pub fn get_max(&self, var: VarId) -> Option<i32> {
        let rec = &self.vars[var];
        rec.current.last().map(|i| rec.values[i])
    }

    pub fn is_solved(&self, var: VarId) -> bool {
        self.vars[var].current.count() == 1
    }

    pub fn solved_value(&self, var: VarId) -> Option<i32> {
        let rec = &self.vars[var];
        if rec.current.count() == 1 {
            rec.current.first().map(|i| rec.values[i])
        } else {
            None
        }
    }

    pub fn is_possible(&self, var: VarId, v: i32) -> bool {
        let rec = &self.vars[var];
        rec.index_of(v).map(|i| rec.current.contains(i)).unwrap_or(false)
    }

    pub fn any_possible(&self, var: VarId, subset: &ValueSet) -> bool {
        !self.vars[var].current.is_disjoint(subset)
    }

    pub fn all_solved(&self) -> bool {
        use crate::ids::Idx;
        (1..=self.vars.len()).all(|i| self.is_solved(VarId::unidx(i)))
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// The id that the next call to [`VariableDatabase::new_variable`] would
    /// return, without actually creating it. Lets callers report a
    /// `ModelError` that names the rejected variable (e.g. `EmptyDomain`)
    /// before deciding whether to register it at all.
    pub fn next_var_id(&self) -> VarId {
        use crate::ids::Idx;
        VarId::unidx(self.vars.len() + 1)
    }

    // -- historical queries -----------------------------------------------

    /// Walks `var`'s backward mod-time chain to find the value set in
    /// effect strictly before timestamp `t`, plus the timestamp to continue
    /// walking from. Each step follows `previous_mod_time`, which already
    /// links to the prior entry *for this variable specifically*.
    pub fn value_before(&self, var: VarId, t: u32) -> (ValueSet, Option<u32>) {
        let rec = &self.vars[var];
        let mut candidate = rec.current.clone();
        let mut candidate_prev_time = rec.last_mod_time;
        let mut cursor = rec.last_mod_time;
        while let Some(ts) = cursor {
            let entry = self
                .trail
                .entry_by_timestamp(ts)
                .expect("mod-time chain points at a live trail entry");
            if entry.timestamp < t {
                break;
            }
            candidate = entry.previous.clone();
            candidate_prev_time = entry.previous_mod_time;
            cursor = entry.previous_mod_time;
        }
        (candidate, candidate_prev_time)
    }

    pub fn mod_time_before(&self, var: VarId, t: u32) -> Option<u32> {
        self.value_before(var, t).1
    }

    pub fn last_mod_time(&self, var: VarId) -> Option<u32> {
        self.vars[var].last_mod_time
    }

    /// The decision level at which `var` was last narrowed, or ground level
    /// if it has never been touched.
    pub fn level_of(&self, var: VarId) -> DecisionLevel {
        match self.vars[var].last_mod_time {
            Some(ts) => self.trail.level_of_timestamp(ts),
            None => GROUND_LEVEL,
        }
    }

    pub fn mark_constraint_fully_satisfied(&mut self, constraint: ConstraintId) {
        self.fully_satisfied.insert(constraint, self.trail.decision_level());
    }

    pub fn is_fully_satisfied(&self, constraint: ConstraintId) -> bool {
        self.fully_satisfied.contains_key(&constraint)
    }

    // -- narrowing API ----------------------------------------------------

    /// Replaces `var`'s value set with its intersection with `subset`.
    pub fn narrow(
        &mut self,
        var: VarId,
        subset: &ValueSet,
        cause: Option<ConstraintId>,
    ) -> Result<NarrowOutcome, Contradiction> {
        debug_assert!(
            !self.in_progress.contains(&var),
            "reentrant narrow on variable currently being dispatched"
        );
        let rec = &mut self.vars[var];
        let next = &rec.current & subset;
        if next == rec.current {
            return Ok(NarrowOutcome::Unchanged);
        }
        let previous = std::mem::replace(&mut rec.current, next);
        if rec.current.is_empty() {
            // Leave the trail un-appended: the failing narrowing never
            // committed, so backtracking never needs to see it.
            rec.current = previous;
            return Err(Contradiction::new(var));
        }
        let prev_mod = rec.last_mod_time;
        let timestamp = self.trail.push(var, previous.clone(), prev_mod, cause);
        self.vars[var].last_mod_time = Some(timestamp);
        Ok(NarrowOutcome::Changed { previous, timestamp })
    }

    pub fn exclude(
        &mut self,
        var: VarId,
        subset: &ValueSet,
        cause: Option<ConstraintId>,
    ) -> Result<NarrowOutcome, Contradiction> {
        self.narrow(var, &subset.complement(), cause)
    }

    pub fn exclude_value(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<NarrowOutcome, Contradiction> {
        let size = self.domain_size(var);
        match self.index_of(var, v) {
            Some(i) => {
                let mut keep = ValueSet::full(size);
                keep.remove(i);
                self.narrow(var, &keep, cause)
            }
            None => Ok(NarrowOutcome::Unchanged),
        }
    }

    pub fn exclude_less_than(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<NarrowOutcome, Contradiction> {
        let size = self.domain_size(var);
        let mut keep = ValueSet::empty(size);
        for (i, &val) in self.vars[var].values.clone().iter().enumerate() {
            if val >= v {
                keep.insert(i);
            }
        }
        self.narrow(var, &keep, cause)
    }

    pub fn exclude_greater_than(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<NarrowOutcome, Contradiction> {
        let size = self.domain_size(var);
        let mut keep = ValueSet::empty(size);
        for (i, &val) in self.vars[var].values.clone().iter().enumerate() {
            if val <= v {
                keep.insert(i);
            }
        }
        self.narrow(var, &keep, cause)
    }

    // -- backtracking -------------------------------------------------------

    /// Pops trail entries above `level`, restoring each variable's value
    /// set and mod-time pointer in strict LIFO order, then invoking
    /// `on_pop` so the solver can run decision-heuristic unassign hooks and
    /// decrement learned-clause lock counts.
    pub fn backtrack_to(&mut self, level: DecisionLevel, mut on_pop: impl FnMut(&TrailEntry)) {
        let vars = &mut self.vars;
        self.trail.rewind_until_level(level, |entry| {
            let rec = &mut vars[entry.var];
            rec.current = entry.previous.clone();
            rec.last_mod_time = entry.previous_mod_time;
            on_pop(entry);
        });
        self.fully_satisfied.retain(|_, l| *l <= level);
        debug_assert!(self.in_progress.is_empty(), "backtrack while a dispatch was in progress");
    }

    pub fn backtrack_to_ground(&mut self, on_pop: impl FnMut(&TrailEntry)) {
        self.backtrack_to(GROUND_LEVEL, on_pop);
    }

    // -- reentrancy guard, used by the solver's dispatch loop -----------

    pub fn begin_dispatching(&mut self, var: VarId) {
        let inserted = self.in_progress.insert(var);
        debug_assert!(inserted, "variable was already being dispatched");
    }

    pub fn end_dispatching(&mut self, var: VarId) {
        self.in_progress.remove(&var);
    }
}

impl Default for VariableDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::store::VarStore for VariableDatabase {
    fn get_potential(&self, var: VarId) -> ValueSet {
        self.get_potential(var).clone()
    }
    fn get_min(&self, var: VarId) -> Option<i32> {
        self.get_min(var)
    }
    fn get_max(&self, var: VarId) -> Option<i32> {
        self.get_max(var)
    }
    fn is_solved(&self, var: VarId) -> bool {
        self.is_solved(var)
    }
    fn solved_value(&self, var: VarId) -> Option<i32> {
        self.solved_value(var)
    }
    fn is_possible(&self, var: VarId, v: i32) -> bool {
        self.is_possible(var, v)
    }
    fn any_possible(&self, var: VarId, subset: &ValueSet) -> bool {
        self.any_possible(var, subset)
    }
    fn domain_size(&self, var: VarId) -> usize {
        self.domain_size(var)
    }
    fn value_at(&self, var: VarId, index: usize) -> i32 {
        self.value_at(var, index)
    }
    fn index_of(&self, var: VarId, v: i32) -> Option<usize> {
        self.index_of(var, v)
    }
    fn decision_level(&self) -> DecisionLevel {
        self.decision_level()
    }
    fn level_of(&self, var: VarId) -> DecisionLevel {
        self.level_of(var)
    }
    fn narrow(
        &mut self,
        var: VarId,
        subset: &ValueSet,
        cause: Option<ConstraintId>,
    ) -> Result<crate::store::Narrowed, Contradiction> {
        match self.narrow(var, subset, cause)? {
            NarrowOutcome::Unchanged => Ok(crate::store::Narrowed::Unchanged),
            NarrowOutcome::Changed { .. } => Ok(crate::store::Narrowed::Changed),
        }
    }
    fn exclude_value(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<crate::store::Narrowed, Contradiction> {
        match self.exclude_value(var, v, cause)? {
            NarrowOutcome::Unchanged => Ok(crate::store::Narrowed::Unchanged),
            NarrowOutcome::Changed { .. } => Ok(crate::store::Narrowed::Changed),
        }
    }
    fn exclude_less_than(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<crate::store::Narrowed, Contradiction> {
        match self.exclude_less_than(var, v, cause)? {
            NarrowOutcome::Unchanged => Ok(crate::store::Narrowed::Unchanged),
            NarrowOutcome::Changed { .. } => Ok(crate::store::Narrowed::Changed),
        }
    }
    fn exclude_greater_than(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<crate::store::Narrowed, Contradiction> {
        match self.exclude_greater_than(var, v, cause)? {
            NarrowOutcome::Unchanged => Ok(crate::store::Narrowed::Unchanged),
            NarrowOutcome::Changed { .. } => Ok(crate::store::Narrowed::Changed),
        }
    }
    fn mark_constraint_fully_satisfied(&mut self, constraint: ConstraintId) {
        self.mark_constraint_fully_satisfied(constraint)
    }
    fn is_fully_satisfied(&self, constraint: ConstraintId) -> bool {
        self.is_fully_satisfied(constraint)
    }
}

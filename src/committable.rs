//! `CommittableDatabase`: a buffered overlay over a [`VariableDatabase`],
//! used by [`crate::disjunction::DisjunctionConstraint`] so one side's inner
//! constraint can be propagated speculatively without touching the real
//! database until the sibling side is known to be unsatisfiable.
//!
//! Modified variables are recorded in an ordered list rather than applied in
//! place; reads search that list (most recent first) before falling back to
//! the parent database; `commit` applies every buffered modification to the
//! parent for real and clears the list.

use std::collections::HashMap;

use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, VarId};
use crate::store::{Narrowed, VarStore};
use crate::trail::DecisionLevel;

struct Modification {
    var: VarId,
    value: ValueSet,
}

/// One buffered `CommittableDatabase`, plus the extra state
/// `DisjunctionConstraint` needs to decide whether a side's watches should
/// still be installed against the dispatcher (watches always go straight to
/// the real [`WatchDispatcher`]; only domain narrowing is buffered).
pub struct CommittableDatabase<'p> {
    parent: &'p mut crate::database::VariableDatabase,
    modifications: Vec<Modification>,
    committed: bool,
}

impl<'p> CommittableDatabase<'p> {
    pub fn new(parent: &'p mut crate::database::VariableDatabase) -> Self {
        CommittableDatabase {
            parent,
            modifications: Vec::new(),
            committed: false,
        }
    }

    /// Rebuilds an overlay over `parent` starting from a prior overlay's
    /// saved state (`into_shadow`), rather than from scratch. Used by
    /// `DisjunctionConstraint`: a `CommittableDatabase` can't outlive the
    /// single mutable borrow of the real database it was built from, so
    /// each side's buffered narrowings are folded back into a plain
    /// `HashMap` between dispatch calls and re-seeded here on the next one.
    pub fn with_seed(parent: &'p mut crate::database::VariableDatabase, seed: HashMap<VarId, ValueSet>) -> Self {
        let modifications = seed.into_iter().map(|(var, value)| Modification { var, value }).collect();
        CommittableDatabase {
            parent,
            modifications,
            committed: false,
        }
    }

    /// Folds the buffered modifications into one value set per variable
    /// (the latest one), for `with_seed` to later restore. No-op (returns
    /// the empty map) once `commit` has run, since committed narrowings live
    /// in the parent database from then on.
    pub fn into_shadow(self) -> HashMap<VarId, ValueSet> {
        let mut shadow = HashMap::new();
        for m in self.modifications {
            shadow.insert(m.var, m.value);
        }
        shadow
    }

    /// The parent's current domain, narrowed further by this overlay's own
    /// buffered exclusion if it has one. Always reconciled against the
    /// parent rather than returning a buffered snapshot verbatim: the parent
    /// can narrow a variable for real (another side committing, a decision,
    /// backtracking then re-deciding) between this overlay's own calls, and
    /// domains only ever shrink, so the overlay's visible domain is always
    /// the *intersection* of "whatever this side has additionally excluded"
    /// with "whatever is currently true in the parent", never the buffered
    /// value alone.
    fn latest(&self, var: VarId) -> ValueSet {
        let base = VarStore::get_potential(self.parent, var);
        for m in self.modifications.iter().rev() {
            if m.var == var {
                return &base & &m.value;
            }
        }
        base
    }

    /// Applies every buffered modification to the parent for real. Each
    /// modification is applied as a fresh `narrow` against the parent's
    /// *current* domain (not the buffered snapshot), so modifications made
    /// to the parent by the sibling side between `initialize` and `commit`
    /// are respected rather than clobbered.
    pub fn commit(mut self, cause: Option<ConstraintId>) -> Result<(), Contradiction> {
        if self.committed {
            return Ok(());
        }
        self.committed = true;
        for m in self.modifications.drain(..) {
            self.parent.narrow(m.var, &m.value, cause)?;
        }
        Ok(())
    }

    /// True once `commit` has run; further narrows on this overlay apply
    /// directly to the parent instead of buffering.
    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl<'p> VarStore for CommittableDatabase<'p> {
    fn get_potential(&self, var: VarId) -> ValueSet {
        self.latest(var)
    }
    fn get_min(&self, var: VarId) -> Option<i32> {
        self.latest(var).first().map(|i| self.parent.value_at(var, i))
    }
    fn get_max(&self, var: VarId) -> Option<i32> {
        self.latest(var).last().map(|i| self.parent.value_at(var, i))
    }
    fn is_solved(&self, var: VarId) -> bool {
        self.latest(var).count() == 1
    }
    fn solved_value(&self, var: VarId) -> Option<i32> {
        let vs = self.latest(var);
        if vs.count() == 1 {
            vs.first().map(|i| self.parent.value_at(var, i))
        } else {
            None
        }
    }
    fn is_possible(&self, var: VarId, v: i32) -> bool {
        match self.parent.index_of(var, v) {
            Some(i) => self.latest(var).contains(i),
            None => false,
        }
    }
    fn any_possible(&self, var: VarId, subset: &ValueSet) -> bool {
        !self.latest(var).is_disjoint(subset)
    }
    fn domain_size(&self, var: VarId) -> usize {
        self.parent.domain_size(var)
    }
    fn value_at(&self, var: VarId, index: usize) -> i32 {
        self.parent.value_at(var, index)
    }
    fn index_of(&self, var: VarId, v: i32) -> Option<usize> {
        self.parent.index_of(var, v)
    }
    fn decision_level(&self) -> DecisionLevel {
        self.parent.decision_level()
    }
    fn level_of(&self, var: VarId) -> DecisionLevel {
        self.parent.level_of(var)
    }

    fn narrow(
        &mut self,
        var: VarId,
        subset: &ValueSet,
        cause: Option<ConstraintId>,
    ) -> Result<Narrowed, Contradiction> {
        if self.committed {
            return match self.parent.narrow(var, subset, cause)? {
                crate::database::NarrowOutcome::Unchanged => Ok(Narrowed::Unchanged),
                crate::database::NarrowOutcome::Changed { .. } => Ok(Narrowed::Changed),
            };
        }
        let current = self.latest(var);
        // `latest` reconciles with the parent on every call, so a variable
        // can arrive here already empty (the parent narrowed past what this
        // side's buffered exclusion still allows) without any single
        // `narrow` call having produced that emptiness itself.
        if current.is_empty() {
            return Err(Contradiction::new(var));
        }
        let next = &current & subset;
        if next == current {
            return Ok(Narrowed::Unchanged);
        }
        if next.is_empty() {
            return Err(Contradiction::new(var));
        }
        self.modifications.push(Modification { var, value: next });
        Ok(Narrowed::Changed)
    }

    fn exclude_value(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<Narrowed, Contradiction> {
        let size = self.domain_size(var);
        match self.index_of(var, v) {
            Some(i) => {
                let mut keep = ValueSet::full(size);
                keep.remove(i);
                self.narrow(var, &keep, cause)
            }
            None => Ok(Narrowed::Unchanged),
        }
    }

    fn exclude_less_than(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<Narrowed, Contradiction> {
        let size = self.domain_size(var);
        let mut keep = ValueSet::empty(size);
        for i in 0..size {
            if self.parent.value_at(var, i) >= v {
                keep.insert(i);
            }
        }
        self.narrow(var, &keep, cause)
    }

    fn exclude_greater_than(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<Narrowed, Contradiction> {
        let size = self.domain_size(var);
        let mut keep = ValueSet::empty(size);
        for i in 0..size {
            if self.parent.value_at(var, i) <= v {
                keep.insert(i);
            }
        }
        self.narrow(var, &keep, cause)
    }

    fn mark_constraint_fully_satisfied(&mut self, constraint: ConstraintId) {
        self.parent.mark_constraint_fully_satisfied(constraint);
    }
    fn is_fully_satisfied(&self, constraint: ConstraintId) -> bool {
        self.parent.is_fully_satisfied(constraint)
    }
}

//! `VarStore`: the subset of [`crate::database::VariableDatabase`]'s read/
//! narrow API that a [`crate::constraint::Constraint`] needs, pulled out as a
//! trait so the same constraint code can run against either the real
//! database or a [`crate::committable::CommittableDatabase`] overlay.
//!
//! Historical trail queries (`value_before`/`mod_time_before`) stay on the
//! concrete [`crate::database::VariableDatabase`] only: conflict analysis
//! always runs against the solver's single real trail, never a
//! `Disjunction`'s buffered overlay, so they don't need to be part of this
//! trait.

use crate::domain::ValueSet;
use crate::error::Contradiction;
use crate::ids::{ConstraintId, VarId};
use crate::trail::DecisionLevel;

/// Mirrors [`crate::database::NarrowOutcome`]; duplicated here (rather than
/// reused) because trait methods can't return the concrete enum's private
/// variants across both implementors without exposing it, and both
/// implementors already produce the same shape.
pub enum Narrowed {
    Unchanged,
    Changed,
}

pub trait VarStore {
    fn get_potential(&self, var: VarId) -> ValueSet;
    fn get_min(&self, var: VarId) -> Option<i32>;
    fn get_max(&self, var: VarId) -> Option<i32>;
    fn is_solved(&self, var: VarId) -> bool;
    fn solved_value(&self, var: VarId) -> Option<i32>;
    fn is_possible(&self, var: VarId, v: i32) -> bool;
    fn any_possible(&self, var: VarId, subset: &ValueSet) -> bool;
    fn domain_size(&self, var: VarId) -> usize;
    fn value_at(&self, var: VarId, index: usize) -> i32;
    fn index_of(&self, var: VarId, v: i32) -> Option<usize>;
    fn decision_level(&self) -> DecisionLevel;
    fn level_of(&self, var: VarId) -> DecisionLevel;

    fn narrow(
        &mut self,
        var: VarId,
        subset: &ValueSet,
        cause: Option<ConstraintId>,
    ) -> Result<Narrowed, Contradiction>;

    fn exclude(
        &mut self,
        var: VarId,
        subset: &ValueSet,
        cause: Option<ConstraintId>,
    ) -> Result<Narrowed, Contradiction> {
        self.narrow(var, &subset.complement(), cause)
    }

    fn exclude_value(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<Narrowed, Contradiction>;

    fn exclude_less_than(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<Narrowed, Contradiction>;

    fn exclude_greater_than(
        &mut self,
        var: VarId,
        v: i32,
        cause: Option<ConstraintId>,
    ) -> Result<Narrowed, Contradiction>;

    fn mark_constraint_fully_satisfied(&mut self, constraint: ConstraintId);
    fn is_fully_satisfied(&self, constraint: ConstraintId) -> bool;
}

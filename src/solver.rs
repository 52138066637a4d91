//! The `Solver` driver and the `VariableFactory`/`ConstraintFactory`/
//! `Solver` external surface.
//!
//! A propagate/decide/analyze-and-backjump loop with a Luby restart schedule
//! and periodic learned-clause reduction, generalized from boolean `Lit`/
//! `Var` to this crate's `VarId`/`Literal`/`ConstraintId`, and widened from
//! one constraint kind (clauses) to the full `ConstraintKind` dispatch enum
//! below: a tagged variant rather than `Box<dyn Constraint<_>>`, since every
//! concrete constraint already implements `Constraint<D>` generically.
//!
//! Narrowing dispatch is driven by watching the trail grow rather than
//! threading callbacks through every `VarStore::narrow` call site: any
//! constraint's `on_variable_narrowed`/`propagate` may call `db.narrow` on
//! some other variable, and that narrowing's own trail entry is just as real
//! as one produced by a top-level decision, so draining the trail in order
//! (`dispatched_len` tracks how much of it has already had its watches
//! fired) dispatches cascaded narrowings in the order they actually happened,
//! without the solver needing to know which constraint produced which
//! entry.

use std::collections::HashMap;

use log::{debug, info, trace, warn};

use crate::all_different::{AllDifferentConstraint, Consistency};
use crate::budget::{Budget, InterruptHandle};
use crate::cardinality::CardinalityConstraint;
use crate::clause::ClauseConstraint;
use crate::conflict::{Conflict, ConflictAnalyzer};
use crate::config::SolverConfig;
use crate::constraint::{Constraint, ExplainContext};
use crate::database::VariableDatabase;
use crate::disjunction::{DisjunctionConstraint, InnerConstraint};
use crate::domain::ValueSet;
use crate::error::{Contradiction, ModelError, SolveOutcome};
use crate::heuristic::DecisionHeuristic;
use crate::iff::IffConstraint;
use crate::ids::{ConstraintId, Idx, IdxVec, VarId};
use crate::inequality::{CompareOp, InequalityConstraint};
use crate::literal::Literal;
use crate::queue::PropagationQueue;
use crate::stats::Statistics;
use crate::store::VarStore;
use crate::sum::SumConstraint;
use crate::table::TableConstraint;
use crate::trail::{DecisionLevel, GROUND_LEVEL};
use crate::watch::WatchDispatcher;

/// Every built-in constraint kind the `ConstraintFactory` surface can
/// install. A flat enum rather than `Box<dyn Constraint<_>>`: every concrete
/// constraint already implements `Constraint<D>` generically, so hand
/// dispatch here is both cheap and the same shape `disjunction.rs`'s
/// `InnerConstraint` already uses one level down.
enum ConstraintKind {
    Clause(ClauseConstraint),
    AllDifferent(AllDifferentConstraint),
    Cardinality(CardinalityConstraint),
    Inequality(InequalityConstraint),
    Sum(SumConstraint),
    Table(TableConstraint),
    Iff(IffConstraint),
    Disjunction(DisjunctionConstraint),
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            ConstraintKind::Clause($c) => $body,
            ConstraintKind::AllDifferent($c) => $body,
            ConstraintKind::Cardinality($c) => $body,
            ConstraintKind::Inequality($c) => $body,
            ConstraintKind::Sum($c) => $body,
            ConstraintKind::Table($c) => $body,
            ConstraintKind::Iff($c) => $body,
            ConstraintKind::Disjunction($c) => $body,
        }
    };
}

impl ConstraintKind {
    fn initialize(
        &mut self,
        id: ConstraintId,
        db: &mut VariableDatabase,
        watches: &mut WatchDispatcher,
    ) -> Result<(), Contradiction> {
        dispatch!(self, c => Constraint::<VariableDatabase>::initialize(c, id, db, watches))
    }

    fn on_variable_narrowed(
        &mut self,
        id: ConstraintId,
        db: &mut VariableDatabase,
        watches: &mut WatchDispatcher,
        queue: &mut PropagationQueue,
        var: VarId,
        previous: &ValueSet,
    ) -> Result<(), Contradiction> {
        dispatch!(self, c => Constraint::<VariableDatabase>::on_variable_narrowed(c, id, db, watches, queue, var, previous))
    }

    fn propagate(
        &mut self,
        id: ConstraintId,
        db: &mut VariableDatabase,
        watches: &mut WatchDispatcher,
        queue: &mut PropagationQueue,
    ) -> Result<(), Contradiction> {
        dispatch!(self, c => Constraint::<VariableDatabase>::propagate(c, id, db, watches, queue))
    }

    fn explain(&self, db: &VariableDatabase, ctx: ExplainContext) -> Vec<Literal> {
        dispatch!(self, c => Constraint::<VariableDatabase>::explain(c, db, ctx))
    }

    fn is_backtracking(&self) -> bool {
        dispatch!(self, c => Constraint::<VariableDatabase>::is_backtracking(c))
    }

    fn on_backtrack(&mut self, db: &mut VariableDatabase, level: DecisionLevel) {
        dispatch!(self, c => Constraint::<VariableDatabase>::on_backtrack(c, db, level))
    }

    fn as_clause_mut(&mut self) -> Option<&mut ClauseConstraint> {
        match self {
            ConstraintKind::Clause(c) => Some(c),
            _ => None,
        }
    }
}

/// The finite-domain CDCL constraint solver.
///
/// Owns every variable, constraint, and piece of search state: a
/// `VariableDatabase`, a `WatchDispatcher`, a `PropagationQueue`, a
/// constraint arena, a `DecisionHeuristic`, a `ConflictAnalyzer`, a
/// `Budget`, and `Statistics`, all driven by one `solve` loop.
pub struct Solver {
    db: VariableDatabase,
    watches: WatchDispatcher,
    queue: PropagationQueue,
    constraints: IdxVec<ConstraintId, ConstraintKind>,
    heuristic: DecisionHeuristic,
    analyzer: ConflictAnalyzer,
    budget: Budget,
    config: SolverConfig,
    stats: Statistics,
    /// How far into `db.trail()` watch dispatch has already drained; see
    /// the module doc comment.
    dispatched_len: usize,
    clause_inc: f64,
    conflicts_since_restart: u64,
    /// Set if installing a constraint before `solve()` ever starts already
    /// produced a `Contradiction`: a ground-level conflict discovered during
    /// model construction is unsatisfiable the same way one discovered
    /// during search is.
    forced_unsat: bool,
}

impl Solver {
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Solver {
            db: VariableDatabase::new(),
            watches: WatchDispatcher::new(),
            queue: PropagationQueue::new(),
            constraints: IdxVec::new(),
            heuristic: DecisionHeuristic::new(config.learning.var_decay, 0.02, 1),
            analyzer: ConflictAnalyzer::new(),
            budget: Budget::new(),
            config,
            stats: Statistics::new(),
            dispatched_len: 0,
            clause_inc: 1.0,
            conflicts_since_restart: 0,
            forced_unsat: false,
        }
    }

    // -- VariableFactory --------------------------------------------------

    pub fn new_variable(&mut self, name: impl Into<String>, domain: Vec<i32>) -> Result<VarId, ModelError> {
        if domain.is_empty() {
            return Err(ModelError::EmptyDomain(self.db.next_var_id()));
        }
        let id = self.db.new_variable(name, domain);
        self.heuristic.init_var(id);
        Ok(id)
    }

    fn check_var(&self, v: VarId) -> Result<(), ModelError> {
        if !v.is_valid() || v.idx() >= self.db.next_var_id().idx() {
            Err(ModelError::UnknownVariable(v))
        } else {
            Ok(())
        }
    }

    // -- ConstraintFactory -------------------------------------------------

    pub fn add_clause(&mut self, literals: Vec<Literal>) -> Result<ConstraintId, ModelError> {
        let mut seen = std::collections::HashSet::new();
        for lit in &literals {
            self.check_var(lit.var)?;
            if !seen.insert(lit.var) {
                return Err(ModelError::DuplicateClauseVariable(lit.var));
            }
        }
        Ok(self.install(ConstraintKind::Clause(ClauseConstraint::new(literals))))
    }

    pub fn add_all_different(
        &mut self,
        vars: Vec<VarId>,
        consistency: Consistency,
    ) -> Result<ConstraintId, ModelError> {
        for &v in &vars {
            self.check_var(v)?;
        }
        Ok(self.install(ConstraintKind::AllDifferent(AllDifferentConstraint::new(vars, consistency))))
    }

    pub fn add_cardinality(
        &mut self,
        vars: Vec<VarId>,
        mins: HashMap<i32, usize>,
        maxs: HashMap<i32, usize>,
    ) -> Result<ConstraintId, ModelError> {
        for &v in &vars {
            self.check_var(v)?;
        }
        if mins.is_empty() && maxs.is_empty() {
            warn!("cardinality constraint has no value bounds; it is trivially satisfied");
        }
        Ok(self.install(ConstraintKind::Cardinality(CardinalityConstraint::new(vars, mins, maxs))))
    }

    pub fn add_inequality(&mut self, a: VarId, b: VarId, op: CompareOp) -> Result<ConstraintId, ModelError> {
        self.check_var(a)?;
        self.check_var(b)?;
        Ok(self.install(ConstraintKind::Inequality(InequalityConstraint::new(a, b, op))))
    }

    pub fn add_sum(
        &mut self,
        vars: Vec<VarId>,
        coeffs: Vec<i64>,
        op: CompareOp,
        k: i64,
    ) -> Result<ConstraintId, ModelError> {
        if vars.len() != coeffs.len() {
            return Err(ModelError::ParameterOutOfBounds(
                "sum: vars and coeffs must have the same length".into(),
            ));
        }
        for &v in &vars {
            self.check_var(v)?;
        }
        Ok(self.install(ConstraintKind::Sum(SumConstraint::new(vars, coeffs, op, k))))
    }

    pub fn add_table(&mut self, vars: Vec<VarId>, rows: Vec<Vec<i32>>) -> Result<ConstraintId, ModelError> {
        for &v in &vars {
            self.check_var(v)?;
        }
        for row in &rows {
            if row.len() != vars.len() {
                return Err(ModelError::ParameterOutOfBounds(
                    "table: every row must have vars.len() entries".into(),
                ));
            }
        }
        Ok(self.install(ConstraintKind::Table(TableConstraint::new(vars, rows))))
    }

    pub fn add_iff(&mut self, head: Literal, body: Vec<Literal>) -> Result<ConstraintId, ModelError> {
        self.check_var(head.var)?;
        for lit in &body {
            self.check_var(lit.var)?;
        }
        Ok(self.install(ConstraintKind::Iff(IffConstraint::new(head, body))))
    }

    pub fn add_disjunction(&mut self, a: InnerConstraint, b: InnerConstraint) -> Result<ConstraintId, ModelError> {
        for v in a.vars().into_iter().chain(b.vars()) {
            self.check_var(v)?;
        }
        Ok(self.install(ConstraintKind::Disjunction(DisjunctionConstraint::new(a, b))))
    }

    fn install(&mut self, mut kind: ConstraintKind) -> ConstraintId {
        let id = self.constraints.next_id();
        if let Err(_) = kind.initialize(id, &mut self.db, &mut self.watches) {
            self.forced_unsat = true;
        }
        self.constraints.push(kind);
        self.dispatched_len = self.db.trail().len();
        id
    }

    // -- Solver --------------------------------------------------------

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.budget.interrupt_handle()
    }

    pub fn set_conflict_budget(&mut self, limit: Option<u64>) {
        self.budget.set_conflict_budget(limit);
    }

    pub fn set_propagation_budget(&mut self, limit: Option<u64>) {
        self.budget.set_propagation_budget(limit);
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Defined only after `solve` has returned `Solved`.
    pub fn value(&self, var: VarId) -> i32 {
        self.db
            .solved_value(var)
            .expect("value() called on a variable that is not yet solved")
    }

    /// Runs the solver's propagate/decide/analyze-and-backjump loop until
    /// the problem is solved, proven unsatisfiable, or interrupted. `seed`
    /// deterministically reseeds every tie-break; omitting it keeps whatever
    /// the last `solve` call (or construction) left behind.
    pub fn solve(&mut self, seed: Option<u64>) -> SolveOutcome {
        let outcome = self.solve_inner(seed);
        // Sampled once per call, after search ends, rather than on every
        // iteration.
        self.stats.peak_mem_mb = crate::util::mem_used_peak().map(|kb| kb as f64 / 1024.0);
        outcome
    }

    fn solve_inner(&mut self, seed: Option<u64>) -> SolveOutcome {
        if let Some(s) = seed {
            self.heuristic.reseed(s);
        }
        if self.forced_unsat {
            return SolveOutcome::Unsatisfiable;
        }

        loop {
            if self.budget.interrupted() {
                self.unwind_to_ground();
                return SolveOutcome::Interrupted;
            }

            match self.propagate_to_fixpoint() {
                Ok(()) => {}
                Err((cid, contradiction)) => match self.handle_conflict(cid, contradiction) {
                    Some(outcome) => return outcome,
                    None => continue,
                },
            }

            if self.db.all_solved() {
                return SolveOutcome::Solved;
            }

            if !self.budget.within(self.stats.conflicts, self.stats.propagations) {
                self.unwind_to_ground();
                return SolveOutcome::Interrupted;
            }

            match self.heuristic.pick_decision(&self.db) {
                None => return SolveOutcome::Solved,
                Some((var, value)) => self.decide(var, value),
            }
        }
    }

    fn unwind_to_ground(&mut self) {
        if self.db.decision_level() != GROUND_LEVEL {
            self.backtrack_to(GROUND_LEVEL);
        }
    }

    fn decide(&mut self, var: VarId, value: i32) {
        self.stats.decisions += 1;
        debug!("decide var={:?} value={}", var, value);
        self.db.new_decision_level();
        let idx = self
            .db
            .index_of(var, value)
            .expect("decision value must belong to the variable's domain");
        let singleton = ValueSet::singleton(self.db.domain_size(var), idx);
        self.db
            .narrow(var, &singleton, None)
            .expect("a decision value currently in the domain cannot contradict itself");
        self.dispatched_len = self.dispatched_len.min(self.db.trail().len());
    }

    /// Drains every not-yet-dispatched trail entry (whether produced by a
    /// decision or by some other constraint's own `narrow` call), firing
    /// watches for each in trail order, then drains the `PropagationQueue`,
    /// repeating until both are empty.
    fn propagate_to_fixpoint(&mut self) -> Result<(), (ConstraintId, Contradiction)> {
        loop {
            self.drain_trail_dispatch()?;
            match self.queue.pop() {
                Some(cid) => self.run_propagate(cid)?,
                None => return Ok(()),
            }
        }
    }

    fn drain_trail_dispatch(&mut self) -> Result<(), (ConstraintId, Contradiction)> {
        loop {
            let total = self.db.trail().len();
            if self.dispatched_len >= total {
                return Ok(());
            }
            let (var, previous, cause) = {
                let entry = self.db.trail().entry_at(self.dispatched_len);
                (entry.var, entry.previous.clone(), entry.cause)
            };
            self.dispatched_len += 1;
            self.stats.propagations += 1;

            if let Some(cid) = cause {
                if let Some(clause) = self.constraints[cid].as_clause_mut() {
                    clause.lock();
                }
            }

            let current = self.db.get_potential(var).clone();
            let fired = self.watches.begin_dispatch(var, &previous, &current);
            self.db.begin_dispatching(var);

            let Solver {
                db,
                watches,
                queue,
                constraints,
                ..
            } = self;
            let mut result = Ok(());
            for cid in fired {
                trace!("dispatch constraint={:?} var={:?}", cid, var);
                if let Err(e) = constraints[cid].on_variable_narrowed(cid, db, watches, queue, var, &previous) {
                    result = Err((cid, e));
                    break;
                }
            }
            self.db.end_dispatching(var);
            self.watches.end_dispatch();
            result?;
        }
    }

    fn run_propagate(&mut self, cid: ConstraintId) -> Result<(), (ConstraintId, Contradiction)> {
        let Solver {
            db,
            watches,
            queue,
            constraints,
            ..
        } = self;
        constraints[cid]
            .propagate(cid, db, watches, queue)
            .map_err(|e| (cid, e))
    }

    /// Returns `Some(outcome)` if the solve call must end now (unsatisfiable
    /// or interrupted by budget), `None` to keep looping after a successful
    /// backjump.
    fn handle_conflict(&mut self, cid: ConstraintId, contradiction: Contradiction) -> Option<SolveOutcome> {
        self.stats.conflicts += 1;
        self.conflicts_since_restart += 1;
        self.heuristic.decay();
        self.clause_inc /= self.config.learning.clause_decay;

        let Solver {
            db,
            constraints,
            analyzer,
            heuristic,
            ..
        } = self;
        let clause_inc = self.clause_inc;
        let outcome = analyzer.analyze(
            db,
            cid,
            contradiction.var,
            |c, ctx| {
                let literals = constraints[c].explain(db, ctx);
                if let Some(clause) = constraints[c].as_clause_mut() {
                    clause.bump_activity(clause_inc);
                    clause.recompute_lbd(db);
                }
                literals
            },
            |v| heuristic.bump_var(v),
        );

        match outcome {
            Conflict::Ground => Some(SolveOutcome::Unsatisfiable),
            Conflict::Unit(literal) => {
                debug!("learned unit clause var={:?}", literal.var);
                let mut clause = ClauseConstraint::learned(vec![literal]);
                // A one-literal clause spans exactly one decision level
                // (ground, once asserted), so its LBD is always 1; set it
                // explicitly rather than leaving `ExtendedInfo::new_learned`'s
                // placeholder `u32::MAX` (`recompute_lbd` itself would read
                // this from a trail that, post-backtrack, no longer has the
                // conflict's levels on it).
                if let Some(ext) = clause.ext.as_mut() {
                    ext.lbd = 1;
                }
                self.backtrack_to(GROUND_LEVEL);
                self.install(ConstraintKind::Clause(clause));
                self.stats.learned_clauses += 1;
                self.maybe_restart_and_reduce();
                None
            }
            Conflict::Learned { backtrack_level, literals } => {
                let mut clause = ClauseConstraint::learned(literals);
                clause.recompute_lbd(&self.db);
                debug!(
                    "learned clause size={} lbd={:?} backtrack_level={}",
                    clause.literals().len(),
                    clause.ext.as_ref().map(|e| e.lbd),
                    backtrack_level.0
                );
                self.backtrack_to(backtrack_level);
                self.install(ConstraintKind::Clause(clause));
                self.stats.learned_clauses += 1;
                self.maybe_restart_and_reduce();
                None
            }
        }
    }

    fn maybe_restart_and_reduce(&mut self) {
        if self.conflicts_since_restart >= self.config.restart.conflicts_to_go(self.stats.restarts as u32) {
            self.conflicts_since_restart = 0;
            self.stats.restarts += 1;
            info!(
                "restart #{} after {} conflicts total",
                self.stats.restarts, self.stats.conflicts
            );
            self.backtrack_to(GROUND_LEVEL);
            self.reduce_learned_clauses();
        }
    }

    /// Tears down the watches of low-value learned clauses: never
    /// permanent, never locked, and either above the LBD keep threshold or
    /// below the activity floor. Tombstoned in place rather than physically
    /// removed from the arena, since trail entries reference constraints by
    /// id and must survive arena compaction.
    fn reduce_learned_clauses(&mut self) {
        let threshold = self.config.learning.lbd_keep_threshold;
        let mut candidates: Vec<(ConstraintId, f64)> = Vec::new();
        for i in 1..=self.constraints.len() {
            let id = ConstraintId::unidx(i);
            if let Some(clause) = self.constraints[id].as_clause_mut() {
                if clause.is_deletable(threshold, 0.0) {
                    let activity = clause.ext.as_ref().map(|e| e.activity).unwrap_or(0.0);
                    candidates.push((id, activity));
                }
            }
        }
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let cut = (candidates.len() as f64 * self.config.learning.reduce_fraction) as usize;
        for &(id, _) in candidates.iter().take(cut) {
            if let Some(clause) = self.constraints[id].as_clause_mut() {
                clause.teardown_watches(&mut self.watches);
            }
        }
    }

    fn backtrack_to(&mut self, level: DecisionLevel) {
        debug!("backtrack_to level={}", level.0);
        let Solver { db, constraints, .. } = self;
        db.backtrack_to(level, |entry| {
            if let Some(cid) = entry.cause {
                if let Some(clause) = constraints[cid].as_clause_mut() {
                    clause.unlock();
                }
            }
        });
        self.dispatched_len = self.db.trail().len();
        for kind in self.constraints.iter_mut() {
            if kind.is_backtracking() {
                kind.on_backtrack(&mut self.db, level);
            }
        }
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

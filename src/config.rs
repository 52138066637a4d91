//! `SolverConfig`: every restart/learning/matching tunable the solver and
//! its constraints consult, gathered into one `Default`-implementing
//! struct rather than scattered constants.

/// Restart schedule knobs.
#[derive(Clone, Copy, Debug)]
pub struct RestartConfig {
    pub luby_restart: bool,
    pub restart_first: u64,
    pub restart_inc: f64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        RestartConfig {
            luby_restart: true,
            restart_first: 100,
            restart_inc: 2.0,
        }
    }
}

impl RestartConfig {
    /// How many conflicts the next run gets before the solver restarts,
    /// given how many restarts have already happened.
    pub fn conflicts_to_go(&self, restarts: u32) -> u64 {
        let rest_base = if self.luby_restart {
            luby(self.restart_inc, restarts)
        } else {
            self.restart_inc.powi(restarts as i32)
        };
        (rest_base * self.restart_first as f64) as u64
    }
}

fn luby(y: f64, mut x: u32) -> f64 {
    let mut size = 1;
    let mut seq = 0;
    while size < x + 1 {
        seq += 1;
        size = 2 * size + 1;
    }
    while size - 1 != x {
        size = (size - 1) >> 1;
        seq -= 1;
        x %= size;
    }
    y.powi(seq)
}

/// Learned-clause size/retention knobs: activity decay plus an LBD cutoff
/// (glucose-style) for clause deletion.
#[derive(Clone, Copy, Debug)]
pub struct LearningConfig {
    pub clause_decay: f64,
    pub var_decay: f64,
    /// Learned clauses with LBD above this are eligible for deletion once
    /// unlocked; clauses with LBD `<= lbd_keep_threshold` are kept
    /// regardless of activity.
    pub lbd_keep_threshold: u32,
    /// Fraction of learned clauses considered for deletion on each
    /// reduction pass.
    pub reduce_fraction: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            clause_decay: 0.999,
            var_decay: 0.95,
            lbd_keep_threshold: 2,
            reduce_fraction: 0.5,
        }
    }
}

/// Gathers every configuration knob the solver driver and its constraints
/// consult. `Solver::new` uses `SolverConfig::default()`; `Solver::with_config`
/// takes an explicit one.
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    pub restart: RestartConfig,
    pub learning: LearningConfig,
    /// Whether matching-based propagators (`Cardinality`'s UBC) recompute
    /// incrementally rather than from scratch on every propagation.
    pub incremental_matching: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            restart: RestartConfig::default(),
            learning: LearningConfig::default(),
            incremental_matching: true,
        }
    }
}

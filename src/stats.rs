//! `Statistics`: the counters a caller can read back after (or during) a
//! solve — decisions, propagations, conflicts, learned clauses, restarts.

#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
    pub decisions: u64,
    pub propagations: u64,
    pub conflicts: u64,
    pub learned_clauses: u64,
    pub restarts: u64,
    pub peak_mem_mb: Option<f64>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }
}

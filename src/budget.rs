//! Resource limits and asynchronous interrupt: a conflict/propagation
//! ceiling plus an `AtomicBool` a caller can flip from outside the solving
//! thread to ask a running search to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Budget {
    conflict_budget: i64,
    propagation_budget: i64,
    asynch_interrupt: Arc<AtomicBool>,
}

impl Budget {
    pub fn new() -> Budget {
        Budget {
            conflict_budget: -1,
            propagation_budget: -1,
            asynch_interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_conflict_budget(&mut self, limit: Option<u64>) {
        self.conflict_budget = limit.map(|l| l as i64).unwrap_or(-1);
    }

    pub fn set_propagation_budget(&mut self, limit: Option<u64>) {
        self.propagation_budget = limit.map(|l| l as i64).unwrap_or(-1);
    }

    pub fn within(&self, conflicts: u64, propagations: u64) -> bool {
        !self.interrupted()
            && (self.conflict_budget < 0 || conflicts < self.conflict_budget as u64)
            && (self.propagation_budget < 0 || propagations < self.propagation_budget as u64)
    }

    pub fn interrupted(&self) -> bool {
        self.asynch_interrupt.load(Ordering::Relaxed)
    }

    pub fn off(&mut self) {
        self.conflict_budget = -1;
        self.propagation_budget = -1;
    }

    /// A cloneable handle a caller can hold onto before `solve()` starts (it
    /// borrows the solver mutably) and flip from another thread to ask the
    /// search to stop at its next safe point.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            flag: self.asynch_interrupt.clone(),
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

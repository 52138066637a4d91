//! Watch registration and dispatch.
//!
//! Per-variable watcher lists with deferred removal (a pending-delete sweep
//! runs once the outer dispatch returns) so a sink can request its own watch
//! be dropped mid-dispatch without invalidating the iteration in progress.
//! Resolving a fired watch to the actual `Constraint` object happens outside
//! this module (in `solver.rs`) — `WatchDispatcher` itself only ever stores
//! opaque `ConstraintId`s.

use crate::domain::{DomainDelta, ValueSet};
use crate::ids::{ConstraintId, IdxMap, VarId};

/// Trigger conditions a watch can be registered against.
#[derive(Clone, Debug)]
pub enum TriggerSpec {
    AnyChange,
    LowerBoundRaised,
    UpperBoundLowered,
    BecameSingleton,
    ValueSetDisjointFrom(ValueSet),
}

impl TriggerSpec {
    fn matches_segment(&self, delta: &DomainDelta) -> bool {
        match self {
            TriggerSpec::AnyChange => delta.changed,
            TriggerSpec::LowerBoundRaised => delta.lower_raised,
            TriggerSpec::UpperBoundLowered => delta.upper_lowered,
            TriggerSpec::BecameSingleton => delta.became_singleton,
            TriggerSpec::ValueSetDisjointFrom(_) => false,
        }
    }
}

/// A stable handle returned from registration; stable for the life of the
/// watch.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WatchHandle(u32);

struct Watcher {
    handle: WatchHandle,
    constraint: ConstraintId,
}

struct DisjointWatcher {
    handle: WatchHandle,
    constraint: ConstraintId,
    set: ValueSet,
}

#[derive(Default)]
struct VarWatches {
    any_change: Vec<Watcher>,
    became_singleton: Vec<Watcher>,
    lower_raised: Vec<Watcher>,
    upper_lowered: Vec<Watcher>,
    disjoint_from: Vec<DisjointWatcher>,
}

enum PendingAdd {
    Segment(VarId, WatchHandle, ConstraintId, TriggerSpec),
}

/// Per-variable watch storage, segmented by trigger type in dispatch order:
/// `AnyChange, BecameSingleton, LowerBoundRaised, UpperBoundLowered`, then
/// `ValueSetDisjointFrom`.
pub struct WatchDispatcher {
    vars: IdxMap<VarId, VarWatches>,
    next_handle: u32,
    in_dispatch: bool,
    pending_removes: Vec<WatchHandle>,
    pending_adds: Vec<PendingAdd>,
}

impl WatchDispatcher {
    pub fn new() -> Self {
        WatchDispatcher {
            vars: IdxMap::new(),
            next_handle: 1,
            in_dispatch: false,
            pending_removes: Vec::new(),
            pending_adds: Vec::new(),
        }
    }

    fn fresh_handle(&mut self) -> WatchHandle {
        let h = WatchHandle(self.next_handle);
        self.next_handle += 1;
        h
    }

    pub fn register(&mut self, var: VarId, constraint: ConstraintId, trigger: TriggerSpec) -> WatchHandle {
        let handle = self.fresh_handle();
        if self.in_dispatch {
            self.pending_adds
                .push(PendingAdd::Segment(var, handle, constraint, trigger));
        } else {
            self.install(var, handle, constraint, trigger);
        }
        handle
    }

    fn install(&mut self, var: VarId, handle: WatchHandle, constraint: ConstraintId, trigger: TriggerSpec) {
        if self.vars.get(var).is_none() {
            self.vars.insert(var, VarWatches::default());
        }
        let bucket = self.vars.get_mut(var).expect("just inserted");
        match trigger {
            TriggerSpec::AnyChange => bucket.any_change.push(Watcher { handle, constraint }),
            TriggerSpec::BecameSingleton => bucket.became_singleton.push(Watcher { handle, constraint }),
            TriggerSpec::LowerBoundRaised => bucket.lower_raised.push(Watcher { handle, constraint }),
            TriggerSpec::UpperBoundLowered => bucket.upper_lowered.push(Watcher { handle, constraint }),
            TriggerSpec::ValueSetDisjointFrom(set) => bucket.disjoint_from.push(DisjointWatcher {
                handle,
                constraint,
                set,
            }),
        }
    }

    /// Requests that `handle` be dropped. If called mid-dispatch the removal
    /// is deferred to the sweep that runs once the outer dispatch returns.
    pub fn request_remove(&mut self, handle: WatchHandle) {
        if self.in_dispatch {
            self.pending_removes.push(handle);
        } else {
            self.sweep_one(handle);
        }
    }

    fn sweep_one(&mut self, handle: WatchHandle) {
        for bucket in self.vars_iter_mut() {
            bucket.any_change.retain(|w| w.handle != handle);
            bucket.became_singleton.retain(|w| w.handle != handle);
            bucket.lower_raised.retain(|w| w.handle != handle);
            bucket.upper_lowered.retain(|w| w.handle != handle);
            bucket.disjoint_from.retain(|w| w.handle != handle);
        }
    }

    fn vars_iter_mut(&mut self) -> impl Iterator<Item = &mut VarWatches> {
        self.vars.values_mut()
    }

    /// Computes which constraints must be notified for a narrowing of `var`
    /// from `previous` to `current`: segment order `AnyChange,
    /// BecameSingleton, LowerBoundRaised, UpperBoundLowered`, sinks within a
    /// segment in *reverse insertion order*, followed by any
    /// `ValueSetDisjointFrom` watches whose set is now disjoint from
    /// `current`.
    ///
    /// Must be paired with [`WatchDispatcher::end_dispatch`] once every
    /// constraint in the returned list has been notified.
    pub fn begin_dispatch(&mut self, var: VarId, previous: &ValueSet, current: &ValueSet) -> Vec<ConstraintId> {
        self.in_dispatch = true;
        let delta = ValueSet::delta(previous, current);
        let mut fired = Vec::new();
        if let Some(bucket) = self.vars.get(var) {
            if TriggerSpec::AnyChange.matches_segment(&delta) {
                fired.extend(bucket.any_change.iter().rev().map(|w| w.constraint));
            }
            if TriggerSpec::BecameSingleton.matches_segment(&delta) {
                fired.extend(bucket.became_singleton.iter().rev().map(|w| w.constraint));
            }
            if TriggerSpec::LowerBoundRaised.matches_segment(&delta) {
                fired.extend(bucket.lower_raised.iter().rev().map(|w| w.constraint));
            }
            if TriggerSpec::UpperBoundLowered.matches_segment(&delta) {
                fired.extend(bucket.upper_lowered.iter().rev().map(|w| w.constraint));
            }
            for w in bucket.disjoint_from.iter().rev() {
                if current.is_disjoint(&w.set) {
                    fired.push(w.constraint);
                }
            }
        }
        fired
    }

    /// Applies the deferred removal/addition sweep: removals are deferred,
    /// and this pending-delete sweep runs after the outer dispatch
    /// returns.
    pub fn end_dispatch(&mut self) {
        self.in_dispatch = false;
        let removes = std::mem::take(&mut self.pending_removes);
        for h in removes {
            self.sweep_one(h);
        }
        let adds = std::mem::take(&mut self.pending_adds);
        for add in adds {
            let PendingAdd::Segment(var, handle, constraint, trigger) = add;
            self.install(var, handle, constraint, trigger);
        }
    }
}

impl Default for WatchDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

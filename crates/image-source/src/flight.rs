//! Per-key request coalescing
//!
//! The first caller for a key becomes the leader and runs the work; callers
//! that arrive while it is running join the in-flight slot and receive a
//! clone of the leader's value. Slots are created per key on demand, so
//! unrelated keys never wait on each other.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

enum SlotState<V> {
    Pending,
    Done(V),
    /// The leader unwound without producing a value
    Abandoned,
}

struct Slot<V> {
    state: Mutex<SlotState<V>>,
    ready: Condvar,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            ready: Condvar::new(),
        }
    }

    fn finish(&self, state: SlotState<V>) {
        *self.state.lock() = state;
        self.ready.notify_all();
    }
}

/// How a caller's value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flight {
    /// This caller ran the work
    Led,
    /// This caller waited on another caller's work
    Joined,
}

/// Table of in-flight work keyed by `K`
pub struct SingleFlight<K, V> {
    slots: Mutex<HashMap<K, Arc<Slot<V>>>>,
}

impl<K: Clone + Hash + Eq, V: Clone> SingleFlight<K, V> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` for `key` unless it is already running, in which case wait for it
    ///
    /// If the leader panics, joined callers fall back to running their own `work`.
    pub fn run<F>(&self, key: &K, work: F) -> (V, Flight)
    where
        F: FnOnce() -> V,
    {
        let (slot, leader) = {
            let mut slots = self.slots.lock();
            match slots.get(key) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot = Arc::new(Slot::new());
                    slots.insert(key.clone(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if !leader {
            let mut state = slot.state.lock();
            while matches!(*state, SlotState::Pending) {
                slot.ready.wait(&mut state);
            }
            if let SlotState::Done(value) = &*state {
                return (value.clone(), Flight::Joined);
            }
            drop(state);
            return (work(), Flight::Led);
        }

        let guard = LeaderGuard {
            flights: self,
            key,
            slot: &slot,
            finished: false,
        };
        let value = work();
        guard.complete(value.clone());
        (value, Flight::Led)
    }

    /// Number of keys with work currently in flight
    pub fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }

    fn release(&self, key: &K, slot: &Slot<V>, state: SlotState<V>) {
        self.slots.lock().remove(key);
        slot.finish(state);
    }
}

impl<K: Clone + Hash + Eq, V: Clone> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

struct LeaderGuard<'a, K: Clone + Hash + Eq, V: Clone> {
    flights: &'a SingleFlight<K, V>,
    key: &'a K,
    slot: &'a Slot<V>,
    finished: bool,
}

impl<'a, K: Clone + Hash + Eq, V: Clone> LeaderGuard<'a, K, V> {
    fn complete(mut self, value: V) {
        self.finished = true;
        self.flights.release(self.key, self.slot, SlotState::Done(value));
    }
}

impl<'a, K: Clone + Hash + Eq, V: Clone> Drop for LeaderGuard<'a, K, V> {
    fn drop(&mut self) {
        if !self.finished {
            self.flights
                .release(self.key, self.slot, SlotState::Abandoned);
        }
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Coalesces concurrent compiles of the same template into one.
//!
//! The first caller for a key becomes the leader and runs the work while later callers wait. A
//! successful result is shared with every waiter. If the leader fails, the failure stays with
//! the leader and the next waiter runs the work itself, so errors are never broadcast and nothing
//! is retried behind the caller's back.

use std::{
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;

struct Slot<T> {
    result: Mutex<Option<T>>,
}

pub(crate) struct CompileFlight<K, T> {
    slots: Mutex<HashMap<K, Weak<Slot<T>>>>,
}

impl<K, T> Default for CompileFlight<K, T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T> fmt::Debug for CompileFlight<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileFlight").field("in_flight", &self.slots.lock().len()).finish()
    }
}

/// Whether a call ran the work or received another caller's result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    Leader,
    Follower,
}

impl<K, T> CompileFlight<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Runs `work` unless a concurrent caller with the same key already produced a result.
    pub(crate) fn work<E>(&self, key: K, work: impl FnOnce() -> Result<T, E>) -> (Result<T, E>, Role) {
        let slot = self.join(&key);

        let outcome = {
            let mut result = slot.result.lock();
            if let Some(shared) = result.as_ref() {
                (Ok(shared.clone()), Role::Follower)
            } else {
                let outcome = work();
                if let Ok(value) = &outcome {
                    *result = Some(value.clone());
                }
                (outcome, Role::Leader)
            }
        };

        drop(slot);
        self.slots.lock().retain(|_, slot| slot.strong_count() > 0);
        outcome
    }

    fn join(&self, key: &K) -> Arc<Slot<T>> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key).and_then(Weak::upgrade) {
            return slot;
        }
        let slot = Arc::new(Slot { result: Mutex::new(None) });
        slots.insert(key.clone(), Arc::downgrade(&slot));
        slot
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }
}

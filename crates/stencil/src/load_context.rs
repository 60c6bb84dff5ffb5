// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use parking_lot::{Condvar, Mutex};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Loaded,
    Unloading,
    Unloaded,
}

#[derive(Debug)]
struct State {
    loaded: HashMap<u64, String>,
    leases: usize,
    phase: Phase,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    unloaded: Condvar,
}

/// Tracks the compiled code loaded on behalf of one caching provider, so it can be unloaded as a
/// unit.
///
/// An artifact stays registered from the moment it is compiled until it is dropped, so the count
/// tracks the artifacts still alive. Running a template takes a [`Lease`]; [`unload`](Self::unload) stops
/// new leases from being handed out and completes once the last outstanding lease is dropped, so
/// code is never released while something is still running against it.
///
/// ```
/// use stencil::LoadContext;
/// use stencil_source::NameOnlyTemplateKey;
/// use stencil_source::ResolveKind;
///
/// let context = LoadContext::new();
/// let key = NameOnlyTemplateKey::new("page", ResolveKind::Global, None);
///
/// let lease = context.lease(&key)?;
/// context.unload();
/// assert!(!context.is_unloaded());
/// assert!(context.lease(&key).is_err());
///
/// drop(lease);
/// assert!(context.is_unloaded());
/// # Ok::<(), stencil::Error>(())
/// ```
#[derive(Clone)]
pub struct LoadContext {
    inner: Arc<Inner>,
}

impl LoadContext {
    /// Creates an empty, loaded context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    loaded: HashMap::new(),
                    leases: 0,
                    phase: Phase::Loaded,
                }),
                unloaded: Condvar::new(),
            }),
        }
    }

    /// Records that the code for artifact `id`, compiled for `key`, was loaded into this context.
    pub(crate) fn register(&self, id: u64, key: &str) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.phase != Phase::Loaded {
            return Err(Error::Loading {
                key: key.to_string(),
                reason: "the load context has been unloaded".to_string(),
            });
        }
        state.loaded.insert(id, key.to_string());
        Ok(())
    }

    /// Forgets artifact `id` once it is dropped.
    pub(crate) fn release(&self, id: u64) {
        self.inner.state.lock().loaded.remove(&id);
    }

    /// Number of live artifacts loaded into this context.
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.inner.state.lock().loaded.len()
    }

    /// Number of runs currently holding a lease.
    #[must_use]
    pub fn active_leases(&self) -> usize {
        self.inner.state.lock().leases
    }

    /// Takes a lease that keeps the context loaded until it is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Loading`] if the context is unloading or unloaded.
    pub fn lease(&self, key: &dyn stencil_source::TemplateKey) -> Result<Lease> {
        let mut state = self.inner.state.lock();
        if state.phase != Phase::Loaded {
            return Err(Error::Loading {
                key: key.unique_key_string(),
                reason: "the load context has been unloaded".to_string(),
            });
        }
        state.leases += 1;
        Ok(Lease {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Unloads every artifact in this context once no lease is outstanding.
    ///
    /// Returns immediately. Calling it again has no further effect.
    pub fn unload(&self) {
        let mut state = self.inner.state.lock();
        if state.phase != Phase::Loaded {
            return;
        }
        state.phase = Phase::Unloading;
        if state.leases == 0 {
            finish(&mut state, &self.inner.unloaded);
        }
    }

    /// Whether the context has finished unloading.
    #[must_use]
    pub fn is_unloaded(&self) -> bool {
        self.inner.state.lock().phase == Phase::Unloaded
    }

    /// Blocks until the context has finished unloading or `timeout` elapses. Returns whether it
    /// finished.
    pub fn wait_unloaded(&self, timeout: Duration) -> bool {
        let mut state = self.inner.state.lock();
        if state.phase == Phase::Unloaded {
            return true;
        }
        let _timed_out = self
            .inner
            .unloaded
            .wait_while_for(&mut state, |s| s.phase != Phase::Unloaded, timeout);
        state.phase == Phase::Unloaded
    }
}

impl Default for LoadContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("LoadContext")
            .field("loaded", &state.loaded.len())
            .field("leases", &state.leases)
            .field("phase", &state.phase)
            .finish()
    }
}

fn finish(state: &mut State, unloaded: &Condvar) {
    let released = state.loaded.len();
    state.loaded.clear();
    state.phase = Phase::Unloaded;
    unloaded.notify_all();
    tracing::debug!(load_context.released = released, "load_context.unloaded");
}

/// Keeps a [`LoadContext`] loaded while a template runs.
#[derive(Debug)]
pub struct Lease {
    inner: Arc<Inner>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.leases = state.leases.saturating_sub(1);
        if state.leases == 0 && state.phase == Phase::Unloading {
            finish(&mut state, &self.inner.unloaded);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use static_assertions::assert_impl_all;
    use stencil_source::{NameOnlyTemplateKey, ResolveKind};

    use super::*;

    fn key() -> NameOnlyTemplateKey {
        NameOnlyTemplateKey::new("page", ResolveKind::Global, None)
    }

    #[test]
    fn thread_safe_types() {
        assert_impl_all!(LoadContext: Send, Sync, Clone);
        assert_impl_all!(Lease: Send, Sync);
    }

    #[test]
    fn unload_without_leases_is_immediate() {
        let context = LoadContext::new();
        context.register(1, "page").unwrap();

        context.unload();

        assert!(context.is_unloaded());
        assert_eq!(context.loaded(), 0);
    }

    #[test]
    fn released_artifacts_are_forgotten() {
        let context = LoadContext::new();
        for id in 0..100 {
            context.register(id, "page").unwrap();
            context.release(id);
        }
        context.register(100, "page").unwrap();

        assert_eq!(context.loaded(), 1);
        context.release(7);
        assert_eq!(context.loaded(), 1);
    }

    #[test]
    fn unload_is_idempotent() {
        let context = LoadContext::new();
        context.unload();
        context.unload();
        assert!(context.is_unloaded());
    }

    #[test]
    fn unload_waits_for_last_lease() {
        let context = LoadContext::new();
        context.register(1, "page").unwrap();
        let first = context.lease(&key()).unwrap();
        let second = context.lease(&key()).unwrap();

        context.unload();
        drop(first);
        assert!(!context.is_unloaded());
        assert_eq!(context.loaded(), 1);

        drop(second);
        assert!(context.is_unloaded());
        assert_eq!(context.active_leases(), 0);
    }

    #[test]
    fn unloaded_context_rejects_registration_and_leases() {
        let context = LoadContext::new();
        context.unload();

        assert!(matches!(context.register(1, "page"), Err(Error::Loading { .. })));
        assert!(matches!(context.lease(&key()), Err(Error::Loading { .. })));
    }

    #[test]
    fn wait_unloaded_wakes_when_lease_drops() {
        let context = LoadContext::new();
        let lease = context.lease(&key()).unwrap();
        context.unload();

        let waiter = {
            let context = context.clone();
            thread::spawn(move || context.wait_unloaded(testing_aids::TEST_TIMEOUT))
        };
        drop(lease);

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn wait_unloaded_times_out_while_leased() {
        let context = LoadContext::new();
        let _lease = context.lease(&key()).unwrap();
        context.unload();

        assert!(!context.wait_unloaded(Duration::from_millis(10)));
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, Weak};

/// Observes whether the owner of registered build output is still running.
pub trait Liveness: Send + 'static {
    /// Returns `false` once the owner has terminated. Must not block.
    fn is_alive(&self) -> bool;
}

/// Held by the owner for as long as it is running.
///
/// The guard is dropped on orderly shutdown and also while a panicking worker unwinds, so the
/// paired [`OwnerToken`] reports the owner as gone in both cases.
#[derive(Debug)]
pub struct OwnerGuard {
    _alive: Arc<()>,
}

impl OwnerGuard {
    /// Creates a guard and the token that observes it.
    #[must_use]
    pub fn new() -> (Self, OwnerToken) {
        let alive = Arc::new(());
        let token = OwnerToken {
            alive: Arc::downgrade(&alive),
        };
        (Self { _alive: alive }, token)
    }
}

/// Reports an [`OwnerGuard`] as alive until it is dropped.
#[derive(Clone, Debug)]
pub struct OwnerToken {
    alive: Weak<()>,
}

impl Liveness for OwnerToken {
    fn is_alive(&self) -> bool {
        self.alive.strong_count() > 0
    }
}

/// Reports another OS process as alive until it exits.
///
/// This lets a supervisor process sweep the build output of a worker process that crashed.
#[cfg(unix)]
#[derive(Clone, Copy, Debug)]
pub struct ProcessLiveness {
    pid: libc::pid_t,
}

#[cfg(unix)]
impl ProcessLiveness {
    /// Observes the process with id `pid`.
    ///
    /// Pid 0 names no single process and is always reported as terminated.
    #[must_use]
    pub fn new(pid: u32) -> Self {
        Self {
            pid: libc::pid_t::try_from(pid).unwrap_or(libc::pid_t::MAX),
        }
    }
}

#[cfg(unix)]
impl Liveness for ProcessLiveness {
    fn is_alive(&self) -> bool {
        // kill() treats 0 and negative ids as process groups.
        if self.pid <= 0 {
            return false;
        }
        // SAFETY: signal 0 performs only the existence and permission checks; nothing is delivered.
        let result = unsafe { libc::kill(self.pid, 0) };
        result == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_follows_guard() {
        let (guard, token) = OwnerGuard::new();
        let copy = token.clone();
        assert!(token.is_alive());

        drop(guard);

        assert!(!token.is_alive());
        assert!(!copy.is_alive());
    }

    #[test]
    fn guard_dropped_by_panicking_worker() {
        let (guard, token) = OwnerGuard::new();

        let worker = std::thread::spawn(move || {
            let _guard = guard;
            panic!("worker failed");
        });
        assert!(worker.join().is_err());

        assert!(!token.is_alive());
    }

    #[cfg(unix)]
    #[test]
    fn current_process_is_alive() {
        assert!(ProcessLiveness::new(std::process::id()).is_alive());
    }

    #[cfg(unix)]
    #[test]
    fn pid_zero_is_not_alive() {
        assert!(!ProcessLiveness::new(0).is_alive());
    }

    #[cfg(unix)]
    #[test]
    fn exited_process_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().expect("spawn child");
        let pid = child.id();
        child.wait().expect("child exits");

        assert!(!ProcessLiveness::new(pid).is_alive());
    }
}

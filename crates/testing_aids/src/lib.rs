// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An unpublished crate containing testing utilities for use within this repo.

use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;

mod log;
mod templates;

pub use log::*;
pub use templates::*;

/// If something (whatever) does not happen in a test within this time, the test will fail.
///
/// This is only to break out of deadlocks and infinite loops, not for any situation that is
/// actually expected, so it is generous.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes a thread-safe function on a background thread and abandons it if it does not
/// complete within [`TEST_TIMEOUT`].
///
/// Returns `None` if the function panicked or timed out.
#[must_use]
pub fn execute_or_abandon<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (sender, receiver) = mpsc::channel();

    // If the function panics the sender is dropped, which also ends the wait below.
    thread::spawn(move || {
        let result = f();
        let _ = sender.send(result);
    });

    receiver.recv_timeout(TEST_TIMEOUT).ok()
}

/// Runs `f` on `threads` threads that are released at the same moment, and returns every result
/// in thread order.
///
/// # Panics
///
/// Panics if any of the threads panics.
pub fn run_concurrently<F, R>(threads: usize, f: F) -> Vec<R>
where
    F: Fn(usize) -> R + Send + Sync + 'static,
    R: Send + 'static,
{
    let f = Arc::new(f);
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|index| {
            let f = Arc::clone(&f);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                f(index)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread panicked"))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn execute_or_abandon_returns_result() {
        assert_eq!(execute_or_abandon(|| 40 + 2), Some(42));
    }

    #[test]
    fn execute_or_abandon_reports_panic_as_none() {
        let result: Option<()> = execute_or_abandon(|| panic!("boom"));
        assert_eq!(result, None);
    }

    #[test]
    fn run_concurrently_runs_every_thread() {
        let counter = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&counter);

        let results = run_concurrently(8, move |index| {
            shared.fetch_add(1, Ordering::Relaxed);
            index * 2
        });

        assert_eq!(results, (0..8).map(|i| i * 2).collect::<Vec<_>>());
        assert_eq!(counter.load(Ordering::Relaxed), 8);
    }
}

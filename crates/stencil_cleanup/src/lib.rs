// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Best-effort reclamation of on-disk build output.
//!
//! Compiling a template produces a temporary directory of build output. Normally that directory
//! is removed when the compiled artifact is dropped, but a worker that dies without running
//! destructors leaks it. This crate closes that gap:
//!
//! - [`BuildResources`] owns one build directory and registers it with a [`CleanupRegistry`]
//!   the moment it is created.
//! - [`SweepingRegistry`] remembers every registered path (optionally in an on-disk manifest)
//!   and sweeps them once a [`Watchdog`] observes that the owner is no longer alive.
//! - [`Liveness`] abstracts how the owner is observed: an in-process [`OwnerToken`] or, on Unix,
//!   another OS process ([`ProcessLiveness`]).
//!
//! Cleanup is eventually consistent, not transactional: a sweep that fails to remove a path
//! logs the failure and moves on.
//!
//! # Example
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//!
//! use stencil_cleanup::{BuildResources, OwnerGuard, SweepingRegistry};
//!
//! let root = tempfile::tempdir()?;
//! let registry = SweepingRegistry::new();
//!
//! let (guard, token) = OwnerGuard::new();
//! let watchdog = registry.watch(token, Duration::from_millis(10));
//!
//! let resources = BuildResources::create(root.path(), "build-", Arc::new(registry.clone()))?;
//! resources.retain();
//! let path = resources.path().to_path_buf();
//! drop(resources);
//! assert!(path.exists());
//!
//! // The owner goes away without cleaning up; the watchdog sweeps its output.
//! drop(guard);
//! watchdog.join();
//! assert!(!path.exists());
//! # Ok::<(), std::io::Error>(())
//! ```

mod liveness;
mod registry;
mod resources;
mod sweeping;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

#[doc(inline)]
pub use liveness::{Liveness, OwnerGuard, OwnerToken};
#[cfg(unix)]
#[doc(inline)]
pub use liveness::ProcessLiveness;
#[doc(inline)]
pub use registry::{CleanupRegistry, OwnerTerminated};
#[doc(inline)]
pub use resources::BuildResources;
#[doc(inline)]
pub use sweeping::{SweepReport, SweepingRegistry, Watchdog};

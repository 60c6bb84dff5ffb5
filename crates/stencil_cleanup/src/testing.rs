// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test doubles for cleanup registries.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::{CleanupRegistry, OwnerTerminated};

/// A recorded registry operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryOp {
    /// A path was registered.
    Register(PathBuf),
    /// A path was unregistered.
    Unregister(PathBuf),
    /// An owner-terminated callback was added.
    OnOwnerTerminated,
}

/// A [`CleanupRegistry`] that records every call and never touches the filesystem.
///
/// Clones share state, so a test can keep one clone and hand another to the code under test.
#[derive(Clone, Default)]
pub struct RecordingRegistry {
    operations: Arc<Mutex<Vec<RegistryOp>>>,
    callbacks: Arc<Mutex<Vec<OwnerTerminated>>>,
}

impl RecordingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation, in call order.
    #[must_use]
    pub fn operations(&self) -> Vec<RegistryOp> {
        self.operations.lock().clone()
    }

    /// Paths that are registered and not yet unregistered, without duplicates.
    #[must_use]
    pub fn registered(&self) -> Vec<PathBuf> {
        let mut registered = Vec::new();
        for op in self.operations.lock().iter() {
            match op {
                RegistryOp::Register(path) if !registered.contains(path) => registered.push(path.clone()),
                RegistryOp::Register(_) => {}
                RegistryOp::Unregister(path) => registered.retain(|p| p != path),
                RegistryOp::OnOwnerTerminated => {}
            }
        }
        registered
    }

    /// Runs the recorded owner-terminated callbacks, as a watchdog would.
    pub fn terminate_owner(&self) {
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        for callback in callbacks {
            callback();
        }
    }
}

impl fmt::Debug for RecordingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingRegistry")
            .field("operations", &self.operations)
            .field("callbacks", &self.callbacks.lock().len())
            .finish()
    }
}

impl CleanupRegistry for RecordingRegistry {
    fn register_path_for_cleanup(&self, path: &Path) {
        self.operations.lock().push(RegistryOp::Register(path.to_path_buf()));
    }

    fn unregister_path(&self, path: &Path) {
        self.operations.lock().push(RegistryOp::Unregister(path.to_path_buf()));
    }

    fn on_owner_terminated(&self, callback: OwnerTerminated) {
        self.operations.lock().push(RegistryOp::OnOwnerTerminated);
        self.callbacks.lock().push(callback);
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt::Debug, path::Path};

/// A callback run once the owner of registered paths has terminated.
pub type OwnerTerminated = Box<dyn FnOnce() + Send>;

/// The boundary to an external watchdog that reclaims registered paths.
///
/// The compilation cache calls [`register_path_for_cleanup`](Self::register_path_for_cleanup)
/// whenever it creates build output; it never implements the watchdog itself.
pub trait CleanupRegistry: Debug + Send + Sync {
    /// Records `path` for removal if its owner terminates without removing it.
    fn register_path_for_cleanup(&self, path: &Path);

    /// Forgets `path` after it was removed through the normal shutdown path.
    fn unregister_path(&self, path: &Path);

    /// Runs `callback` after the owner has terminated and registered paths were swept.
    fn on_owner_terminated(&self, callback: OwnerTerminated);
}

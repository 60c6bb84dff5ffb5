// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::CleanupRegistry;

/// A temporary build-output directory backing one compiled artifact.
///
/// The directory is registered with the [`CleanupRegistry`] before `create` returns, so it is
/// reclaimed even if the process dies right afterwards. Dropping the value removes the directory
/// and unregisters it, unless it was [retained](Self::retain) for diagnostics, in which case it
/// stays registered and is left for the registry to sweep.
pub struct BuildResources {
    path: PathBuf,
    retained: AtomicBool,
    registry: Arc<dyn CleanupRegistry>,
}

impl BuildResources {
    /// Creates a fresh directory named `<prefix><random>` below `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(root: &Path, prefix: &str, registry: Arc<dyn CleanupRegistry>) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let path = tempfile::Builder::new().prefix(prefix).tempdir_in(root)?.keep();
        registry.register_path_for_cleanup(&path);

        Ok(Self {
            path,
            retained: AtomicBool::new(false),
            registry,
        })
    }

    /// The build-output directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keeps the directory on drop, e.g. so a failed compile can be inspected.
    pub fn retain(&self) {
        self.retained.store(true, Ordering::Release);
    }

    /// Whether the directory will be kept on drop.
    #[must_use]
    pub fn is_retained(&self) -> bool {
        self.retained.load(Ordering::Acquire)
    }

    /// Registers the directory again. Registries treat repeated registration as a no-op.
    pub fn ensure_registered(&self) {
        self.registry.register_path_for_cleanup(&self.path);
    }
}

impl fmt::Debug for BuildResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildResources")
            .field("path", &self.path)
            .field("retained", &self.is_retained())
            .finish_non_exhaustive()
    }
}

impl Drop for BuildResources {
    fn drop(&mut self) {
        if self.is_retained() {
            return;
        }

        match fs::remove_dir_all(&self.path) {
            Ok(()) => self.registry.unregister_path(&self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.registry.unregister_path(&self.path),
            Err(e) => {
                // Still registered, so the watchdog gets another chance at it.
                tracing::warn!(cleanup.path = %self.path.display(), error = %e, "cleanup.remove_failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::testing::{RecordingRegistry, RegistryOp};

    #[test]
    fn thread_safe_type() {
        assert_impl_all!(BuildResources: Send, Sync);
    }

    #[test]
    fn create_registers_before_returning() {
        let root = tempfile::tempdir().unwrap();
        let registry = RecordingRegistry::new();

        let resources = BuildResources::create(root.path(), "compile-", Arc::new(registry.clone())).unwrap();

        assert!(resources.path().is_dir());
        assert!(resources.path().starts_with(root.path()));
        assert_eq!(registry.operations(), vec![RegistryOp::Register(resources.path().to_path_buf())]);
    }

    #[test]
    fn drop_removes_and_unregisters() {
        let root = tempfile::tempdir().unwrap();
        let registry = RecordingRegistry::new();
        let resources = BuildResources::create(root.path(), "compile-", Arc::new(registry.clone())).unwrap();
        let path = resources.path().to_path_buf();

        drop(resources);

        assert!(!path.exists());
        assert_eq!(registry.registered(), Vec::<PathBuf>::new());
    }

    #[test]
    fn retained_output_survives_drop_and_stays_registered() {
        let root = tempfile::tempdir().unwrap();
        let registry = RecordingRegistry::new();
        let resources = BuildResources::create(root.path(), "compile-", Arc::new(registry.clone())).unwrap();
        let path = resources.path().to_path_buf();

        resources.retain();
        drop(resources);

        assert!(path.exists());
        assert_eq!(registry.registered(), vec![path]);
    }

    #[test]
    fn create_makes_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");

        let resources = BuildResources::create(&nested, "x-", Arc::new(RecordingRegistry::new())).unwrap();

        assert!(resources.path().starts_with(&nested));
    }
}

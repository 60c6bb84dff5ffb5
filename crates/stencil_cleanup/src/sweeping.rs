// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    collections::BTreeSet,
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::Mutex;

use crate::{CleanupRegistry, Liveness, OwnerTerminated};

/// Outcome of a sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Paths that were removed, or were already gone.
    pub removed: Vec<PathBuf>,
    /// Paths that could not be removed.
    pub failed: Vec<PathBuf>,
}

#[derive(Default)]
struct Inner {
    paths: Mutex<BTreeSet<PathBuf>>,
    callbacks: Mutex<Vec<OwnerTerminated>>,
    manifest: Option<PathBuf>,
}

/// A [`CleanupRegistry`] that sweeps registered paths when its owner terminates.
///
/// Registered paths are kept in memory and, when a manifest file is configured, mirrored to disk
/// one path per line. The manifest lets a later process (or an out-of-process supervisor) reclaim
/// output left behind by a process that was killed outright, see [`sweep_manifest`](Self::sweep_manifest).
#[derive(Clone, Default)]
pub struct SweepingRegistry {
    inner: Arc<Inner>,
}

impl SweepingRegistry {
    /// Creates a registry that keeps registered paths in memory only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that mirrors registered paths into `manifest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be created.
    pub fn with_manifest(manifest: impl Into<PathBuf>) -> io::Result<Self> {
        let manifest = manifest.into();
        if let Some(parent) = manifest.parent() {
            fs::create_dir_all(parent)?;
        }
        write_manifest(&manifest, &BTreeSet::new())?;

        Ok(Self {
            inner: Arc::new(Inner {
                manifest: Some(manifest),
                ..Inner::default()
            }),
        })
    }

    /// Returns the currently registered paths.
    #[must_use]
    pub fn registered(&self) -> Vec<PathBuf> {
        self.inner.paths.lock().iter().cloned().collect()
    }

    /// Starts a watchdog thread that sweeps this registry once `liveness` reports the owner gone.
    ///
    /// `poll_interval` bounds how long a terminated owner can go unnoticed.
    #[must_use]
    pub fn watch(&self, liveness: impl Liveness, poll_interval: Duration) -> Watchdog {
        Watchdog::spawn(self.clone(), liveness, poll_interval)
    }

    /// Removes every registered path, then runs the owner-terminated callbacks.
    ///
    /// Paths stay listed in the manifest until they are gone, so a sweep cut short by a crash
    /// leaves them for [`sweep_manifest`](Self::sweep_manifest).
    pub fn sweep(&self) -> SweepReport {
        let paths = self.registered();
        let mut report = SweepReport::default();

        for path in paths {
            match remove_path(&path) {
                Ok(()) => report.removed.push(path),
                Err(e) => {
                    tracing::warn!(cleanup.path = %path.display(), error = %e, "cleanup.sweep_failed");
                    report.failed.push(path);
                }
            }
        }

        // Paths that could not be removed stay registered for a later attempt.
        {
            let mut registered = self.inner.paths.lock();
            for path in &report.removed {
                registered.remove(path);
            }
            self.persist(&registered);
        }

        let callbacks = std::mem::take(&mut *self.inner.callbacks.lock());
        for callback in callbacks {
            callback();
        }

        tracing::info!(
            cleanup.removed = report.removed.len(),
            cleanup.failed = report.failed.len(),
            "cleanup.swept"
        );
        report
    }

    /// Removes every path listed in a manifest written by a previous registry, then deletes the
    /// manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read. A missing manifest yields an
    /// empty report.
    pub fn sweep_manifest(manifest: &Path) -> io::Result<SweepReport> {
        let contents = match fs::read_to_string(manifest) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SweepReport::default()),
            Err(e) => return Err(e),
        };

        let mut report = SweepReport::default();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let path = PathBuf::from(line);
            match remove_path(&path) {
                Ok(()) => report.removed.push(path),
                Err(_) => report.failed.push(path),
            }
        }

        if report.failed.is_empty() {
            fs::remove_file(manifest)?;
        }
        Ok(report)
    }

    /// Rewrites the manifest from `paths`. Callers hold the path lock, so writes land in the
    /// same order as the changes they record.
    fn persist(&self, paths: &BTreeSet<PathBuf>) {
        let Some(manifest) = &self.inner.manifest else {
            return;
        };

        if let Err(e) = write_manifest(manifest, paths) {
            tracing::warn!(cleanup.manifest = %manifest.display(), error = %e, "cleanup.manifest_write_failed");
        }
    }
}

/// Writes a sibling temporary file and renames it over `manifest`, so readers see either the old
/// or the new list and never a partial one.
fn write_manifest(manifest: &Path, paths: &BTreeSet<PathBuf>) -> io::Result<()> {
    let dir = match manifest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::Builder::new().prefix(".manifest-").tempfile_in(dir)?;
    for path in paths {
        writeln!(file, "{}", path.display())?;
    }
    file.as_file().sync_all()?;
    file.persist(manifest)?;
    Ok(())
}

impl fmt::Debug for SweepingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepingRegistry")
            .field("paths", &self.inner.paths.lock().len())
            .field("callbacks", &self.inner.callbacks.lock().len())
            .field("manifest", &self.inner.manifest)
            .finish()
    }
}

impl CleanupRegistry for SweepingRegistry {
    fn register_path_for_cleanup(&self, path: &Path) {
        let mut paths = self.inner.paths.lock();
        if paths.insert(path.to_path_buf()) {
            self.persist(&paths);
        }
    }

    fn unregister_path(&self, path: &Path) {
        let mut paths = self.inner.paths.lock();
        if paths.remove(path) {
            self.persist(&paths);
        }
    }

    fn on_owner_terminated(&self, callback: OwnerTerminated) {
        self.inner.callbacks.lock().push(callback);
    }
}

fn remove_path(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// A background thread that sweeps a [`SweepingRegistry`] once its owner terminates.
///
/// Dropping the watchdog stops it without sweeping.
#[derive(Debug)]
pub struct Watchdog {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    fn spawn(registry: SweepingRegistry, liveness: impl Liveness, poll_interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("stencil cleanup watchdog".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Acquire) {
                    if !liveness.is_alive() {
                        tracing::info!("cleanup.owner_terminated");
                        registry.sweep();
                        return;
                    }
                    thread::park_timeout(poll_interval);
                }
            })
            .map_err(|e| tracing::error!(error = %e, "cleanup.watchdog_spawn_failed"))
            .ok();

        Self { stop, thread }
    }

    /// Waits for the watchdog to finish, which happens after it has swept.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            // A panicking callback is the callback's problem; the sweep itself already ran.
            let _ = thread.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end reclamation of build output whose owner went away.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stencil_cleanup::{BuildResources, CleanupRegistry, OwnerGuard, SweepingRegistry};
use testing_aids::{LogCapture, execute_or_abandon};

const POLL: Duration = Duration::from_millis(5);

#[test]
fn panicking_owner_has_retained_output_swept() {
    let root = tempfile::tempdir().unwrap();
    let registry = SweepingRegistry::new();
    let (guard, token) = OwnerGuard::new();
    let watchdog = registry.watch(token, POLL);

    let worker_registry: Arc<dyn CleanupRegistry> = Arc::new(registry.clone());
    let worker_root = root.path().to_path_buf();
    let (sender, receiver) = std::sync::mpsc::channel();

    let worker = thread::spawn(move || {
        let _guard = guard;
        let resources = BuildResources::create(&worker_root, "build-", worker_registry).unwrap();
        resources.retain();
        sender.send(resources.path().to_path_buf()).unwrap();
        panic!("worker crashed");
    });

    let build_dir = receiver.recv().unwrap();
    assert!(worker.join().is_err());

    execute_or_abandon(move || watchdog.join()).expect("watchdog did not sweep in time");

    assert!(!build_dir.exists());
    assert!(registry.registered().is_empty());
}

#[test]
fn manifest_from_killed_process_is_swept_by_successor() {
    let root = tempfile::tempdir().unwrap();
    let manifest = root.path().join("state").join("cleanup.manifest");

    let leaked = {
        let registry: Arc<dyn CleanupRegistry> = Arc::new(SweepingRegistry::with_manifest(&manifest).unwrap());
        let resources = BuildResources::create(root.path(), "build-", registry).unwrap();
        resources.retain();
        resources.path().to_path_buf()
    };
    assert!(leaked.exists());

    let report = SweepingRegistry::sweep_manifest(&manifest).unwrap();

    assert_eq!(report.removed, vec![leaked.clone()]);
    assert!(!leaked.exists());
    assert!(!manifest.exists());
}

#[test]
fn sweep_is_logged() {
    let capture = LogCapture::new();
    let _subscriber = tracing::subscriber::set_default(capture.subscriber());

    let root = tempfile::tempdir().unwrap();
    let registry = SweepingRegistry::new();
    let leftover = root.path().join("leftover");
    std::fs::create_dir(&leftover).unwrap();
    registry.register_path_for_cleanup(&leftover);

    let report = registry.sweep();

    assert_eq!(report.removed, vec![leftover]);
    capture.assert_contains("cleanup.swept");
    capture.assert_contains("cleanup.removed=1");
}

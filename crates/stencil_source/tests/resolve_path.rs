// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for resolving templates from disk.

use std::{fs, thread, time::Duration};

use stencil_source::{Error, ResolveKind, ResolvePathTemplateManager, TemplateManager, TemplateSource};
use tempfile::TempDir;

fn views() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("index.cshtml"), "<h1>@Model.Title</h1>").expect("write index");
    fs::create_dir(dir.path().join("shared")).expect("create shared");
    fs::write(dir.path().join("shared").join("_layout.html"), "<body>@RenderBody()</body>").expect("write layout");
    dir
}

#[test]
fn resolves_name_with_default_extension() {
    let dir = views();
    let manager = ResolvePathTemplateManager::new([dir.path()]);

    let key = manager.get_key("index", ResolveKind::Global, None);
    let source = manager.resolve(key.as_ref()).expect("index resolves");

    assert_eq!(source.template(), "<h1>@Model.Title</h1>");
    assert!(key.full_path().is_some_and(|p| p.ends_with("index.cshtml")));
    assert_eq!(source.file_path(), key.full_path());
}

#[test]
fn searches_roots_in_order() {
    let dir = views();
    let manager = ResolvePathTemplateManager::new([dir.path().to_path_buf(), dir.path().join("shared")]);

    let key = manager.get_key("_layout", ResolveKind::Layout, None);
    let source = manager.resolve(key.as_ref()).expect("layout resolves");

    assert_eq!(source.template(), "<body>@RenderBody()</body>");
}

#[test]
fn unknown_name_fails_resolution() {
    let dir = views();
    let manager = ResolvePathTemplateManager::new([dir.path()]);

    let key = manager.get_key("missing", ResolveKind::Global, None);
    assert!(key.full_path().is_none());

    let error = manager.resolve(key.as_ref()).expect_err("missing template must not resolve");
    assert!(matches!(error, Error::TemplateResolution { name, .. } if name == "missing"));
}

#[test]
fn deleted_file_fails_resolution() {
    let dir = views();
    let manager = ResolvePathTemplateManager::new([dir.path()]);
    let key = manager.get_key("index", ResolveKind::Global, None);

    fs::remove_file(dir.path().join("index.cshtml")).expect("remove index");

    let error = manager.resolve(key.as_ref()).expect_err("deleted template must not resolve");
    assert!(matches!(error, Error::TemplateResolution { .. }));
}

#[test]
fn same_file_gives_same_identity() {
    let dir = views();
    let manager = ResolvePathTemplateManager::new([dir.path()]);

    let by_name = manager.get_key("index", ResolveKind::Global, None);
    let by_file = manager.get_key("index.cshtml", ResolveKind::Include, None);

    assert_eq!(by_name.unique_key_string(), by_file.unique_key_string());
}

#[test]
fn modified_time_tracks_rewrites() {
    let dir = views();
    let manager = ResolvePathTemplateManager::new([dir.path()]).with_modified_time(true);

    let before = manager.get_key("index", ResolveKind::Global, None);
    assert!(before.modified_time().is_some());

    // Some filesystems only keep second-granularity timestamps.
    thread::sleep(Duration::from_millis(1100));
    fs::write(dir.path().join("index.cshtml"), "<h2>changed</h2>").expect("rewrite index");

    let after = manager.get_key("index", ResolveKind::Global, None);

    assert_eq!(before.unique_key_string(), after.unique_key_string());
    assert!(after.modified_time() > before.modified_time());
}

#[test]
fn custom_extensions_replace_defaults() {
    let dir = views();
    let manager = ResolvePathTemplateManager::new([dir.path()]).with_extensions(["tpl"]);

    let key = manager.get_key("index", ResolveKind::Global, None);
    assert!(manager.resolve(key.as_ref()).is_err());
}

#[test]
fn add_dynamic_is_unsupported() {
    let dir = views();
    let manager = ResolvePathTemplateManager::new([dir.path()]);
    let key = manager.get_key("index", ResolveKind::Global, None);

    let error = manager
        .add_dynamic(key.as_ref(), TemplateSource::new("x"))
        .expect_err("path manager is read-only");
    assert!(matches!(error, Error::UnsupportedOperation { .. }));
}

#[test]
fn names_cannot_leave_the_roots() {
    let outer = tempfile::tempdir().expect("temp dir");
    let root = outer.path().join("views");
    fs::create_dir(&root).expect("create views");
    fs::write(root.join("page.html"), "inside").expect("write page");
    let secret = outer.path().join("secret.txt");
    fs::write(&secret, "outside").expect("write secret");
    let manager = ResolvePathTemplateManager::new([&root]);

    for name in ["../secret", "../secret.txt", "./../secret.txt"] {
        let key = manager.get_key(name, ResolveKind::Global, None);
        assert!(key.full_path().is_none(), "{name} escaped the roots");
        assert!(manager.resolve(key.as_ref()).is_err());
    }

    let absolute = secret.to_str().expect("utf-8 temp path");
    let key = manager.get_key(absolute, ResolveKind::Global, None);
    assert!(key.full_path().is_none());
    assert!(manager.resolve(key.as_ref()).is_err());
}

#[test]
fn absolute_paths_inside_a_root_resolve() {
    let dir = views();
    let manager = ResolvePathTemplateManager::new([dir.path()]);
    let absolute = dir.path().join("index.cshtml");

    let key = manager.get_key(absolute.to_str().expect("utf-8 temp path"), ResolveKind::Global, None);
    let source = manager.resolve(key.as_ref()).expect("absolute path below a root resolves");

    assert_eq!(source.template(), "<h1>@Model.Title</h1>");
}

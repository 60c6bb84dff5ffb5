// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory of template files that is deleted when dropped.
#[derive(Debug)]
pub struct TemplateDir {
    dir: TempDir,
}

impl TemplateDir {
    /// Creates an empty directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create template directory"),
        }
    }

    /// The directory's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` to `relative_path`, creating parent directories, and returns the full path.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write(&self, relative_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create template subdirectory");
        }
        fs::write(&path, contents).expect("failed to write template");
        path
    }
}

impl Default for TemplateDir {
    fn default() -> Self {
        Self::new()
    }
}

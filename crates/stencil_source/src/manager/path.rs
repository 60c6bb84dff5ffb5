// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fs, io,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use crate::{
    Error, FullPathTemplateKey, FullPathWithModifiedTimeTemplateKey, NameOnlyTemplateKey, ResolveContext, ResolveKind, Result,
    SharedKey, TemplateKey, TemplateManager, TemplateSource,
};

const DEFAULT_EXTENSIONS: [&str; 3] = ["cshtml", "html", "txt"];

/// Resolves templates from files below a list of root directories.
///
/// A name is looked up in each root in order, first as given and then with each configured
/// extension appended. Names never reach outside the roots: `..` components are rejected, and an
/// absolute path is used as-is only when it lies below one of the roots. Located templates get a
/// [`FullPathTemplateKey`], or a [`FullPathWithModifiedTimeTemplateKey`] when modified-time
/// tracking is enabled. Templates cannot be added at run time.
///
/// # Examples
///
/// ```no_run
/// use stencil_source::{ResolveKind, ResolvePathTemplateManager, TemplateManager};
///
/// let manager = ResolvePathTemplateManager::new(["views", "views/shared"]).with_modified_time(true);
/// let key = manager.get_key("index", ResolveKind::Global, None);
/// let source = manager.resolve(key.as_ref())?;
/// # Ok::<(), stencil_source::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct ResolvePathTemplateManager {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    track_modified_time: bool,
}

impl ResolvePathTemplateManager {
    /// Creates a manager searching `roots` in order.
    #[must_use]
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            track_modified_time: false,
        }
    }

    /// Replaces the file extensions tried when a name has no match as given.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Records each template's last-modified time in its key, so caches can detect stale entries.
    #[must_use]
    pub fn with_modified_time(mut self, enabled: bool) -> Self {
        self.track_modified_time = enabled;
        self
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.is_absolute() {
            return self.contains(direct).then(|| direct.to_path_buf());
        }
        if !direct.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
            tracing::debug!(template.name = name, "template.outside_roots");
            return None;
        }

        self.roots.iter().find_map(|root| {
            std::iter::once(root.join(name))
                .chain(self.extensions.iter().map(|ext| root.join(format!("{name}.{ext}"))))
                .find(|candidate| candidate.is_file())
        })
    }

    /// Whether `path` is an existing file below one of the roots, after resolving links.
    fn contains(&self, path: &Path) -> bool {
        let Ok(path) = fs::canonicalize(path) else {
            return false;
        };
        let inside = path.is_file()
            && self
                .roots
                .iter()
                .filter_map(|root| fs::canonicalize(root).ok())
                .any(|root| path.starts_with(root));
        if !inside {
            tracing::debug!(template.path = %path.display(), "template.outside_roots");
        }
        inside
    }
}

impl TemplateManager for ResolvePathTemplateManager {
    fn get_key(&self, name: &str, resolve_kind: ResolveKind, context: Option<&ResolveContext>) -> SharedKey {
        let Some(path) = self.locate(name) else {
            // Unlocatable names still get a key; resolving it reports the failure.
            return Arc::new(NameOnlyTemplateKey::new(name, resolve_kind, context.cloned()));
        };

        let path = fs::canonicalize(&path).unwrap_or(path);

        if self.track_modified_time {
            if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
                return Arc::new(FullPathWithModifiedTimeTemplateKey::new(
                    name,
                    path,
                    modified,
                    resolve_kind,
                    context.cloned(),
                ));
            }
        }

        Arc::new(FullPathTemplateKey::new(name, path, resolve_kind, context.cloned()))
    }

    fn resolve(&self, key: &dyn TemplateKey) -> Result<TemplateSource> {
        let path = match key.full_path() {
            Some(path) => path.to_path_buf(),
            None => self
                .locate(key.name())
                .ok_or_else(|| Error::not_found(key.name(), format!("not found below {:?}", self.roots)))?,
        };

        match fs::read_to_string(&path) {
            Ok(text) => {
                tracing::debug!(template.path = %path.display(), "template.read");
                Ok(TemplateSource::from_file(text, path))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::not_found(key.name(), format!("{} does not exist", path.display()))),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn add_dynamic(&self, _key: &dyn TemplateKey, _source: TemplateSource) -> Result<()> {
        Err(Error::UnsupportedOperation {
            operation: "add_dynamic",
            manager: "ResolvePathTemplateManager",
        })
    }
}

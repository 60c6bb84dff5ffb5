// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Template keys: the identity of a template resolved in a context.

use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use crate::ModelType;

/// Why a template is being resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResolveKind {
    /// A top-level request from the caller.
    Global,
    /// A child template included by another template.
    Include,
    /// A layout wrapping another template.
    Layout,
}

/// The template that is doing the resolving, for nested resolution.
///
/// This is a non-owning reference: it carries the resolving template's key and the model type it
/// was compiled for, never the compiled artifact itself.
#[derive(Clone, Debug)]
pub struct ResolveContext {
    key: SharedKey,
    model_type: Option<ModelType>,
}

impl ResolveContext {
    /// Creates a context for a template identified by `key` compiled against `model_type`.
    #[must_use]
    pub fn new(key: SharedKey, model_type: Option<ModelType>) -> Self {
        Self { key, model_type }
    }

    /// The key of the resolving template.
    #[must_use]
    pub fn key(&self) -> &SharedKey {
        &self.key
    }

    /// The model type the resolving template was compiled for.
    #[must_use]
    pub fn model_type(&self) -> Option<&ModelType> {
        self.model_type.as_ref()
    }
}

/// Identity for a named template resolved in a context.
///
/// Keys are created by a [`TemplateManager`](crate::TemplateManager) and are immutable
/// afterwards. Callers must treat the concrete key type as opaque and compare keys only through
/// [`unique_key_string`](Self::unique_key_string): two keys with equal unique strings refer to the
/// same template, whatever their other fields.
pub trait TemplateKey: Debug + Send + Sync {
    /// The name the template was requested by.
    fn name(&self) -> &str;

    /// Why the template is being resolved.
    fn resolve_kind(&self) -> ResolveKind;

    /// The template doing the resolving, if any.
    fn context(&self) -> Option<&ResolveContext>;

    /// The canonical string used as the primary cache index.
    ///
    /// This must be a pure function of the key's own fields.
    fn unique_key_string(&self) -> String;

    /// The resolved filesystem path, for keys that carry one.
    fn full_path(&self) -> Option<&Path> {
        None
    }

    /// The last-modified time of the template at the moment the key was created, for keys that
    /// carry one.
    fn modified_time(&self) -> Option<SystemTime> {
        None
    }
}

/// A shared, type-erased template key.
pub type SharedKey = Arc<dyn TemplateKey>;

/// A key identified by its name only.
///
/// Two same-named templates served by different managers collide under this key.
#[derive(Clone, Debug)]
pub struct NameOnlyTemplateKey {
    name: String,
    resolve_kind: ResolveKind,
    context: Option<ResolveContext>,
}

impl NameOnlyTemplateKey {
    /// Creates a key for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, resolve_kind: ResolveKind, context: Option<ResolveContext>) -> Self {
        Self {
            name: name.into(),
            resolve_kind,
            context,
        }
    }
}

impl TemplateKey for NameOnlyTemplateKey {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_kind(&self) -> ResolveKind {
        self.resolve_kind
    }

    fn context(&self) -> Option<&ResolveContext> {
        self.context.as_ref()
    }

    fn unique_key_string(&self) -> String {
        self.name.clone()
    }
}

/// A key identified by the template's resolved filesystem path.
#[derive(Clone, Debug)]
pub struct FullPathTemplateKey {
    name: String,
    full_path: PathBuf,
    resolve_kind: ResolveKind,
    context: Option<ResolveContext>,
}

impl FullPathTemplateKey {
    /// Creates a key for `name` resolved to `full_path`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        full_path: impl Into<PathBuf>,
        resolve_kind: ResolveKind,
        context: Option<ResolveContext>,
    ) -> Self {
        Self {
            name: name.into(),
            full_path: full_path.into(),
            resolve_kind,
            context,
        }
    }
}

impl TemplateKey for FullPathTemplateKey {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_kind(&self) -> ResolveKind {
        self.resolve_kind
    }

    fn context(&self) -> Option<&ResolveContext> {
        self.context.as_ref()
    }

    fn unique_key_string(&self) -> String {
        self.full_path.to_string_lossy().into_owned()
    }

    fn full_path(&self) -> Option<&Path> {
        Some(&self.full_path)
    }
}

/// A path key that also records the template's last-modified time.
///
/// The timestamp is not part of the unique key string. It lets a cache detect that the file
/// behind an entry changed since the entry was compiled.
#[derive(Clone, Debug)]
pub struct FullPathWithModifiedTimeTemplateKey {
    inner: FullPathTemplateKey,
    modified_time: SystemTime,
}

impl FullPathWithModifiedTimeTemplateKey {
    /// Creates a key for `name` resolved to `full_path`, last modified at `modified_time`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        full_path: impl Into<PathBuf>,
        modified_time: SystemTime,
        resolve_kind: ResolveKind,
        context: Option<ResolveContext>,
    ) -> Self {
        Self {
            inner: FullPathTemplateKey::new(name, full_path, resolve_kind, context),
            modified_time,
        }
    }
}

impl TemplateKey for FullPathWithModifiedTimeTemplateKey {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn resolve_kind(&self) -> ResolveKind {
        self.inner.resolve_kind()
    }

    fn context(&self) -> Option<&ResolveContext> {
        self.inner.context()
    }

    fn unique_key_string(&self) -> String {
        self.inner.unique_key_string()
    }

    fn full_path(&self) -> Option<&Path> {
        self.inner.full_path()
    }

    fn modified_time(&self) -> Option<SystemTime> {
        Some(self.modified_time)
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Template managers resolve template keys to template sources.

mod delegate;
mod embedded;
mod path;

use std::fmt::Debug;

pub use delegate::DelegateTemplateManager;
pub use embedded::EmbeddedTemplateManager;
pub use path::ResolvePathTemplateManager;

use crate::{ResolveContext, ResolveKind, Result, SharedKey, TemplateKey, TemplateSource};

/// A strategy for locating template text.
///
/// Implementations decide which concrete [`TemplateKey`] they hand out; callers only rely on
/// [`TemplateKey::unique_key_string`].
pub trait TemplateManager: Debug + Send + Sync {
    /// Creates the key for `name` resolved as `resolve_kind`, optionally on behalf of the template
    /// described by `context`.
    ///
    /// The result is deterministic for identical inputs and identical manager configuration.
    fn get_key(&self, name: &str, resolve_kind: ResolveKind, context: Option<&ResolveContext>) -> SharedKey;

    /// Loads the source for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateResolution`](crate::Error::TemplateResolution) when no source can
    /// be located. An empty string is never returned in place of a missing template.
    fn resolve(&self, key: &dyn TemplateKey) -> Result<TemplateSource>;

    /// Registers `source` under `key`, bypassing any file or embedded lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`](crate::Error::UnsupportedOperation) for read-only
    /// managers and [`Error::Conflict`](crate::Error::Conflict) when different content is
    /// already registered under the same key.
    fn add_dynamic(&self, key: &dyn TemplateKey, source: TemplateSource) -> Result<()>;
}

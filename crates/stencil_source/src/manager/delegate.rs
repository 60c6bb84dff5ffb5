// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::{Error, NameOnlyTemplateKey, ResolveContext, ResolveKind, Result, SharedKey, TemplateKey, TemplateManager, TemplateSource};

type Resolver = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves templates by name.
///
/// Templates added with [`add_dynamic`](TemplateManager::add_dynamic) are served first; any other
/// name is passed to the optional resolver callback. Keys are [`NameOnlyTemplateKey`]s.
///
/// # Examples
///
/// ```
/// use stencil_source::{DelegateTemplateManager, ResolveKind, TemplateManager};
///
/// let manager = DelegateTemplateManager::with_resolver(|name| {
///     (name == "footer").then(|| "<footer/>".to_string())
/// });
///
/// let key = manager.get_key("footer", ResolveKind::Include, None);
/// assert_eq!(manager.resolve(key.as_ref())?.template(), "<footer/>");
///
/// let missing = manager.get_key("header", ResolveKind::Include, None);
/// assert!(manager.resolve(missing.as_ref()).is_err());
/// # Ok::<(), stencil_source::Error>(())
/// ```
pub struct DelegateTemplateManager {
    resolver: Option<Resolver>,
    dynamic: DashMap<String, TemplateSource>,
}

impl DelegateTemplateManager {
    /// Creates a manager that only serves templates added at run time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolver: None,
            dynamic: DashMap::new(),
        }
    }

    /// Creates a manager that falls back to `resolver` for names not added at run time.
    #[must_use]
    pub fn with_resolver<F>(resolver: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            resolver: Some(Box::new(resolver)),
            dynamic: DashMap::new(),
        }
    }

    /// Removes a template previously added under `key`, returning its source.
    pub fn remove_dynamic(&self, key: &dyn TemplateKey) -> Option<TemplateSource> {
        self.dynamic.remove(&key.unique_key_string()).map(|(_, source)| source)
    }
}

impl Default for DelegateTemplateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DelegateTemplateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateTemplateManager")
            .field("resolver", &self.resolver.is_some())
            .field("dynamic", &self.dynamic.len())
            .finish()
    }
}

impl TemplateManager for DelegateTemplateManager {
    fn get_key(&self, name: &str, resolve_kind: ResolveKind, context: Option<&ResolveContext>) -> SharedKey {
        Arc::new(NameOnlyTemplateKey::new(name, resolve_kind, context.cloned()))
    }

    fn resolve(&self, key: &dyn TemplateKey) -> Result<TemplateSource> {
        if let Some(source) = self.dynamic.get(&key.unique_key_string()) {
            return Ok(source.clone());
        }

        let Some(resolver) = &self.resolver else {
            return Err(Error::not_found(key.name(), "no template was added under this name"));
        };

        resolver(key.name())
            .map(TemplateSource::new)
            .ok_or_else(|| Error::not_found(key.name(), "the resolver returned no template"))
    }

    fn add_dynamic(&self, key: &dyn TemplateKey, source: TemplateSource) -> Result<()> {
        match self.dynamic.entry(key.unique_key_string()) {
            Entry::Occupied(existing) if existing.get().template() == source.template() => Ok(()),
            Entry::Occupied(existing) => Err(Error::Conflict {
                key: existing.key().clone(),
            }),
            Entry::Vacant(slot) => {
                tracing::debug!(template.key = slot.key().as_str(), "template.added");
                slot.insert(source);
                Ok(())
            }
        }
    }
}

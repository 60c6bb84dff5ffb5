// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{collections::HashMap, sync::Arc};

use crate::{Error, NameOnlyTemplateKey, ResolveContext, ResolveKind, Result, SharedKey, TemplateKey, TemplateManager, TemplateSource};

/// Resolves templates compiled into the binary, typically with `include_str!`.
///
/// Entries are registered under resource names such as `views.index`. With a namespace set,
/// a request for `index` looks up `<namespace>.index`. The manager is read-only.
///
/// # Examples
///
/// ```
/// use stencil_source::{EmbeddedTemplateManager, ResolveKind, TemplateManager};
///
/// let manager = EmbeddedTemplateManager::new([("views.index", "<h1>@Model.Title</h1>")]).with_namespace("views");
/// let key = manager.get_key("index", ResolveKind::Global, None);
///
/// assert_eq!(manager.resolve(key.as_ref())?.template(), "<h1>@Model.Title</h1>");
/// # Ok::<(), stencil_source::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct EmbeddedTemplateManager {
    namespace: Option<String>,
    templates: HashMap<String, &'static str>,
}

impl EmbeddedTemplateManager {
    /// Creates a manager over `(resource name, template text)` pairs.
    #[must_use]
    pub fn new<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = (S, &'static str)>,
        S: Into<String>,
    {
        Self {
            namespace: None,
            templates: templates.into_iter().map(|(name, text)| (name.into(), text)).collect(),
        }
    }

    /// Prefixes every requested name with `namespace` and a dot.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn resource_name(&self, name: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}.{name}"),
            None => name.to_string(),
        }
    }
}

impl TemplateManager for EmbeddedTemplateManager {
    fn get_key(&self, name: &str, resolve_kind: ResolveKind, context: Option<&ResolveContext>) -> SharedKey {
        Arc::new(NameOnlyTemplateKey::new(name, resolve_kind, context.cloned()))
    }

    fn resolve(&self, key: &dyn TemplateKey) -> Result<TemplateSource> {
        let resource = self.resource_name(key.name());
        self.templates
            .get(&resource)
            .map(|text| TemplateSource::new(*text))
            .ok_or_else(|| Error::not_found(key.name(), format!("no embedded resource named '{resource}'")))
    }

    fn add_dynamic(&self, _key: &dyn TemplateKey, _source: TemplateSource) -> Result<()> {
        Err(Error::UnsupportedOperation {
            operation: "add_dynamic",
            manager: "EmbeddedTemplateManager",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_without_namespace() {
        let manager = EmbeddedTemplateManager::new([("index", "body")]);
        let key = manager.get_key("index", ResolveKind::Global, None);
        assert_eq!(manager.resolve(key.as_ref()).unwrap().template(), "body");
    }

    #[test]
    fn namespace_is_applied_to_lookups() {
        let manager = EmbeddedTemplateManager::new([("app.views.index", "body")]).with_namespace("app.views");
        let key = manager.get_key("index", ResolveKind::Global, None);
        assert_eq!(manager.resolve(key.as_ref()).unwrap().template(), "body");

        let unqualified = EmbeddedTemplateManager::new([("index", "body")]).with_namespace("app.views");
        assert!(unqualified.resolve(key.as_ref()).is_err());
    }

    #[test]
    fn add_dynamic_is_unsupported() {
        let manager = EmbeddedTemplateManager::new([("index", "body")]);
        let key = manager.get_key("other", ResolveKind::Global, None);

        let error = manager.add_dynamic(key.as_ref(), TemplateSource::new("x")).unwrap_err();
        assert!(matches!(error, Error::UnsupportedOperation { operation: "add_dynamic", .. }));
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use stencil_source::{ModelType, SharedKey, TemplateKey};

use crate::{CachingProvider, CompiledArtifact, Error, LoadContext, Result, model_type_key};

type ByModelType = HashMap<ModelType, Arc<CompiledArtifact>>;

/// The standard in-memory caching provider.
///
/// Entries for different templates live in different shards, so a writer updating one template
/// does not block readers of unrelated templates. When an artifact's code declares a model type
/// other than the one it was requested with, the artifact is indexed under both.
///
/// # Examples
///
/// ```
/// use stencil::{CachingProvider, DefaultCachingProvider};
/// use stencil_source::{ModelType, NameOnlyTemplateKey, ResolveKind};
///
/// let provider = DefaultCachingProvider::new();
/// let key = NameOnlyTemplateKey::new("page", ResolveKind::Global, None);
///
/// assert!(provider.try_retrieve_template(&key, Some(&ModelType::named("Person"))).is_none());
/// assert!(provider.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct DefaultCachingProvider {
    entries: DashMap<String, ByModelType>,
    load_context: LoadContext,
    disposed: AtomicBool,
}

impl DefaultCachingProvider {
    /// Creates an empty provider with its own load context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `(key, model type)` entries, counting secondary entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct templates with at least one entry.
    #[must_use]
    pub fn template_count(&self) -> usize {
        self.entries.len()
    }
}

impl CachingProvider for DefaultCachingProvider {
    fn cache_template(&self, artifact: Arc<CompiledArtifact>, key: &SharedKey) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }

        let expected = key.unique_key_string();
        let actual = artifact.key().unique_key_string();
        if expected != actual {
            return Err(Error::CacheKeyConflict { expected, actual });
        }

        artifact.build_resources().ensure_registered();

        let requested = model_type_key(artifact.model_type());
        let declared = artifact.declared_model_type().map(|t| model_type_key(Some(&t)));

        let mut by_model_type = self.entries.entry(expected).or_default();
        if let Some(declared) = declared.filter(|d| *d != requested) {
            by_model_type.insert(declared, Arc::clone(&artifact));
        }
        by_model_type.insert(requested, artifact);
        Ok(())
    }

    fn try_retrieve_template(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>) -> Option<Arc<CompiledArtifact>> {
        let by_model_type = self.entries.get(&key.unique_key_string())?;
        by_model_type.get(&model_type_key(model_type)).cloned()
    }

    fn invalidate(&self, key: &dyn TemplateKey) {
        let removed = self.entries.remove(&key.unique_key_string());
        if let Some((unique, by_model_type)) = removed {
            tracing::debug!(template.key = %unique, cache.removed = by_model_type.len(), "cache.invalidated");
        }
    }

    fn invalidate_of_type(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>) {
        let unique = key.unique_key_string();
        let model_type = model_type_key(model_type);

        if let Some(mut by_model_type) = self.entries.get_mut(&unique) {
            by_model_type.remove(&model_type);
        }
        self.entries.remove_if(&unique, |_, by_model_type| by_model_type.is_empty());
    }

    fn invalidate_where(&self, key: &dyn TemplateKey, evict: &dyn Fn(&CompiledArtifact) -> bool) {
        let unique = key.unique_key_string();

        if let Some(mut by_model_type) = self.entries.get_mut(&unique) {
            by_model_type.retain(|_, artifact| !evict(artifact));
        }
        self.entries.remove_if(&unique, |_, by_model_type| by_model_type.is_empty());
    }

    fn load_context(&self) -> &LoadContext {
        &self.load_context
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.entries.clear();
        self.load_context.unload();
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;
    use stencil_cleanup::testing::{RecordingRegistry, RegistryOp};
    use stencil_source::{NameOnlyTemplateKey, ResolveKind};

    use super::*;
    use crate::provider::test_support::artifact;

    fn key(name: &str) -> SharedKey {
        Arc::new(NameOnlyTemplateKey::new(name, ResolveKind::Global, None))
    }

    fn person() -> ModelType {
        ModelType::named("Person")
    }

    #[test]
    fn thread_safe_type() {
        assert_impl_all!(DefaultCachingProvider: Send, Sync);
    }

    #[test]
    fn retrieves_what_was_cached() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let page = key("page");
        let cached = artifact(&page, Some(person()), None, &registry);

        provider.cache_template(Arc::clone(&cached), &page).unwrap();

        let found = provider.try_retrieve_template(page.as_ref(), Some(&person())).unwrap();
        assert!(Arc::ptr_eq(&found, &cached));
        assert!(provider.try_retrieve_template(page.as_ref(), None).is_none());
        assert!(provider.try_retrieve_template(key("other").as_ref(), Some(&person())).is_none());
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn later_store_replaces_earlier() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let page = key("page");
        let first = artifact(&page, Some(person()), None, &registry);
        let second = artifact(&page, Some(person()), None, &registry);

        provider.cache_template(first, &page).unwrap();
        provider.cache_template(Arc::clone(&second), &page).unwrap();

        let found = provider.try_retrieve_template(page.as_ref(), Some(&person())).unwrap();
        assert_eq!(found.id(), second.id());
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn declared_model_type_is_indexed_too() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let page = key("page");

        provider
            .cache_template(artifact(&page, None, Some(person()), &registry), &page)
            .unwrap();

        assert!(provider.try_retrieve_template(page.as_ref(), None).is_some());
        assert!(provider.try_retrieve_template(page.as_ref(), Some(&person())).is_some());
        assert_eq!(provider.len(), 2);
        assert_eq!(provider.template_count(), 1);
    }

    #[test]
    fn dynamic_model_types_share_an_entry() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let page = key("page");

        provider
            .cache_template(artifact(&page, Some(ModelType::dynamic()), None, &registry), &page)
            .unwrap();

        assert!(provider.try_retrieve_template(page.as_ref(), None).is_some());
        assert!(provider
            .try_retrieve_template(page.as_ref(), Some(&ModelType::anonymous("{Name}")))
            .is_some());
        assert!(provider.try_retrieve_template(page.as_ref(), Some(&person())).is_none());
    }

    #[test]
    fn key_mismatch_is_rejected() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let compiled_for = key("a");

        let error = provider
            .cache_template(artifact(&compiled_for, None, None, &registry), &key("b"))
            .unwrap_err();

        assert!(matches!(error, Error::CacheKeyConflict { ref expected, ref actual } if expected == "b" && actual == "a"));
        assert!(provider.is_empty());
    }

    #[test]
    fn caching_registers_build_output() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let page = key("page");
        let cached = artifact(&page, None, None, &registry);
        let path = cached.build_resources().path().to_path_buf();

        provider.cache_template(cached, &page).unwrap();

        let registrations = registry
            .operations()
            .into_iter()
            .filter(|op| *op == RegistryOp::Register(path.clone()))
            .count();
        assert_eq!(registrations, 2);
        assert_eq!(registry.registered(), vec![path]);
    }

    #[test]
    fn invalidate_removes_every_model_type() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let page = key("page");
        provider.cache_template(artifact(&page, None, None, &registry), &page).unwrap();
        provider
            .cache_template(artifact(&page, Some(person()), None, &registry), &page)
            .unwrap();

        provider.invalidate(page.as_ref());

        assert!(provider.is_empty());
        assert!(provider.try_retrieve_template(page.as_ref(), None).is_none());
    }

    #[test]
    fn invalidate_of_type_keeps_other_types() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let page = key("page");
        provider.cache_template(artifact(&page, None, None, &registry), &page).unwrap();
        provider
            .cache_template(artifact(&page, Some(person()), None, &registry), &page)
            .unwrap();

        provider.invalidate_of_type(page.as_ref(), Some(&person()));
        assert!(provider.try_retrieve_template(page.as_ref(), Some(&person())).is_none());
        assert!(provider.try_retrieve_template(page.as_ref(), None).is_some());

        provider.invalidate_of_type(page.as_ref(), None);
        assert!(provider.is_empty());
        assert_eq!(provider.template_count(), 0);
    }

    #[test]
    fn invalidate_where_keeps_unmatched_entries() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let page = key("page");
        let doomed = artifact(&page, None, None, &registry);
        let doomed_id = doomed.id();
        provider.cache_template(doomed, &page).unwrap();
        provider
            .cache_template(artifact(&page, Some(person()), None, &registry), &page)
            .unwrap();

        provider.invalidate_where(page.as_ref(), &|cached| cached.id() == doomed_id);

        assert!(provider.try_retrieve_template(page.as_ref(), None).is_none());
        assert!(provider.try_retrieve_template(page.as_ref(), Some(&person())).is_some());

        provider.invalidate_where(page.as_ref(), &|_| true);
        assert_eq!(provider.template_count(), 0);
    }

    #[test]
    fn dropping_the_last_reference_reclaims_build_output() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let page = key("page");
        let cached = artifact(&page, None, None, &registry);
        let path = cached.build_resources().path().to_path_buf();
        provider.cache_template(cached, &page).unwrap();
        assert!(path.exists());

        provider.invalidate(page.as_ref());

        assert!(!path.exists());
        assert!(registry.registered().is_empty());
    }

    #[test]
    fn dispose_clears_and_unloads() {
        let registry = RecordingRegistry::new();
        let provider = DefaultCachingProvider::new();
        let page = key("page");
        provider.cache_template(artifact(&page, None, None, &registry), &page).unwrap();

        provider.dispose();
        provider.dispose();

        assert!(provider.is_empty());
        assert!(provider.load_context().is_unloaded());
        assert!(matches!(
            provider.cache_template(artifact(&page, None, None, &registry), &page),
            Err(Error::Disposed)
        ));
    }
}

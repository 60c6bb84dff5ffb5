// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use stencil_source::{ModelType, SharedKey, TemplateKey};

use crate::{CachingProvider, CompiledArtifact, DefaultCachingProvider, LoadContext, Result};

/// Wraps a provider and evicts entries whose template file changed since it was compiled.
///
/// A lookup with a key that carries a modification time compares it against the key the cached
/// artifact was compiled for. On a mismatch the lookup misses and every entry compiled from an
/// older version of the file is evicted, so unlike other providers a lookup here can change the
/// cache. Entries compiled from the requested version or a newer one stay in place.
#[derive(Debug, Default)]
pub struct InvalidatingByModifiedTime<P = DefaultCachingProvider> {
    inner: P,
}

impl<P: CachingProvider> InvalidatingByModifiedTime<P> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    /// The wrapped provider.
    #[must_use]
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: CachingProvider> CachingProvider for InvalidatingByModifiedTime<P> {
    fn cache_template(&self, artifact: Arc<CompiledArtifact>, key: &SharedKey) -> Result<()> {
        self.inner.cache_template(artifact, key)
    }

    fn try_retrieve_template(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>) -> Option<Arc<CompiledArtifact>> {
        let artifact = self.inner.try_retrieve_template(key, model_type)?;

        let Some(requested) = key.modified_time() else {
            return Some(artifact);
        };

        if artifact.key().modified_time() == Some(requested) {
            return Some(artifact);
        }

        tracing::debug!(template.key = %key.unique_key_string(), "cache.stale");
        self.inner.invalidate_where(key, &|cached| {
            cached.key().modified_time().is_none_or(|modified| modified < requested)
        });
        None
    }

    fn invalidate(&self, key: &dyn TemplateKey) {
        self.inner.invalidate(key);
    }

    fn invalidate_of_type(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>) {
        self.inner.invalidate_of_type(key, model_type);
    }

    fn invalidate_where(&self, key: &dyn TemplateKey, evict: &dyn Fn(&CompiledArtifact) -> bool) {
        self.inner.invalidate_where(key, evict);
    }

    fn load_context(&self) -> &LoadContext {
        self.inner.load_context()
    }

    fn dispose(&self) {
        self.inner.dispose();
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use stencil_cleanup::BuildResources;
use stencil_source::{ModelType, SharedKey, TemplateSource};

use crate::{CompiledCode, LoadContext};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A compiled template: the unit the cache stores.
///
/// Artifacts are immutable and compared by identity, never by value: two compiles of the same
/// text produce two distinct artifacts. When the last reference to the artifact is dropped, its
/// code is released from the load context and its build resources are reclaimed.
pub struct CompiledArtifact {
    id: u64,
    key: SharedKey,
    source: TemplateSource,
    code: Arc<dyn CompiledCode>,
    model_type: Option<ModelType>,
    build_resources: Arc<BuildResources>,
    load_context: LoadContext,
}

impl CompiledArtifact {
    pub(crate) fn new(
        key: SharedKey,
        source: TemplateSource,
        code: Arc<dyn CompiledCode>,
        model_type: Option<ModelType>,
        build_resources: Arc<BuildResources>,
        load_context: LoadContext,
    ) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            key,
            source,
            code,
            model_type,
            build_resources,
            load_context,
        }
    }

    /// Process-unique identifier of this compile result.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The key the template was compiled for.
    #[must_use]
    pub fn key(&self) -> &SharedKey {
        &self.key
    }

    /// The source the template was compiled from.
    #[must_use]
    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    /// The compiled code.
    #[must_use]
    pub fn code(&self) -> &Arc<dyn CompiledCode> {
        &self.code
    }

    /// The model type the template was requested with, `None` for no model.
    #[must_use]
    pub fn model_type(&self) -> Option<&ModelType> {
        self.model_type.as_ref()
    }

    /// The model type the compiled code declares for itself, if any.
    #[must_use]
    pub fn declared_model_type(&self) -> Option<ModelType> {
        self.code.declared_model_type()
    }

    /// The build output backing this artifact.
    #[must_use]
    pub fn build_resources(&self) -> &Arc<BuildResources> {
        &self.build_resources
    }

    /// The context the code was loaded into.
    #[must_use]
    pub fn load_context(&self) -> &LoadContext {
        &self.load_context
    }
}

impl Drop for CompiledArtifact {
    fn drop(&mut self) {
        self.load_context.release(self.id);
    }
}

impl fmt::Debug for CompiledArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledArtifact")
            .field("id", &self.id)
            .field("key", &self.key.unique_key_string())
            .field("model_type", &self.model_type)
            .field("build_dir", &self.build_resources.path())
            .finish_non_exhaustive()
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Storage of compiled artifacts.

mod default;
mod invalidating;

use std::{fmt::Debug, sync::Arc};

use stencil_source::{ModelType, SharedKey, TemplateKey};

use crate::{CompiledArtifact, LoadContext, Result};

pub use default::DefaultCachingProvider;
pub use invalidating::InvalidatingByModifiedTime;

/// Stores compiled artifacts by template identity and model type.
///
/// The index is two-level: the key's [`unique_key_string`](TemplateKey::unique_key_string), then
/// the model type normalized by [`model_type_key`].
pub trait CachingProvider: Debug + Send + Sync {
    /// Stores `artifact` under `key`, replacing any entry for the same model type.
    ///
    /// The artifact's build resources are registered for cleanup before the entry becomes
    /// visible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheKeyConflict`](crate::Error::CacheKeyConflict) if the artifact was
    /// compiled for a different key, or [`Error::Disposed`](crate::Error::Disposed) after disposal.
    fn cache_template(&self, artifact: Arc<CompiledArtifact>, key: &SharedKey) -> Result<()>;

    /// Looks up an artifact. Never compiles.
    fn try_retrieve_template(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>) -> Option<Arc<CompiledArtifact>>;

    /// Removes every model type cached for `key`.
    fn invalidate(&self, key: &dyn TemplateKey);

    /// Removes the entry for `key` and a single model type.
    fn invalidate_of_type(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>);

    /// Removes the entries for `key` whose artifact matches `evict`, as one step with respect to
    /// concurrent stores, and keeps the rest.
    fn invalidate_where(&self, key: &dyn TemplateKey, evict: &dyn Fn(&CompiledArtifact) -> bool);

    /// The context the artifacts stored here are loaded into.
    fn load_context(&self) -> &LoadContext;

    /// Drops every entry and unloads the load context. Safe to call more than once.
    fn dispose(&self);
}

/// Normalizes a model type for use as a cache index.
///
/// No model, dynamic models and anonymous models all map to [`ModelType::dynamic`], so a
/// template compiled against the dynamic placeholder is found whichever of these is requested.
/// Every other type maps to itself.
///
/// ```
/// use stencil::model_type_key;
/// use stencil_source::ModelType;
///
/// assert_eq!(model_type_key(None), ModelType::dynamic());
/// assert_eq!(model_type_key(Some(&ModelType::anonymous("{Name}"))), ModelType::dynamic());
/// assert_eq!(model_type_key(Some(&ModelType::named("Person"))), ModelType::named("Person"));
/// ```
#[must_use]
pub fn model_type_key(model_type: Option<&ModelType>) -> ModelType {
    match model_type {
        Some(model_type) if !model_type.is_dynamic() => model_type.clone(),
        _ => ModelType::dynamic(),
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use stencil_source::{ModelType, ResolveContext, ResolveKind, SharedKey, TemplateKey, TemplateSource};

use crate::{CompiledArtifact, EngineConfig, EngineCore, Error, Model, Result, ViewBag, model_type_key};

/// The public entry point: resolve, compile, cache and run templates.
///
/// Every operation that accepts a model first applies the engine's
/// [`ModelPolicy`](crate::ModelPolicy), and every operation fails with [`Error::Disposed`] once
/// the service has been disposed. Dropping the service disposes it.
///
/// # Examples
///
/// ```
/// use stencil::{EngineConfig, EngineService, Model, ViewBag};
/// use stencil_source::{ModelType, ResolveKind, TemplateSource};
///
/// let engine = EngineService::new(EngineConfig::default());
/// let key = engine.get_key("row", ResolveKind::Global, None);
/// engine.add_template(key.as_ref(), TemplateSource::new("<td>@Model.Id</td>"))?;
///
/// let model = Model::anonymous(&serde_json::json!({ "Id": 7 }))?;
/// let model_type = ModelType::dynamic();
///
/// engine.compile_and_cache(&key, Some(&model_type))?;
/// assert!(engine.is_template_cached(key.as_ref(), Some(&model_type)));
///
/// let mut html = String::new();
/// engine.run_cached(key.as_ref(), &mut html, Some(&model_type), model, &ViewBag::new())?;
/// assert_eq!(html, "<td>7</td>");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct EngineService {
    core: EngineCore,
    disposed: AtomicBool,
}

impl EngineService {
    /// Creates a service from `config`.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            core: EngineCore::new(config),
            disposed: AtomicBool::new(false),
        }
    }

    /// The engine behind this service.
    #[must_use]
    pub fn core(&self) -> &EngineCore {
        &self.core
    }

    /// Computes the key for template `name` through the configured template manager.
    #[must_use]
    pub fn get_key(&self, name: &str, resolve_kind: ResolveKind, context: Option<&ResolveContext>) -> SharedKey {
        self.core.template_manager().get_key(name, resolve_kind, context)
    }

    /// Registers template text under `key` with the template manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`] if the manager does not accept runtime templates or already
    /// holds different text for the key.
    pub fn add_template(&self, key: &dyn TemplateKey, source: TemplateSource) -> Result<()> {
        self.ensure_live()?;
        Ok(self.core.template_manager().add_dynamic(key, source)?)
    }

    /// Compiles `key` for `model_type` and caches the result, replacing any cached entry.
    ///
    /// # Errors
    ///
    /// Returns any resolution, compilation or caching error.
    pub fn compile_and_cache(&self, key: &SharedKey, model_type: Option<&ModelType>) -> Result<Arc<CompiledArtifact>> {
        self.ensure_live()?;
        let artifact = self.core.compile(key, model_type)?;
        self.core.store(&artifact, key)?;
        Ok(artifact)
    }

    /// Runs a template that must already be cached.
    ///
    /// When `model_type` is `None` the model's own type is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCached`] if nothing is cached for the key and model type, plus any
    /// model policy or render error.
    pub fn run_cached(
        &self,
        key: &dyn TemplateKey,
        writer: &mut dyn fmt::Write,
        model_type: Option<&ModelType>,
        model: Model,
        viewbag: &ViewBag,
    ) -> Result<()> {
        self.ensure_live()?;
        let model = self.core.model_policy().apply(model)?;
        let model_type = model_type.cloned().or_else(|| model.model_type());

        let artifact = self
            .core
            .lookup(key, model_type.as_ref())
            .ok_or_else(|| Error::NotCached {
                key: key.unique_key_string(),
                model_type: model_type_key(model_type.as_ref()).to_string(),
            })?;

        self.core.run_template(&artifact, writer, &model, viewbag)
    }

    /// Runs a template, compiling and caching it first if needed.
    ///
    /// When `model_type` is `None` the model's own type is used.
    ///
    /// # Errors
    ///
    /// Returns any model policy, resolution, compilation, caching or render error.
    pub fn run_compile(
        &self,
        key: &SharedKey,
        writer: &mut dyn fmt::Write,
        model_type: Option<&ModelType>,
        model: Model,
        viewbag: &ViewBag,
    ) -> Result<()> {
        self.ensure_live()?;
        let model = self.core.model_policy().apply(model)?;
        let model_type = model_type.cloned().or_else(|| model.model_type());

        let artifact = self.core.get_or_compile(key, model_type.as_ref())?;
        self.core.run_template(&artifact, writer, &model, viewbag)
    }

    /// Like [`run_compile`](Self::run_compile), returning the output as a string.
    ///
    /// # Errors
    ///
    /// Returns any error [`run_compile`](Self::run_compile) returns.
    pub fn run_compile_to_string(
        &self,
        key: &SharedKey,
        model_type: Option<&ModelType>,
        model: Model,
        viewbag: &ViewBag,
    ) -> Result<String> {
        let mut output = String::new();
        self.run_compile(key, &mut output, model_type, model, viewbag)?;
        Ok(output)
    }

    /// Whether a compiled artifact is cached for `key` and `model_type`.
    ///
    /// Always `false` without a caching provider or after disposal.
    #[must_use]
    pub fn is_template_cached(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>) -> bool {
        !self.is_disposed() && self.core.peek(key, model_type).is_some()
    }

    /// Removes every cached model type for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after disposal.
    pub fn invalidate(&self, key: &dyn TemplateKey) -> Result<()> {
        self.ensure_live()?;
        self.core.invalidate(key);
        Ok(())
    }

    /// Removes the cached entry for `key` and `model_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after disposal.
    pub fn invalidate_of_type(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>) -> Result<()> {
        self.ensure_live()?;
        self.core.invalidate_of_type(key, model_type);
        Ok(())
    }

    /// Drops every cached artifact and unloads their code once nothing is running against it.
    ///
    /// Safe to call more than once.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.core.dispose();
        }
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() { Err(Error::Disposed) } else { Ok(()) }
    }
}

impl Drop for EngineService {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for EngineService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineService")
            .field("core", &self.core)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn thread_safe_type() {
        assert_impl_all!(EngineService: Send, Sync);
        assert_impl_all!(EngineCore: Send, Sync);
    }

    #[test]
    fn operations_fail_after_dispose() {
        let engine = EngineService::new(EngineConfig::builder().logging(false).build());
        let key = engine.get_key("page", ResolveKind::Global, None);
        engine.add_template(key.as_ref(), TemplateSource::new("x")).unwrap();

        engine.dispose();
        engine.dispose();

        assert!(engine.is_disposed());
        assert!(matches!(
            engine.add_template(key.as_ref(), TemplateSource::new("x")),
            Err(Error::Disposed)
        ));
        assert!(matches!(engine.compile_and_cache(&key, None), Err(Error::Disposed)));
        assert!(matches!(
            engine.run_compile_to_string(&key, None, Model::None, &ViewBag::new()),
            Err(Error::Disposed)
        ));
        assert!(matches!(engine.invalidate(key.as_ref()), Err(Error::Disposed)));
        assert!(!engine.is_template_cached(key.as_ref(), None));
    }

    #[test]
    fn run_cached_requires_cached_entry() {
        let engine = EngineService::new(EngineConfig::builder().logging(false).build());
        let key = engine.get_key("page", ResolveKind::Global, None);
        engine.add_template(key.as_ref(), TemplateSource::new("x")).unwrap();

        let mut out = String::new();
        let error = engine
            .run_cached(key.as_ref(), &mut out, None, Model::None, &ViewBag::new())
            .unwrap_err();

        match error {
            Error::NotCached { key, model_type } => {
                assert_eq!(key, "page");
                assert_eq!(model_type, ModelType::DYNAMIC_PLACEHOLDER);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(out.is_empty());
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fmt,
    path::PathBuf,
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use stencil_cleanup::{BuildResources, CleanupRegistry, SweepingRegistry};
use stencil_source::{ModelType, ResolveContext, ResolveKind, SharedKey, TemplateKey, TemplateManager};

use crate::{
    CachingProvider, CompileFailure, CompileOutput, CompileRequest, CompiledArtifact, Compiler, Encoder, EngineConfig, Error,
    LoadContext, Model, ModelPolicy, Result, RunnableTemplate, TemplateCompilationError, ViewBag,
    flight::{CompileFlight, Role},
    model_type_key,
    telemetry::{EngineActivity, EngineOperation, EngineTelemetry, timed},
};

const BUILD_DIR_PREFIX: &str = "stencil-";

type FlightKey = (String, ModelType);

/// Resolves, compiles, caches and runs templates.
///
/// `EngineCore` is the shared machinery behind [`EngineService`](crate::EngineService) and the
/// target of layout and include resolution while a template runs. Compilation always happens
/// outside of any cache lock; concurrent compiles of the same key and model type are coalesced
/// unless single-flight is disabled in the configuration.
pub struct EngineCore {
    telemetry: EngineTelemetry,
    manager: Arc<dyn TemplateManager>,
    provider: Option<Arc<dyn CachingProvider>>,
    compiler: Arc<dyn Compiler>,
    encoder: Arc<dyn Encoder>,
    model_policy: ModelPolicy,
    base_template_type: Option<String>,
    namespaces: Vec<String>,
    compile_timeout: Option<Duration>,
    temp_root: PathBuf,
    cleanup_registry: Arc<dyn CleanupRegistry>,
    owned_registry: Option<SweepingRegistry>,
    retain_build_output: bool,
    flight: Option<CompileFlight<FlightKey, Arc<CompiledArtifact>>>,
    load_context: LoadContext,
}

impl EngineCore {
    pub(crate) fn new(config: EngineConfig) -> Self {
        let load_context = config
            .caching_provider
            .as_ref()
            .map_or_else(LoadContext::new, |provider| provider.load_context().clone());

        Self {
            telemetry: config.telemetry,
            manager: config.template_manager,
            provider: config.caching_provider,
            compiler: config.compiler,
            encoder: config.encoder,
            model_policy: config.model_policy,
            base_template_type: config.base_template_type,
            namespaces: config.namespaces,
            compile_timeout: config.compile_timeout,
            temp_root: config.temp_root,
            cleanup_registry: config.cleanup_registry,
            owned_registry: config.owned_registry,
            retain_build_output: config.retain_build_output,
            flight: config.single_flight.then(CompileFlight::new),
            load_context,
        }
    }

    /// Name of the engine as it appears in logs and metrics.
    #[must_use]
    pub fn name(&self) -> &str {
        self.telemetry.name()
    }

    /// Where template sources come from.
    #[must_use]
    pub fn template_manager(&self) -> &Arc<dyn TemplateManager> {
        &self.manager
    }

    /// Where compiled artifacts are kept, `None` when caching is disabled.
    #[must_use]
    pub fn caching_provider(&self) -> Option<&Arc<dyn CachingProvider>> {
        self.provider.as_ref()
    }

    /// Encoder applied to interpolated values.
    #[must_use]
    pub fn encoder(&self) -> &dyn Encoder {
        self.encoder.as_ref()
    }

    /// How dynamic and anonymous models are treated.
    #[must_use]
    pub fn model_policy(&self) -> ModelPolicy {
        self.model_policy
    }

    /// The load context newly compiled code is registered in.
    #[must_use]
    pub fn load_context(&self) -> &LoadContext {
        &self.load_context
    }

    /// Compiles `key` for `model_type` without consulting or updating the cache.
    ///
    /// The build output is kept on disk if compilation fails, times out or
    /// retention is configured, and stays registered for cleanup either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`] if the template cannot be resolved, [`Error::Compilation`] with
    /// the compiler's diagnostics, [`Error::CompilationTimeout`] or [`Error::Loading`] if the
    /// compiled code cannot be loaded.
    pub fn compile(&self, key: &SharedKey, model_type: Option<&ModelType>) -> Result<Arc<CompiledArtifact>> {
        let (result, duration) = timed(|| self.compile_uninstrumented(key, model_type));

        let activity = match &result {
            Ok(_) => EngineActivity::Compiled,
            Err(Error::CompilationTimeout { .. }) => EngineActivity::TimedOut,
            Err(_) => EngineActivity::Failed,
        };
        self.telemetry
            .record(&key.unique_key_string(), EngineOperation::Compile, activity, Some(duration));

        result
    }

    fn compile_uninstrumented(&self, key: &SharedKey, model_type: Option<&ModelType>) -> Result<Arc<CompiledArtifact>> {
        let unique = key.unique_key_string();
        let source = self.manager.resolve(key.as_ref())?;
        let resources = Arc::new(BuildResources::create(
            &self.temp_root,
            BUILD_DIR_PREFIX,
            Arc::clone(&self.cleanup_registry),
        )?);

        let request = CompileRequest {
            source: source.clone(),
            key: Arc::clone(key),
            model_type: model_type.cloned(),
            base_template_type: self.base_template_type.clone(),
            namespaces: self.namespaces.clone(),
            build_dir: resources.path().to_path_buf(),
        };

        let output = match self.invoke_compiler(request, &unique) {
            Ok(Ok(output)) => output,
            Ok(Err(failure)) => {
                resources.retain();
                return Err(TemplateCompilationError {
                    template: key.name().to_string(),
                    generated: failure.generated,
                    diagnostics: failure.diagnostics,
                    build_resources: resources,
                }
                .into());
            }
            Err(e) => {
                resources.retain();
                return Err(e);
            }
        };

        if self.retain_build_output {
            resources.retain();
        }

        let artifact = Arc::new(CompiledArtifact::new(
            Arc::clone(key),
            source,
            output.code,
            model_type.cloned(),
            resources,
            self.load_context.clone(),
        ));

        if let Err(e) = self.load_context.register(artifact.id(), &unique) {
            tracing::error!(
                engine.name = self.name(),
                template.key = unique,
                error = %e,
                "compiled code could not be registered"
            );
            return Err(e);
        }

        Ok(artifact)
    }

    fn invoke_compiler(
        &self,
        request: CompileRequest,
        unique: &str,
    ) -> Result<std::result::Result<CompileOutput, CompileFailure>> {
        let Some(timeout) = self.compile_timeout else {
            return Ok(self.compiler.compile(&request));
        };

        let (tx, rx) = mpsc::sync_channel(1);
        let compiler = Arc::clone(&self.compiler);
        thread::Builder::new().name("stencil compile".to_string()).spawn(move || {
            // The receiver is gone if the caller already timed out.
            let _ = tx.send(compiler.compile(&request));
        })?;

        match rx.recv_timeout(timeout) {
            Ok(outcome) => Ok(outcome),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::CompilationTimeout {
                key: unique.to_string(),
                timeout,
            }),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::Loading {
                key: unique.to_string(),
                reason: "the compiler exited without producing a result".to_string(),
            }),
        }
    }

    /// Resolves template `name`, compiling it if needed, and binds it to `model` and `viewbag`.
    ///
    /// `model_type` overrides the model's own type when deciding which compiled variant to use.
    /// Layouts and includes are resolved through here with the key and model type of the
    /// template that referenced them as `context`.
    ///
    /// # Errors
    ///
    /// Returns any error [`compile`](Self::compile) or the caching provider raises.
    pub fn resolve_internal(
        &self,
        name: &str,
        model: &Model,
        model_type: Option<&ModelType>,
        resolve_kind: ResolveKind,
        context: Option<&ResolveContext>,
        viewbag: &ViewBag,
    ) -> Result<RunnableTemplate> {
        let key = self.manager.get_key(name, resolve_kind, context);
        let model_type = model_type.cloned().or_else(|| model.model_type());
        let artifact = self.get_or_compile(&key, model_type.as_ref())?;
        Ok(RunnableTemplate::new(artifact, model.clone(), viewbag.clone()))
    }

    pub(crate) fn get_or_compile(&self, key: &SharedKey, model_type: Option<&ModelType>) -> Result<Arc<CompiledArtifact>> {
        if let Some(artifact) = self.lookup(key.as_ref(), model_type) {
            return Ok(artifact);
        }

        let compile_and_store = || -> Result<Arc<CompiledArtifact>> {
            // Another caller may have finished while this one was waiting for the flight.
            if let Some(artifact) = self.peek(key.as_ref(), model_type) {
                return Ok(artifact);
            }
            let artifact = self.compile(key, model_type)?;
            self.store(&artifact, key)?;
            Ok(artifact)
        };

        let Some(flight) = &self.flight else {
            return compile_and_store();
        };

        let unique = key.unique_key_string();
        let (result, role) = flight.work((unique.clone(), model_type_key(model_type)), &compile_and_store);
        if role == Role::Leader {
            return result;
        }

        self.telemetry
            .record(&unique, EngineOperation::Resolve, EngineActivity::Coalesced, None);
        let shared = result?;
        if self.provider.is_none() {
            return Ok(shared);
        }

        // The entry may have been invalidated after the leader stored it.
        match self.peek(key.as_ref(), model_type) {
            Some(current) => Ok(current),
            None => {
                tracing::debug!(engine.name = self.name(), template.key = unique, "engine.coalesced_result_invalidated");
                compile_and_store()
            }
        }
    }

    /// Looks up a cached artifact, recording the hit or miss.
    pub(crate) fn lookup(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>) -> Option<Arc<CompiledArtifact>> {
        let found = self.peek(key, model_type);
        let activity = if found.is_some() {
            EngineActivity::Hit
        } else {
            EngineActivity::Miss
        };
        self.telemetry
            .record(&key.unique_key_string(), EngineOperation::Resolve, activity, None);
        found
    }

    /// Looks up a cached artifact without recording anything.
    pub(crate) fn peek(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>) -> Option<Arc<CompiledArtifact>> {
        self.provider
            .as_ref()
            .and_then(|provider| provider.try_retrieve_template(key, model_type))
    }

    /// Caches `artifact` under `key`. A no-op when caching is disabled.
    pub(crate) fn store(&self, artifact: &Arc<CompiledArtifact>, key: &SharedKey) -> Result<()> {
        let Some(provider) = &self.provider else {
            return Ok(());
        };
        provider.cache_template(Arc::clone(artifact), key)?;
        self.telemetry
            .record(&key.unique_key_string(), EngineOperation::Cache, EngineActivity::Cached, None);
        Ok(())
    }

    /// Runs `artifact` with `model` and `viewbag`, writing the output to `writer`.
    ///
    /// The model is used as given; apply the [`ModelPolicy`] first if it came from a caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] if the template or one of its layouts or includes fails.
    pub fn run_template(
        &self,
        artifact: &Arc<CompiledArtifact>,
        writer: &mut dyn fmt::Write,
        model: &Model,
        viewbag: &ViewBag,
    ) -> Result<()> {
        let template = RunnableTemplate::new(Arc::clone(artifact), model.clone(), viewbag.clone());
        let (result, duration) = timed(|| template.run(self, writer));

        let activity = if result.is_ok() {
            EngineActivity::Rendered
        } else {
            EngineActivity::Failed
        };
        self.telemetry.record(
            &artifact.key().unique_key_string(),
            EngineOperation::Run,
            activity,
            Some(duration),
        );

        result
    }

    /// Removes every cached model type for `key`.
    pub fn invalidate(&self, key: &dyn TemplateKey) {
        if let Some(provider) = &self.provider {
            provider.invalidate(key);
            self.telemetry.record(
                &key.unique_key_string(),
                EngineOperation::Invalidate,
                EngineActivity::Invalidated,
                None,
            );
        }
    }

    /// Removes the cached entry for `key` and one model type.
    pub fn invalidate_of_type(&self, key: &dyn TemplateKey, model_type: Option<&ModelType>) {
        if let Some(provider) = &self.provider {
            provider.invalidate_of_type(key, model_type);
            self.telemetry.record(
                &key.unique_key_string(),
                EngineOperation::Invalidate,
                EngineActivity::Invalidated,
                None,
            );
        }
    }

    pub(crate) fn dispose(&self) {
        match &self.provider {
            Some(provider) => provider.dispose(),
            None => self.load_context.unload(),
        }
        // Retained output of failed and timed-out compiles has no other owner.
        if let Some(registry) = &self.owned_registry {
            let report = registry.sweep();
            tracing::debug!(
                engine.name = self.name(),
                cleanup.removed = report.removed.len(),
                cleanup.failed = report.failed.len(),
                "engine.build_output_swept"
            );
        }
        self.telemetry
            .record("", EngineOperation::Dispose, EngineActivity::Disposed, None);
    }
}

impl fmt::Debug for EngineCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCore")
            .field("name", &self.name())
            .field("manager", &self.manager)
            .field("provider", &self.provider)
            .field("compiler", &self.compiler)
            .field("model_policy", &self.model_policy)
            .field("compile_timeout", &self.compile_timeout)
            .field("temp_root", &self.temp_root)
            .finish_non_exhaustive()
    }
}

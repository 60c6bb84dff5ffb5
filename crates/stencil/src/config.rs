// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{path::PathBuf, sync::Arc, time::Duration};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Meter, MeterProvider};
use stencil_cleanup::{CleanupRegistry, SweepingRegistry};
use stencil_source::{DelegateTemplateManager, TemplateManager};

use crate::{
    CachingProvider, Compiler, DefaultCachingProvider, Encoder, HtmlEncoder, InterpolationCompiler, ModelPolicy,
    telemetry::EngineTelemetry,
};

const DEFAULT_NAME: &str = "stencil";

/// Configuration of an [`EngineService`](crate::EngineService).
///
/// Built with [`EngineConfig::builder`]. Every setting has a default:
///
/// | Setting | Default |
/// |---|---|
/// | template manager | [`DelegateTemplateManager`] |
/// | caching provider | [`DefaultCachingProvider`] |
/// | compiler | [`InterpolationCompiler`] |
/// | encoder | [`HtmlEncoder`] |
/// | model policy | permissive, missing members fail |
/// | compile timeout | none |
/// | build output root | `stencil` below the system temp directory |
/// | cleanup registry | an in-memory [`SweepingRegistry`] owned by the engine and swept when it is disposed |
/// | single-flight compiles | on |
/// | logging | on |
#[derive(Debug)]
pub struct EngineConfig {
    pub(crate) telemetry: EngineTelemetry,
    pub(crate) template_manager: Arc<dyn TemplateManager>,
    pub(crate) caching_provider: Option<Arc<dyn CachingProvider>>,
    pub(crate) compiler: Arc<dyn Compiler>,
    pub(crate) encoder: Arc<dyn Encoder>,
    pub(crate) model_policy: ModelPolicy,
    pub(crate) base_template_type: Option<String>,
    pub(crate) namespaces: Vec<String>,
    pub(crate) compile_timeout: Option<Duration>,
    pub(crate) temp_root: PathBuf,
    pub(crate) cleanup_registry: Arc<dyn CleanupRegistry>,
    pub(crate) owned_registry: Option<SweepingRegistry>,
    pub(crate) retain_build_output: bool,
    pub(crate) single_flight: bool,
}

impl EngineConfig {
    /// Starts building a configuration.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`EngineConfig`].
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use stencil::{EngineConfig, ModelPolicy, RawEncoder};
///
/// let config = EngineConfig::builder()
///     .name("mail")
///     .encoder(Arc::new(RawEncoder))
///     .model_policy(ModelPolicy::Strict)
///     .compile_timeout(Duration::from_secs(5))
///     .build();
/// ```
#[derive(Debug)]
pub struct EngineConfigBuilder {
    name: String,
    template_manager: Arc<dyn TemplateManager>,
    caching_provider: Option<Arc<dyn CachingProvider>>,
    compiler: Arc<dyn Compiler>,
    encoder: Arc<dyn Encoder>,
    model_policy: ModelPolicy,
    base_template_type: Option<String>,
    namespaces: Vec<String>,
    compile_timeout: Option<Duration>,
    temp_root: PathBuf,
    cleanup_registry: Option<Arc<dyn CleanupRegistry>>,
    retain_build_output: bool,
    single_flight: bool,
    logging: bool,
    #[cfg(feature = "metrics")]
    meter: Option<Meter>,
}

impl EngineConfigBuilder {
    fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            template_manager: Arc::new(DelegateTemplateManager::new()),
            caching_provider: Some(Arc::new(DefaultCachingProvider::new())),
            compiler: Arc::new(InterpolationCompiler),
            encoder: Arc::new(HtmlEncoder),
            model_policy: ModelPolicy::default(),
            base_template_type: None,
            namespaces: Vec::new(),
            compile_timeout: None,
            temp_root: std::env::temp_dir().join(DEFAULT_NAME),
            cleanup_registry: None,
            retain_build_output: false,
            single_flight: true,
            logging: true,
            #[cfg(feature = "metrics")]
            meter: None,
        }
    }

    /// Names the engine in logs and metrics.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets where template sources come from.
    #[must_use]
    pub fn template_manager(mut self, manager: Arc<dyn TemplateManager>) -> Self {
        self.template_manager = manager;
        self
    }

    /// Sets where compiled artifacts are kept.
    #[must_use]
    pub fn caching_provider(mut self, provider: Arc<dyn CachingProvider>) -> Self {
        self.caching_provider = Some(provider);
        self
    }

    /// Disables caching: every resolve compiles.
    #[must_use]
    pub fn without_caching(mut self) -> Self {
        self.caching_provider = None;
        self
    }

    /// Sets the compiler.
    #[must_use]
    pub fn compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Sets the encoder applied to interpolated values.
    #[must_use]
    pub fn encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Sets how dynamic and anonymous models are treated.
    #[must_use]
    pub fn model_policy(mut self, policy: ModelPolicy) -> Self {
        self.model_policy = policy;
        self
    }

    /// Sets the base template type passed to the compiler.
    #[must_use]
    pub fn base_template_type(mut self, base: impl Into<String>) -> Self {
        self.base_template_type = Some(base.into());
        self
    }

    /// Adds a namespace import passed to the compiler.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.push(namespace.into());
        self
    }

    /// Fails compiles that take longer than `timeout`.
    #[must_use]
    pub fn compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = Some(timeout);
        self
    }

    /// Sets the directory build output is created under.
    #[must_use]
    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    /// Sets where build output is registered for cleanup.
    ///
    /// The engine never sweeps a registry supplied here; whoever supplies it runs the watchdog.
    #[must_use]
    pub fn cleanup_registry(mut self, registry: Arc<dyn CleanupRegistry>) -> Self {
        self.cleanup_registry = Some(registry);
        self
    }

    /// Keeps build output of successful compiles on disk after the artifact is dropped.
    #[must_use]
    pub fn retain_build_output(mut self, retain: bool) -> Self {
        self.retain_build_output = retain;
        self
    }

    /// Whether concurrent compiles of the same template and model type are coalesced.
    #[must_use]
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Whether engine events are logged through `tracing`.
    #[must_use]
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Records OpenTelemetry metrics through `meter_provider`.
    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn metrics(mut self, meter_provider: &dyn MeterProvider) -> Self {
        self.meter = Some(crate::telemetry::metrics::create_meter(meter_provider));
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        let telemetry = EngineTelemetry::new(self.name, self.logging);
        #[cfg(feature = "metrics")]
        let telemetry = match &self.meter {
            Some(meter) => telemetry.with_meter(meter),
            None => telemetry,
        };

        let (cleanup_registry, owned_registry) = match self.cleanup_registry {
            Some(registry) => (registry, None),
            None => {
                let registry = SweepingRegistry::new();
                (Arc::new(registry.clone()) as Arc<dyn CleanupRegistry>, Some(registry))
            }
        };

        EngineConfig {
            telemetry,
            template_manager: self.template_manager,
            caching_provider: self.caching_provider,
            compiler: self.compiler,
            encoder: self.encoder,
            model_policy: self.model_policy,
            base_template_type: self.base_template_type,
            namespaces: self.namespaces,
            compile_timeout: self.compile_timeout,
            temp_root: self.temp_root,
            cleanup_registry,
            owned_registry,
            retain_build_output: self.retain_build_output,
            single_flight: self.single_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.telemetry.name(), "stencil");
        assert!(config.caching_provider.is_some());
        assert_eq!(config.model_policy, ModelPolicy::default());
        assert!(config.compile_timeout.is_none());
        assert!(config.single_flight);
        assert!(!config.retain_build_output);
        assert!(config.temp_root.ends_with("stencil"));
        assert!(config.owned_registry.is_some());
    }

    #[test]
    fn builder_overrides() {
        let config = EngineConfig::builder()
            .name("mail")
            .without_caching()
            .namespace("a")
            .namespace("b")
            .base_template_type("Page")
            .compile_timeout(Duration::from_millis(5))
            .single_flight(false)
            .build();

        assert_eq!(config.telemetry.name(), "mail");
        assert!(config.caching_provider.is_none());
        assert_eq!(config.namespaces, ["a", "b"]);
        assert_eq!(config.base_template_type.as_deref(), Some("Page"));
        assert_eq!(config.compile_timeout, Some(Duration::from_millis(5)));
        assert!(!config.single_flight);
    }

    #[test]
    fn supplied_registry_is_not_owned() {
        let config = EngineConfig::builder()
            .cleanup_registry(Arc::new(SweepingRegistry::new()))
            .build();

        assert!(config.owned_registry.is_none());
    }
}

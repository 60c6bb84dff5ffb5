// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A template engine that compiles each template once per model type and reuses the result.
//!
//! Compiling a template is expensive; rendering a compiled one is cheap. [`EngineService`] keeps
//! compiled artifacts in a [`CachingProvider`] indexed by the template's identity (its
//! [`TemplateKey`](stencil_source::TemplateKey)) and the model type it was compiled for, so that
//! concurrent render requests amortize a single compilation.
//!
//! # Quick Start
//!
//! ```
//! use stencil::{EngineConfig, EngineService, Model, ViewBag};
//! use stencil_source::{ResolveKind, TemplateSource};
//!
//! let engine = EngineService::new(EngineConfig::builder().name("docs").build());
//!
//! let key = engine.get_key("greeting", ResolveKind::Global, None);
//! engine.add_template(key.as_ref(), TemplateSource::new("<h1>Hello @Model.Forename</h1>"))?;
//!
//! let model = Model::anonymous(&serde_json::json!({ "Forename": "Matt" }))?;
//! let html = engine.run_compile_to_string(&key, None, model, &ViewBag::new())?;
//! assert_eq!(html, "<h1>Hello Matt</h1>");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Building Blocks
//!
//! - [`Compiler`] turns template text into [`CompiledCode`]. [`InterpolationCompiler`] is the
//!   reference implementation and the default.
//! - [`CompiledArtifact`] is the unit of caching: compiled code plus the key, source, model type
//!   and on-disk [`BuildResources`](stencil_cleanup::BuildResources) it came from.
//! - [`CachingProvider`] stores artifacts. [`DefaultCachingProvider`] is a concurrent two-level
//!   index; [`InvalidatingByModifiedTime`] evicts entries whose file changed on disk.
//! - [`LoadContext`] tracks loaded code and unloads it once nothing is running against it.
//! - [`EngineCore`] resolves, compiles, caches and runs templates, including layouts and
//!   includes, through [`RunnableTemplate`] and [`ExecutionContext`].
//!
//! # Models
//!
//! Templates read their data through [`Model`], which accepts typed models ([`TemplateModel`]),
//! name-indexed [`DynamicModel`]s and anonymous values built from anything `serde` can
//! serialize. Whether dynamic and anonymous models are accepted is decided per engine by
//! [`ModelPolicy`].
//!
//! # Features
//!
//! - `metrics`: records OpenTelemetry metrics for engine operations, see
//!   [`EngineConfigBuilder::metrics`].
//! - `test-util`: exposes the [`testing`] module with compiler test doubles.

mod artifact;
mod compiler;
mod config;
mod engine;
mod encoder;
mod error;
mod flight;
mod load_context;
mod model;
mod provider;
mod runtime;
mod service;
mod telemetry;
#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;
mod viewbag;

#[doc(inline)]
pub use artifact::CompiledArtifact;
#[doc(inline)]
pub use compiler::{CompileFailure, CompileOutput, CompileRequest, CompiledCode, Compiler, InterpolationCompiler};
#[doc(inline)]
pub use config::{EngineConfig, EngineConfigBuilder};
#[doc(inline)]
pub use engine::EngineCore;
#[doc(inline)]
pub use encoder::{Encoder, HtmlEncoder, RawEncoder};
#[doc(inline)]
pub use error::{Diagnostic, Error, RenderError, Result, Severity, TemplateCompilationError};
#[doc(inline)]
pub use load_context::{Lease, LoadContext};
#[doc(inline)]
pub use model::{DynamicModel, MissingMember, Model, ModelPolicy, SCALAR_MEMBER, TemplateModel};
#[doc(inline)]
pub use provider::{CachingProvider, DefaultCachingProvider, InvalidatingByModifiedTime, model_type_key};
#[doc(inline)]
pub use runtime::{ExecutionContext, MAX_NESTING_DEPTH, RunnableTemplate};
#[doc(inline)]
pub use service::EngineService;
#[doc(inline)]
pub use viewbag::ViewBag;

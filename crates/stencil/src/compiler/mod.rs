// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The boundary between the engine and whatever turns template text into runnable code.

mod interpolation;

use std::{fmt::Debug, path::PathBuf, sync::Arc};

use stencil_source::{ModelType, SharedKey, TemplateSource};

use crate::{Diagnostic, ExecutionContext, RenderError};

pub use interpolation::InterpolationCompiler;

/// Everything a compiler gets to see.
#[derive(Clone, Debug)]
pub struct CompileRequest {
    /// The template text.
    pub source: TemplateSource,
    /// The key being compiled.
    pub key: SharedKey,
    /// The model type requested by the caller, `None` for no model.
    pub model_type: Option<ModelType>,
    /// Name of the base template type generated code derives from, if configured.
    pub base_template_type: Option<String>,
    /// Namespace imports made available to generated code.
    pub namespaces: Vec<String>,
    /// A fresh directory the compiler may write build output into.
    pub build_dir: PathBuf,
}

/// A successful compile.
#[derive(Debug)]
pub struct CompileOutput {
    /// The loaded code.
    pub code: Arc<dyn CompiledCode>,
    /// The intermediate text the compiler generated.
    pub generated: String,
}

/// A failed compile.
#[derive(Clone, Debug, Default)]
pub struct CompileFailure {
    /// The intermediate text generated before the failure, if any.
    pub generated: Option<String>,
    /// What went wrong.
    pub diagnostics: Vec<Diagnostic>,
}

/// Turns template source into runnable code.
///
/// Compilers may be slow and may block; the engine calls them outside of any cache lock.
pub trait Compiler: Debug + Send + Sync + 'static {
    /// Compiles one template.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileFailure`] with diagnostics if the template cannot be compiled.
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompileFailure>;
}

/// Loaded, runnable template code.
pub trait CompiledCode: Debug + Send + Sync {
    /// The model type the template declares for itself, e.g. through a `@model` directive.
    ///
    /// When this differs from the requested type the cache indexes the artifact under both.
    fn declared_model_type(&self) -> Option<ModelType>;

    /// Runs the template, writing through `ctx`.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if rendering fails.
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), RenderError>;
}

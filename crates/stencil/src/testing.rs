// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Compiler test doubles.
//!
//! [`CountingCompiler`] counts and optionally slows down calls to a real compiler, which is how
//! tests observe whether a render reused a cached artifact. [`FailingCompiler`] rejects every
//! template with fixed diagnostics.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use crate::{CompileFailure, CompileOutput, CompileRequest, Compiler, Diagnostic, InterpolationCompiler};

/// A [`Compiler`] that counts calls before delegating.
///
/// Clones share the count, so a test can keep one clone and configure the engine with another.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use stencil::{EngineConfig, EngineService, Model, ViewBag, testing::CountingCompiler};
/// use stencil_source::{ResolveKind, TemplateSource};
///
/// let compiler = CountingCompiler::new();
/// let engine = EngineService::new(EngineConfig::builder().compiler(Arc::new(compiler.clone())).build());
///
/// let key = engine.get_key("page", ResolveKind::Global, None);
/// engine.add_template(key.as_ref(), TemplateSource::new("static"))?;
/// engine.run_compile_to_string(&key, None, Model::None, &ViewBag::new())?;
/// engine.run_compile_to_string(&key, None, Model::None, &ViewBag::new())?;
///
/// assert_eq!(compiler.calls(), 1);
/// # Ok::<(), stencil::Error>(())
/// ```
#[derive(Clone)]
pub struct CountingCompiler {
    inner: Arc<dyn Compiler>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl CountingCompiler {
    /// Counts calls to an [`InterpolationCompiler`].
    #[must_use]
    pub fn new() -> Self {
        Self::wrapping(Arc::new(InterpolationCompiler))
    }

    /// Counts calls to `inner`.
    #[must_use]
    pub fn wrapping(inner: Arc<dyn Compiler>) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    /// Sleeps for `delay` before each compile.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// How many compiles have started.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for CountingCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CountingCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingCompiler")
            .field("inner", &self.inner)
            .field("calls", &self.calls())
            .field("delay", &self.delay)
            .finish()
    }
}

impl Compiler for CountingCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompileFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.inner.compile(request)
    }
}

/// A [`Compiler`] that fails every compile with the same diagnostics.
#[derive(Clone, Debug)]
pub struct FailingCompiler {
    diagnostics: Vec<Diagnostic>,
}

impl FailingCompiler {
    /// Fails with a single error diagnostic.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            diagnostics: vec![Diagnostic::error(message, 1, 1)],
        }
    }

    /// Fails with `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }
}

impl Compiler for FailingCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompileFailure> {
        Err(CompileFailure {
            generated: Some(format!("// template: {}", request.key.name())),
            diagnostics: self.diagnostics.clone(),
        })
    }
}

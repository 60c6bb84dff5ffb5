// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, sync::Arc, time::Duration};

use stencil_cleanup::BuildResources;
use stencil_source::ModelKind;
use thiserror::Error;

use crate::model::MissingMember;

/// Errors produced by the template engine.
///
/// None of these are retried internally; the caller decides what to do next.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Resolving or registering template source failed.
    #[error(transparent)]
    Source(#[from] stencil_source::Error),

    /// The compiler rejected the template. Never cached.
    #[error(transparent)]
    Compilation(Box<TemplateCompilationError>),

    /// Compilation reported success but the result could not be loaded or run.
    #[error("compiled code for template '{key}' could not be loaded: {reason}")]
    Loading {
        /// Unique key string of the template.
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// The model's type was rejected by the engine's model policy.
    #[error("{kind:?} model type '{type_name}' is not supported by this engine")]
    UnsupportedModelType {
        /// Name of the rejected type.
        type_name: String,
        /// Why it counts as dynamic.
        kind: ModelKind,
    },

    /// An artifact was offered to the cache under a key it was not compiled for.
    #[error("artifact compiled for key '{actual}' cannot be cached under key '{expected}'")]
    CacheKeyConflict {
        /// The key the caller asked to cache under.
        expected: String,
        /// The key the artifact was compiled for.
        actual: String,
    },

    /// The compiler did not finish within the configured timeout.
    #[error("compiling template '{key}' did not finish within {timeout:?}")]
    CompilationTimeout {
        /// Unique key string of the template.
        key: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// A cached-only run found no cached artifact.
    #[error("template '{key}' is not cached for model type '{model_type}'")]
    NotCached {
        /// Unique key string of the template.
        key: String,
        /// Normalized model type that was looked up.
        model_type: String,
    },

    /// Running a compiled template failed.
    #[error("rendering template '{template}' failed: {source}")]
    Render {
        /// Name of the template that failed.
        template: String,
        /// Source lines around the failure, when the line is known.
        snippet: String,
        /// The underlying failure.
        #[source]
        source: RenderError,
    },

    /// The engine has been disposed.
    #[error("the engine has been disposed")]
    Disposed,

    /// An I/O error, e.g. while creating build output.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The compilation failure, if this is one.
    #[must_use]
    pub fn as_compilation(&self) -> Option<&TemplateCompilationError> {
        match self {
            Self::Compilation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TemplateCompilationError> for Error {
    fn from(error: TemplateCompilationError) -> Self {
        Self::Compilation(Box::new(error))
    }
}

/// A specialized [`Result`](std::result::Result) type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Severity of a compiler diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Severity {
    /// Compilation cannot succeed.
    Error,
    /// Compilation can succeed, but something looks wrong.
    Warning,
}

/// A message reported by the compiler, with a one-based position in the template source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// What the compiler found.
    pub message: String,
    /// One-based line.
    pub line: usize,
    /// One-based column.
    pub column: usize,
    /// How serious it is.
    pub severity: Severity,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    #[must_use]
    pub fn error(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            severity: Severity::Error,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}) {:?}: {}", self.line, self.column, self.severity, self.message)
    }
}

/// A template failed to compile.
///
/// The build output is retained for inspection and stays registered for cleanup.
#[derive(Debug, Error)]
#[error("template '{template}' failed to compile with {} diagnostic(s){}", .diagnostics.len(), first_diagnostic(.diagnostics))]
pub struct TemplateCompilationError {
    /// Name of the template.
    pub template: String,
    /// The intermediate text the compiler generated, if it got that far.
    pub generated: Option<String>,
    /// Everything the compiler reported.
    pub diagnostics: Vec<Diagnostic>,
    /// Build output of the failed compile.
    pub build_resources: Arc<BuildResources>,
}

fn first_diagnostic(diagnostics: &[Diagnostic]) -> String {
    diagnostics.first().map(|d| format!(", first: {d}")).unwrap_or_default()
}

/// Failures raised while a compiled template runs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenderError {
    /// The model has no such member.
    #[error("line {line}: {source}")]
    Member {
        /// One-based line of the access.
        line: usize,
        /// The missing member.
        #[source]
        source: MissingMember,
    },

    /// A layout requires a section that the template did not define.
    #[error("line {line}: section '{name}' is required but was not defined")]
    MissingSection {
        /// Section name.
        name: String,
        /// One-based line of the `RenderSection` call.
        line: usize,
    },

    /// A section was defined more than once.
    #[error("line {line}: section '{name}' is already defined")]
    DuplicateSection {
        /// Section name.
        name: String,
        /// One-based line of the second definition.
        line: usize,
    },

    /// `RenderBody` was used in a template that is not being rendered as a layout.
    #[error("line {line}: the body can only be rendered from a layout")]
    NoBody {
        /// One-based line of the call.
        line: usize,
    },

    /// Section capture was ended without having been started.
    #[error("section capture ended without being started")]
    UnbalancedSection,

    /// Layouts or includes reference each other too deeply, most likely in a cycle.
    #[error("templates are nested more than {0} levels deep")]
    NestingDepth(usize),

    /// An included or layout template failed.
    #[error("{0}")]
    Nested(Box<Error>),

    /// Writing output failed.
    #[error(transparent)]
    Write(#[from] fmt::Error),

    /// Any other failure raised by compiled code.
    #[error("{0}")]
    Custom(String),
}

impl RenderError {
    /// The one-based template line the failure is attributed to, if known.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Member { line, .. } | Self::MissingSection { line, .. } | Self::DuplicateSection { line, .. } | Self::NoBody { line } => {
                Some(*line)
            }
            _ => None,
        }
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value;
use stencil_source::{ResolveContext, ResolveKind};

use crate::{CompiledArtifact, EngineCore, Error, Model, RenderError, Result, ViewBag};

/// How deeply layouts and includes may nest before rendering fails.
pub const MAX_NESTING_DEPTH: usize = 32;

/// A compiled artifact bound to the model and view bag it will render.
#[derive(Debug)]
pub struct RunnableTemplate {
    artifact: Arc<CompiledArtifact>,
    model: Model,
    viewbag: ViewBag,
}

impl RunnableTemplate {
    pub(crate) fn new(artifact: Arc<CompiledArtifact>, model: Model, viewbag: ViewBag) -> Self {
        Self { artifact, model, viewbag }
    }

    /// The artifact that will run.
    #[must_use]
    pub fn artifact(&self) -> &Arc<CompiledArtifact> {
        &self.artifact
    }

    /// The model the template renders.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Runs the template, including any layouts it asks for, and writes the output to `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] with the failing template's name and a source snippet if
    /// rendering fails, or [`Error::Loading`] if the artifact's code has been unloaded.
    pub fn run(&self, core: &EngineCore, writer: &mut dyn fmt::Write) -> Result<()> {
        let output = self.render(core, None, HashMap::new(), 0)?;
        writer
            .write_str(&output)
            .map_err(|e| render_failure(&self.artifact, RenderError::Write(e)))
    }

    fn render(&self, core: &EngineCore, body: Option<String>, sections: HashMap<String, String>, depth: usize) -> Result<String> {
        let lease = self.artifact.load_context().lease(self.artifact.key().as_ref())?;

        let mut ctx = ExecutionContext {
            core,
            artifact: &self.artifact,
            model: &self.model,
            viewbag: &self.viewbag,
            output: String::new(),
            captures: Vec::new(),
            body,
            sections,
            layout: None,
            depth,
        };
        self.artifact
            .code()
            .execute(&mut ctx)
            .map_err(|e| render_failure(&self.artifact, e))?;

        let ExecutionContext {
            output, sections, layout, ..
        } = ctx;
        drop(lease);

        let Some(layout) = layout else {
            return Ok(output);
        };
        if depth >= MAX_NESTING_DEPTH {
            return Err(render_failure(&self.artifact, RenderError::NestingDepth(MAX_NESTING_DEPTH)));
        }

        let layout = core.resolve_internal(
            &layout,
            &self.model,
            self.artifact.model_type(),
            ResolveKind::Layout,
            Some(&resolve_context(&self.artifact)),
            &self.viewbag,
        )?;
        layout.render(core, Some(output), sections, depth + 1)
    }
}

fn resolve_context(artifact: &CompiledArtifact) -> ResolveContext {
    ResolveContext::new(Arc::clone(artifact.key()), artifact.model_type().cloned())
}

fn render_failure(artifact: &CompiledArtifact, source: RenderError) -> Error {
    Error::Render {
        template: artifact.key().name().to_string(),
        snippet: artifact.source().snippet(source.line()),
        source,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// What compiled code uses to render: the model, the view bag, the output and the layout,
/// section and include machinery.
///
/// Output goes to a stack of writers. [`begin_section`](Self::begin_section) pushes a capture
/// buffer and [`end_section`](Self::end_section) pops it into a named section, which a layout
/// later writes with [`render_section`](Self::render_section).
pub struct ExecutionContext<'a> {
    core: &'a EngineCore,
    artifact: &'a CompiledArtifact,
    model: &'a Model,
    viewbag: &'a ViewBag,
    output: String,
    captures: Vec<String>,
    body: Option<String>,
    sections: HashMap<String, String>,
    layout: Option<String>,
    depth: usize,
}

impl ExecutionContext<'_> {
    /// The model being rendered.
    #[must_use]
    pub fn model(&self) -> &Model {
        self.model
    }

    /// The view bag shared with layouts and includes.
    #[must_use]
    pub fn viewbag(&self) -> &ViewBag {
        self.viewbag
    }

    /// The artifact being run.
    #[must_use]
    pub fn artifact(&self) -> &CompiledArtifact {
        self.artifact
    }

    fn out(&mut self) -> &mut String {
        match self.captures.last_mut() {
            Some(capture) => capture,
            None => &mut self.output,
        }
    }

    /// Writes template text unchanged.
    pub fn write_literal(&mut self, text: &str) {
        self.out().push_str(text);
    }

    /// Writes a value through the engine's encoder.
    pub fn write_value(&mut self, value: &Value) {
        let encoded = self.core.encoder().encode(&display(value));
        self.out().push_str(&encoded);
    }

    /// Writes a value without encoding.
    pub fn write_raw(&mut self, value: &Value) {
        let text = display(value);
        self.out().push_str(&text);
    }

    /// Starts capturing output for a section.
    pub fn begin_section(&mut self) {
        self.captures.push(String::new());
    }

    /// Stops capturing and stores the captured output as section `name`.
    ///
    /// # Errors
    ///
    /// Fails if no capture is in progress or the section is already defined.
    pub fn end_section(&mut self, name: &str, line: usize) -> std::result::Result<(), RenderError> {
        let content = self.captures.pop().ok_or(RenderError::UnbalancedSection)?;
        if self.sections.contains_key(name) {
            return Err(RenderError::DuplicateSection {
                name: name.to_string(),
                line,
            });
        }
        self.sections.insert(name.to_string(), content);
        Ok(())
    }

    /// Whether section `name` is available.
    #[must_use]
    pub fn is_section_defined(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Writes section `name`.
    ///
    /// # Errors
    ///
    /// Fails if `required` and the section was not defined.
    pub fn render_section(&mut self, name: &str, required: bool, line: usize) -> std::result::Result<(), RenderError> {
        match self.sections.get(name).cloned() {
            Some(content) => {
                self.out().push_str(&content);
                Ok(())
            }
            None if required => Err(RenderError::MissingSection {
                name: name.to_string(),
                line,
            }),
            None => Ok(()),
        }
    }

    /// Writes the body of the template this layout wraps.
    ///
    /// # Errors
    ///
    /// Fails if the current template is not being rendered as a layout.
    pub fn render_body(&mut self, line: usize) -> std::result::Result<(), RenderError> {
        let body = self.body.clone().ok_or(RenderError::NoBody { line })?;
        self.out().push_str(&body);
        Ok(())
    }

    /// Asks for the output to be rendered inside layout `name`.
    pub fn set_layout(&mut self, name: impl Into<String>) {
        self.layout = Some(name.into());
    }

    /// The requested layout, if any.
    #[must_use]
    pub fn layout(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    /// Renders template `name` with the current model and view bag and writes its output.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Nested`] if the included template cannot be resolved, compiled or
    /// rendered.
    pub fn include(&mut self, name: &str) -> std::result::Result<(), RenderError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(RenderError::NestingDepth(MAX_NESTING_DEPTH));
        }

        let rendered = self
            .core
            .resolve_internal(
                name,
                self.model,
                self.artifact.model_type(),
                ResolveKind::Include,
                Some(&resolve_context(self.artifact)),
                self.viewbag,
            )
            .and_then(|template| template.render(self.core, None, HashMap::new(), self.depth + 1))
            .map_err(|e| RenderError::Nested(Box::new(e)))?;

        self.out().push_str(&rendered);
        Ok(())
    }
}

impl fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("artifact", &self.artifact.id())
            .field("captures", &self.captures.len())
            .field("sections", &self.sections.keys().collect::<Vec<_>>())
            .field("layout", &self.layout)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn display_renders_scalars() {
        assert_eq!(display(&Value::Null), "");
        assert_eq!(display(&json!("text")), "text");
        assert_eq!(display(&json!(42)), "42");
        assert_eq!(display(&json!(true)), "true");
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, fs, sync::Arc};

use serde_json::Value;
use stencil_source::ModelType;

use crate::{CompileFailure, CompileOutput, CompileRequest, CompiledCode, Compiler, Diagnostic, ExecutionContext, RenderError, Severity, ViewBag};

/// File the generated listing is written to inside the build directory.
const LISTING_FILE: &str = "template.listing";

/// A small compiler for `@`-interpolated text templates.
///
/// Supported syntax:
///
/// | Syntax | Meaning |
/// |---|---|
/// | `@model Type` | Declares the model type (own line). `@model dynamic` declares a dynamic model. |
/// | `@layout name` | Renders the output inside the layout `name` (own line). |
/// | `@Model.A.B` | Writes an encoded model member. |
/// | `@ViewBag.Name` | Writes an encoded view bag value, empty when missing. |
/// | `@Raw(Model.A)` | Writes a member without encoding. |
/// | `@Include("name")` | Renders another template in place, with the same model. |
/// | `@RenderBody()` | In a layout, writes the body of the template being wrapped. |
/// | `@RenderSection("name")` | In a layout, writes a section. Pass `false` as a second argument to make it optional. |
/// | `@section name {` ... `}` | Defines a section (braces on their own lines). |
/// | `@@` | A literal `@`. |
///
/// An `@` directly after a letter or digit is literal, so e-mail addresses need no escaping.
///
/// ```
/// use stencil::{Compiler, CompileRequest, InterpolationCompiler};
/// use stencil_source::{NameOnlyTemplateKey, ResolveKind, TemplateSource};
/// use std::sync::Arc;
///
/// let build_dir = tempfile::tempdir()?;
/// let request = CompileRequest {
///     source: TemplateSource::new("@model Person\nHello @Model.Forename"),
///     key: Arc::new(NameOnlyTemplateKey::new("hello", ResolveKind::Global, None)),
///     model_type: None,
///     base_template_type: None,
///     namespaces: Vec::new(),
///     build_dir: build_dir.path().to_path_buf(),
/// };
///
/// let output = InterpolationCompiler.compile(&request).unwrap();
/// assert_eq!(output.code.declared_model_type().unwrap().name(), "Person");
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct InterpolationCompiler;

impl Compiler for InterpolationCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompileFailure> {
        let Parsed {
            model_type,
            layout,
            segments,
            mut diagnostics,
        } = parse(request.source.template());

        let generated = Listing {
            request,
            model_type: model_type.as_ref(),
            layout: layout.as_deref(),
            segments: &segments,
        }
        .to_string();

        if let Err(e) = fs::write(request.build_dir.join(LISTING_FILE), &generated) {
            diagnostics.push(Diagnostic::error(format!("failed to write build output: {e}"), 1, 1));
        }

        if diagnostics.iter().any(|d| d.severity == Severity::Error) {
            return Err(CompileFailure {
                generated: Some(generated),
                diagnostics,
            });
        }

        Ok(CompileOutput {
            code: Arc::new(InterpolatedTemplate {
                model_type,
                layout,
                segments,
            }),
            generated,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Root {
    Model,
    ViewBag,
}

impl Root {
    fn as_str(self) -> &'static str {
        match self {
            Self::Model => "Model",
            Self::ViewBag => "ViewBag",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value {
        root: Root,
        path: Vec<String>,
        raw: bool,
        line: usize,
    },
    Include {
        name: String,
    },
    RenderBody {
        line: usize,
    },
    RenderSection {
        name: String,
        required: bool,
        line: usize,
    },
    Section {
        name: String,
        body: Vec<Segment>,
        line: usize,
    },
}

#[derive(Debug)]
struct InterpolatedTemplate {
    model_type: Option<ModelType>,
    layout: Option<String>,
    segments: Vec<Segment>,
}

impl CompiledCode for InterpolatedTemplate {
    fn declared_model_type(&self) -> Option<ModelType> {
        self.model_type.clone()
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), RenderError> {
        if let Some(layout) = &self.layout {
            ctx.set_layout(layout.clone());
        }
        run(&self.segments, ctx)
    }
}

fn run(segments: &[Segment], ctx: &mut ExecutionContext<'_>) -> Result<(), RenderError> {
    for segment in segments {
        match segment {
            Segment::Literal(text) => ctx.write_literal(text),
            Segment::Value { root, path, raw, line } => {
                let value = match root {
                    Root::Model => ctx
                        .model()
                        .get_path(path.as_slice())
                        .map_err(|source| RenderError::Member { line: *line, source })?,
                    Root::ViewBag => viewbag_path(ctx.viewbag(), path),
                };
                if *raw {
                    ctx.write_raw(&value);
                } else {
                    ctx.write_value(&value);
                }
            }
            Segment::Include { name } => ctx.include(name)?,
            Segment::RenderBody { line } => ctx.render_body(*line)?,
            Segment::RenderSection { name, required, line } => ctx.render_section(name, *required, *line)?,
            Segment::Section { name, body, line } => {
                ctx.begin_section();
                run(body, ctx)?;
                ctx.end_section(name, *line)?;
            }
        }
    }
    Ok(())
}

fn viewbag_path(viewbag: &ViewBag, path: &[String]) -> Value {
    let Some((first, rest)) = path.split_first() else {
        return Value::Null;
    };
    let mut value = viewbag.get(first).unwrap_or(Value::Null);
    for segment in rest {
        value = value.get(segment).cloned().unwrap_or(Value::Null);
    }
    value
}

#[derive(Debug, Default)]
struct Parsed {
    model_type: Option<ModelType>,
    layout: Option<String>,
    segments: Vec<Segment>,
    diagnostics: Vec<Diagnostic>,
}

struct OpenSection {
    name: String,
    line: usize,
    body: Vec<Segment>,
}

fn parse(template: &str) -> Parsed {
    let mut parsed = Parsed::default();
    let mut open: Option<OpenSection> = None;

    for (index, text) in template.split_inclusive('\n').enumerate() {
        let line = index + 1;
        let trimmed = text.trim();
        let column = text.chars().take_while(|c| c.is_whitespace()).count() + 1;

        if let Some(rest) = trimmed.strip_prefix("@model ") {
            let name = rest.trim();
            if parsed.model_type.is_some() {
                parsed.diagnostics.push(Diagnostic::error("'@model' may only appear once", line, column));
            } else if name == "dynamic" {
                parsed.model_type = Some(ModelType::dynamic());
            } else {
                parsed.model_type = Some(ModelType::named(name));
            }
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("@layout ") {
            if parsed.layout.is_some() {
                parsed.diagnostics.push(Diagnostic::error("'@layout' may only appear once", line, column));
            } else {
                parsed.layout = Some(rest.trim().to_string());
            }
            continue;
        }

        if let Some(name) = trimmed.strip_prefix("@section ").and_then(|rest| rest.strip_suffix('{')) {
            let name = name.trim();
            if open.is_some() {
                parsed.diagnostics.push(Diagnostic::error("sections cannot be nested", line, column));
            } else if !is_identifier(name) {
                parsed.diagnostics.push(Diagnostic::error(format!("invalid section name '{name}'"), line, column));
            } else {
                open = Some(OpenSection {
                    name: name.to_string(),
                    line,
                    body: Vec::new(),
                });
            }
            continue;
        }

        if trimmed == "}" {
            if let Some(section) = open.take() {
                parsed.segments.push(Segment::Section {
                    name: section.name,
                    body: section.body,
                    line: section.line,
                });
                continue;
            }
        }

        let target = match &mut open {
            Some(section) => &mut section.body,
            None => &mut parsed.segments,
        };
        parse_line(text, line, target, &mut parsed.diagnostics);
    }

    if let Some(section) = open {
        parsed
            .diagnostics
            .push(Diagnostic::error(format!("section '{}' is not closed", section.name), section.line, 1));
    }

    parsed
}

fn parse_line(text: &str, line: usize, segments: &mut Vec<Segment>, diagnostics: &mut Vec<Diagnostic>) {
    let chars: Vec<char> = text.chars().collect();
    let mut literal = String::new();
    let mut i = 0;

    while let Some(&c) = chars.get(i) {
        if c != '@' {
            literal.push(c);
            i += 1;
            continue;
        }

        if i > 0 && chars[i - 1].is_alphanumeric() {
            literal.push('@');
            i += 1;
            continue;
        }

        if chars.get(i + 1) == Some(&'@') {
            literal.push('@');
            i += 2;
            continue;
        }

        match (Cursor { chars: &chars, pos: i + 1 }).directive(line) {
            Ok((segment, next)) => {
                push_literal(segments, std::mem::take(&mut literal));
                segments.push(segment);
                i = next;
            }
            Err(message) => {
                diagnostics.push(Diagnostic::error(message, line, i + 1));
                literal.push('@');
                i += 1;
            }
        }
    }

    push_literal(segments, literal);
}

fn push_literal(segments: &mut Vec<Segment>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Literal(previous)) = segments.last_mut() {
        previous.push_str(&text);
    } else {
        segments.push(Segment::Literal(text));
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_continue)
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Cursor<'a> {
    chars: &'a [char],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn identifier(&mut self) -> Option<String> {
        if !self.peek().is_some_and(is_identifier_start) {
            return None;
        }
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_continue) {
            self.pos += 1;
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected '{expected}'"))
        }
    }

    fn string(&mut self) -> Result<String, String> {
        self.expect('"')?;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '"' {
                let value = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err("unterminated string".to_string())
    }

    fn member_path(&mut self) -> Vec<String> {
        let mut path = Vec::new();
        while self.peek() == Some('.') && self.chars.get(self.pos + 1).copied().is_some_and(is_identifier_start) {
            self.pos += 1;
            if let Some(member) = self.identifier() {
                path.push(member);
            }
        }
        path
    }

    fn root(name: &str) -> Option<Root> {
        match name {
            "Model" => Some(Root::Model),
            "ViewBag" => Some(Root::ViewBag),
            _ => None,
        }
    }

    fn value(&mut self, root: Root, raw: bool, line: usize) -> Result<Segment, String> {
        let path = self.member_path();
        if path.is_empty() {
            return Err(format!("expected a member after '{}'", root.as_str()));
        }
        Ok(Segment::Value { root, path, raw, line })
    }

    fn directive(mut self, line: usize) -> Result<(Segment, usize), String> {
        let Some(word) = self.identifier() else {
            return Err("expected a directive after '@'".to_string());
        };

        let segment = match word.as_str() {
            "Model" => self.value(Root::Model, false, line)?,
            "ViewBag" => self.value(Root::ViewBag, false, line)?,
            "Raw" => {
                self.expect('(')?;
                self.skip_whitespace();
                let root = self
                    .identifier()
                    .as_deref()
                    .and_then(Self::root)
                    .ok_or("expected 'Model' or 'ViewBag' inside '@Raw(...)'")?;
                let segment = self.value(root, true, line)?;
                self.expect(')')?;
                segment
            }
            "Include" => {
                self.expect('(')?;
                let name = self.string()?;
                self.expect(')')?;
                Segment::Include { name }
            }
            "RenderBody" => {
                self.expect('(')?;
                self.expect(')')?;
                Segment::RenderBody { line }
            }
            "RenderSection" => {
                self.expect('(')?;
                let name = self.string()?;
                self.skip_whitespace();
                let required = if self.peek() == Some(',') {
                    self.pos += 1;
                    self.skip_whitespace();
                    match self.identifier().as_deref() {
                        Some("true") => true,
                        Some("false") => false,
                        _ => return Err("expected 'true' or 'false'".to_string()),
                    }
                } else {
                    true
                };
                self.expect(')')?;
                Segment::RenderSection { name, required, line }
            }
            other => return Err(format!("unknown directive '@{other}'")),
        };

        Ok((segment, self.pos))
    }
}

struct Listing<'a> {
    request: &'a CompileRequest,
    model_type: Option<&'a ModelType>,
    layout: Option<&'a str>,
    segments: &'a [Segment],
}

impl Listing<'_> {
    fn write_segments(f: &mut fmt::Formatter<'_>, segments: &[Segment], indent: usize) -> fmt::Result {
        let pad = "    ".repeat(indent);
        for segment in segments {
            match segment {
                Segment::Literal(text) => writeln!(f, "{pad}write {text:?}")?,
                Segment::Value { root, path, raw, .. } => {
                    let verb = if *raw { "emit raw" } else { "emit" };
                    writeln!(f, "{pad}{verb} {}.{}", root.as_str(), path.join("."))?;
                }
                Segment::Include { name } => writeln!(f, "{pad}include {name:?}")?,
                Segment::RenderBody { .. } => writeln!(f, "{pad}render body")?,
                Segment::RenderSection { name, required, .. } => {
                    let presence = if *required { "required" } else { "optional" };
                    writeln!(f, "{pad}render section {name:?} {presence}")?;
                }
                Segment::Section { name, body, .. } => {
                    writeln!(f, "{pad}section {name} {{")?;
                    Self::write_segments(f, body, indent + 1)?;
                    writeln!(f, "{pad}}}")?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// template: {}", self.request.key.name())?;
        match self.model_type.or(self.request.model_type.as_ref()) {
            Some(model_type) => writeln!(f, "// model: {model_type}")?,
            None => writeln!(f, "// model: none")?,
        }
        if let Some(base) = &self.request.base_template_type {
            writeln!(f, "// base: {base}")?;
        }
        for namespace in &self.request.namespaces {
            writeln!(f, "// using {namespace}")?;
        }
        if let Some(layout) = self.layout {
            writeln!(f, "layout {layout:?}")?;
        }
        Self::write_segments(f, self.segments, 0)
    }
}

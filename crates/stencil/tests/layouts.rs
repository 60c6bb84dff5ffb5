// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Layouts, sections, includes and model access while templates run.

use std::sync::Arc;

use stencil::{EngineConfig, EngineService, Error, MAX_NESTING_DEPTH, Model, ModelPolicy, RenderError, ViewBag};
use stencil_cleanup::testing::RecordingRegistry;
use stencil_source::{ModelKind, ResolveKind, TemplateSource};

fn engine_with(policy: ModelPolicy, templates: &[(&str, &str)]) -> EngineService {
    let engine = EngineService::new(
        EngineConfig::builder()
            .logging(false)
            .model_policy(policy)
            .cleanup_registry(Arc::new(RecordingRegistry::new()))
            .build(),
    );
    for (name, text) in templates {
        let key = engine.get_key(name, ResolveKind::Global, None);
        engine.add_template(key.as_ref(), TemplateSource::new(*text)).unwrap();
    }
    engine
}

fn engine(templates: &[(&str, &str)]) -> EngineService {
    engine_with(ModelPolicy::default(), templates)
}

fn render(engine: &EngineService, name: &str, model: Model, viewbag: &ViewBag) -> stencil::Result<String> {
    let key = engine.get_key(name, ResolveKind::Global, None);
    engine.run_compile_to_string(&key, None, model, viewbag)
}

fn named(name: &str) -> Model {
    Model::anonymous(&serde_json::json!({ "Name": name })).unwrap()
}

#[test]
fn layout_wraps_body_and_sections() {
    let engine = engine(&[
        ("page", "@layout main\n@section title {\nHome\n}\n<p>@Model.Name</p>"),
        ("main", "<title>@RenderSection(\"title\")</title>\n<body>@RenderBody()</body>"),
    ]);

    let html = render(&engine, "page", named("Ann"), &ViewBag::new()).unwrap();

    assert_eq!(html, "<title>Home\n</title>\n<body><p>Ann</p></body>");
}

#[test]
fn layouts_nest() {
    let engine = engine(&[
        ("page", "@layout inner\n@section aside {\nnote\n}\nbody"),
        ("inner", "@layout outer\n<main>@RenderBody()</main>"),
        ("outer", "<html>@RenderBody()|@RenderSection(\"aside\")</html>"),
    ]);

    let html = render(&engine, "page", Model::None, &ViewBag::new()).unwrap();

    assert_eq!(html, "<html><main>body</main>|note\n</html>");
}

#[test]
fn layout_sees_the_callers_view_bag() {
    let engine = engine(&[
        ("page", "@layout main\ncontent"),
        ("main", "<title>@ViewBag.Title</title>@RenderBody()"),
    ]);
    let viewbag = ViewBag::new();
    viewbag.insert("Title", "Dashboard");

    let html = render(&engine, "page", Model::None, &viewbag).unwrap();

    assert_eq!(html, "<title>Dashboard</title>content");
}

#[test]
fn optional_section_may_be_missing() {
    let engine = engine(&[
        ("page", "@layout main\nbody"),
        ("main", "@RenderBody()@RenderSection(\"scripts\", false)"),
    ]);

    assert_eq!(render(&engine, "page", Model::None, &ViewBag::new()).unwrap(), "body");
}

#[test]
fn required_section_must_be_defined() {
    let engine = engine(&[
        ("page", "@layout main\nbody"),
        ("main", "@RenderBody()\n@RenderSection(\"scripts\")"),
    ]);

    let error = render(&engine, "page", Model::None, &ViewBag::new()).unwrap_err();

    match error {
        Error::Render {
            template,
            snippet,
            source: RenderError::MissingSection { name, line },
        } => {
            assert_eq!(template, "main");
            assert_eq!(name, "scripts");
            assert_eq!(line, 2);
            assert!(snippet.contains("@RenderSection(\"scripts\")"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicate_section_is_a_render_error() {
    let engine = engine(&[("page", "@section a {\nx\n}\n@section a {\ny\n}\n")]);

    let error = render(&engine, "page", Model::None, &ViewBag::new()).unwrap_err();

    assert!(matches!(
        error,
        Error::Render {
            source: RenderError::DuplicateSection { .. },
            ..
        }
    ));
}

#[test]
fn body_outside_a_layout_is_an_error() {
    let engine = engine(&[("page", "@RenderBody()")]);

    let error = render(&engine, "page", Model::None, &ViewBag::new()).unwrap_err();

    assert!(matches!(
        error,
        Error::Render {
            source: RenderError::NoBody { line: 1 },
            ..
        }
    ));
}

#[test]
fn includes_render_with_the_same_model() {
    let engine = engine(&[
        ("page", "@Include(\"header\")<p>text</p>"),
        ("header", "<h1>@Model.Name</h1>"),
    ]);

    let html = render(&engine, "page", named("Ann"), &ViewBag::new()).unwrap();

    assert_eq!(html, "<h1>Ann</h1><p>text</p>");
}

#[test]
fn include_failure_names_both_templates() {
    let engine = engine(&[("page", "@Include(\"missing\")")]);

    let error = render(&engine, "page", Model::None, &ViewBag::new()).unwrap_err();

    let Error::Render { template, source, .. } = &error else {
        panic!("unexpected error: {error}");
    };
    assert_eq!(template, "page");
    assert!(matches!(source, RenderError::Nested(inner) if matches!(**inner, Error::Source(_))));
    assert!(error.to_string().contains("'missing'"));
}

#[test]
fn include_cycle_is_bounded() {
    let engine = engine(&[("a", "@Include(\"b\")"), ("b", "@Include(\"a\")")]);

    let error = render(&engine, "a", Model::None, &ViewBag::new()).unwrap_err();

    assert!(error
        .to_string()
        .contains(&format!("nested more than {MAX_NESTING_DEPTH} levels deep")));
}

#[test]
fn layout_cycle_is_bounded() {
    let engine = engine(&[("a", "@layout a\nx")]);

    let error = render(&engine, "a", Model::None, &ViewBag::new()).unwrap_err();

    assert!(matches!(
        error,
        Error::Render {
            source: RenderError::NestingDepth(MAX_NESTING_DEPTH),
            ..
        }
    ));
}

#[test]
fn missing_member_fails_with_position() {
    let engine = engine(&[("page", "line one\nHello @Model.Surname")]);

    let error = render(&engine, "page", named("Ann"), &ViewBag::new()).unwrap_err();

    match error {
        Error::Render {
            snippet,
            source: RenderError::Member { line, source },
            ..
        } => {
            assert_eq!(line, 2);
            assert_eq!(source.member, "Surname");
            assert!(snippet.contains("Hello @Model.Surname"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_members_can_be_allowed() {
    let engine = engine_with(
        ModelPolicy::Permissive {
            allow_missing_members: true,
        },
        &[("page", "[@Model.Surname]")],
    );

    assert_eq!(render(&engine, "page", named("Ann"), &ViewBag::new()).unwrap(), "[]");
}

#[test]
fn strict_policy_rejects_dynamic_models() {
    let engine = engine_with(ModelPolicy::Strict, &[("page", "@Model.Name")]);

    let error = render(&engine, "page", named("Ann"), &ViewBag::new()).unwrap_err();

    assert!(matches!(
        error,
        Error::UnsupportedModelType {
            kind: ModelKind::Anonymous,
            ..
        }
    ));
}

#[test]
fn strict_policy_accepts_typed_models() {
    #[derive(serde::Serialize)]
    struct Person {
        #[serde(rename = "Name")]
        name: &'static str,
    }

    let engine = engine_with(ModelPolicy::Strict, &[("page", "@Model.Name")]);
    let model = Model::serialized(&Person { name: "Ann" }).unwrap();

    assert_eq!(render(&engine, "page", model, &ViewBag::new()).unwrap(), "Ann");
}

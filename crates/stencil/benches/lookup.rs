// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(
    missing_docs,
    clippy::unwrap_used,
    reason = "Benchmarks don't require documentation and should fail fast on errors"
)]

use std::{hint::black_box, sync::Arc};

use criterion::{Criterion, criterion_group, criterion_main};
use stencil::{CachingProvider, EngineConfig, EngineService, Model, ViewBag};
use stencil_cleanup::testing::RecordingRegistry;
use stencil_source::{ModelType, ResolveKind, TemplateSource};

fn engine() -> EngineService {
    EngineService::new(
        EngineConfig::builder()
            .logging(false)
            .cleanup_registry(Arc::new(RecordingRegistry::new()))
            .build(),
    )
}

fn entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    let engine = engine();
    let key = engine.get_key("greeting", ResolveKind::Global, None);
    engine
        .add_template(key.as_ref(), TemplateSource::new("<h1>Hello @Model.Forename</h1>"))
        .unwrap();
    engine.compile_and_cache(&key, Some(&ModelType::dynamic())).unwrap();
    let provider = Arc::clone(engine.core().caching_provider().unwrap());

    group.bench_function("try_retrieve_hit", |b| {
        b.iter(|| provider.try_retrieve_template(black_box(key.as_ref()), black_box(None)));
    });

    let other = engine.get_key("missing", ResolveKind::Global, None);
    group.bench_function("try_retrieve_miss", |b| {
        b.iter(|| provider.try_retrieve_template(black_box(other.as_ref()), black_box(None)));
    });

    let viewbag = ViewBag::new();
    let model = Model::anonymous(&serde_json::json!({ "Forename": "Matt" })).unwrap();
    group.bench_function("run_cached", |b| {
        b.iter(|| {
            let mut out = String::new();
            engine
                .run_cached(key.as_ref(), &mut out, None, black_box(model.clone()), &viewbag)
                .unwrap();
            out
        });
    });

    group.finish();
}

criterion_group!(benches, entry);
criterion_main!(benches);

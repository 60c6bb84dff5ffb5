// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Engine telemetry: structured `tracing` events and, with the `metrics` feature, OpenTelemetry
//! metrics.

pub(crate) mod attributes;
#[cfg(feature = "metrics")]
pub(crate) mod metrics;
#[cfg(all(test, feature = "metrics"))]
mod testing;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

#[cfg(feature = "metrics")]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineOperation {
    Resolve,
    Compile,
    Cache,
    Invalidate,
    Run,
    Dispose,
}

impl EngineOperation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "engine.resolve",
            Self::Compile => "engine.compile",
            Self::Cache => "engine.cache",
            Self::Invalidate => "engine.invalidate",
            Self::Run => "engine.run",
            Self::Dispose => "engine.dispose",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineActivity {
    Hit,
    Miss,
    Coalesced,
    Compiled,
    Cached,
    Invalidated,
    Rendered,
    Disposed,
    Failed,
    TimedOut,
}

impl EngineActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "engine.hit",
            Self::Miss => "engine.miss",
            Self::Coalesced => "engine.coalesced",
            Self::Compiled => "engine.compiled",
            Self::Cached => "engine.cached",
            Self::Invalidated => "engine.invalidated",
            Self::Rendered => "engine.rendered",
            Self::Disposed => "engine.disposed",
            Self::Failed => "engine.failed",
            Self::TimedOut => "engine.timed_out",
        }
    }

    pub(crate) fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::Coalesced | Self::Rendered => Level::DEBUG,
            Self::Compiled | Self::Cached | Self::Invalidated | Self::Disposed => Level::INFO,
            Self::Failed | Self::TimedOut => Level::ERROR,
        }
    }
}

/// Records engine operations.
#[derive(Clone, Debug)]
pub(crate) struct EngineTelemetry {
    name: Arc<str>,
    logging_enabled: bool,
    #[cfg(feature = "metrics")]
    event_counter: Option<Counter<u64>>,
    #[cfg(feature = "metrics")]
    operation_duration: Option<Histogram<f64>>,
}

impl EngineTelemetry {
    pub(crate) fn new(name: impl Into<Arc<str>>, logging_enabled: bool) -> Self {
        Self {
            name: name.into(),
            logging_enabled,
            #[cfg(feature = "metrics")]
            event_counter: None,
            #[cfg(feature = "metrics")]
            operation_duration: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_meter(mut self, meter: &Meter) -> Self {
        self.event_counter = Some(metrics::create_event_counter(meter));
        self.operation_duration = Some(metrics::create_operation_duration_histogram(meter));
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn record(&self, key: &str, operation: EngineOperation, activity: EngineActivity, duration: Option<Duration>) {
        #[cfg(feature = "metrics")]
        {
            let attrs = [
                KeyValue::new(attributes::ENGINE_NAME, self.name.to_string()),
                KeyValue::new(attributes::ENGINE_OPERATION, operation.as_str()),
                KeyValue::new(attributes::ENGINE_ACTIVITY, activity.as_str()),
            ];
            if let Some(counter) = &self.event_counter {
                counter.add(1, &attrs);
            }
            if let (Some(d), Some(h)) = (duration, &self.operation_duration) {
                h.record(d.as_secs_f64(), &attrs);
            }
        }

        if self.logging_enabled {
            emit(&self.name, key, operation, activity, duration);
        }
    }
}

fn emit(engine_name: &str, key: &str, operation: EngineOperation, activity: EngineActivity, duration: Option<Duration>) {
    let op = operation.as_str();
    let act = activity.as_str();
    let duration_ns = duration.map(|d| d.as_nanos());

    // Field names must match the constants in attributes.rs.
    macro_rules! emit_event {
        ($level:ident) => {
            tracing::$level!(
                engine.name = engine_name,
                template.key = key,
                engine.operation = op,
                engine.activity = act,
                engine.duration_ns = ?duration_ns,
                "engine.event"
            )
        };
    }

    let level = activity.level();
    if level == Level::ERROR {
        emit_event!(error);
    } else if level == Level::INFO {
        emit_event!(info);
    } else {
        emit_event!(debug);
    }
}

/// Runs `f` and measures how long it took.
pub(crate) fn timed<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

//! Traced-operation wrapper.
//!
//! Every unit of work that touches storage (server side) or the network
//! (client side) runs inside [`trace_call`]: a span named after the operation
//! is opened and made current, the work is awaited, and the span is closed
//! with an OK or ERROR status. The server additionally records the elapsed
//! time and an outcome counter through [`Instrumentation`].

use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
    sync::Arc,
    time::Instant,
};

use opentelemetry::{
    global::{self, BoxedTracer},
    metrics::{Counter, Histogram, Meter, MeterProvider},
    trace::{FutureExt, Status, TraceContextExt, Tracer, TracerProvider},
    Context, InstrumentationScope, KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::SdkTracerProvider};

pub const TRACER_NAME: &str = "books-api-tracer";
pub const METER_NAME: &str = "books-api-meter";
const SCOPE_VERSION: &str = "1.0.0";

const OPERATIONS_COUNTER: &str = "books.operations";
const DURATION_HISTOGRAM: &str = "books.operation.duration";

/// Outcome tag attached to the operation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Success,
    Error,
    NotFound,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Success => "success",
            OperationStatus::Error => "error",
            OperationStatus::NotFound => "not_found",
        }
    }
}

/// Instrumentation scope with the shared version tag.
pub fn scope(name: &'static str) -> InstrumentationScope {
    InstrumentationScope::builder(name)
        .with_version(SCOPE_VERSION)
        .build()
}

/// Run `work` inside a span named `name` carrying `attributes`.
///
/// The span is current while the work is polled, so spans opened by the work
/// become its children. Success sets status OK; failure sets status ERROR with
/// the error message and records the error as an exception event. The result
/// is returned untouched and the span is ended exactly once.
pub async fn trace_call<T, E, F>(
    tracer: &BoxedTracer,
    name: &'static str,
    attributes: Vec<KeyValue>,
    work: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error,
{
    let span = tracer
        .span_builder(name)
        .with_attributes(attributes)
        .start(tracer);
    let cx = Context::current_with_span(span);

    let result = work.with_context(cx.clone()).await;

    let span = cx.span();
    match &result {
        Ok(_) => span.set_status(Status::Ok),
        Err(err) => {
            span.set_status(Status::error(err.to_string()));
            span.record_error(err);
        }
    }
    span.end();

    result
}

/// Server-side tracer plus the operation counter and duration histogram.
#[derive(Clone)]
pub struct Instrumentation {
    tracer: Arc<BoxedTracer>,
    operations: Counter<u64>,
    duration: Histogram<f64>,
}

impl Debug for Instrumentation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation").finish()
    }
}

impl Instrumentation {
    /// Instruments backed by the globally installed providers.
    pub fn global() -> Self {
        let tracer = global::tracer_with_scope(scope(TRACER_NAME));
        let meter = global::meter_with_scope(scope(METER_NAME));
        Self::from_parts(tracer, &meter)
    }

    /// Instruments backed by explicit SDK providers, bypassing global state.
    ///
    /// The caller keeps a handle to each provider for as long as exported
    /// data is read: dropping the last handle shuts the provider down, and
    /// in-memory exporters discard what they hold on shutdown.
    pub fn from_providers(
        tracer_provider: &SdkTracerProvider,
        meter_provider: &SdkMeterProvider,
    ) -> Self {
        let tracer = BoxedTracer::new(Box::new(
            tracer_provider.tracer_with_scope(scope(TRACER_NAME)),
        ));
        let meter = meter_provider.meter_with_scope(scope(METER_NAME));
        Self::from_parts(tracer, &meter)
    }

    fn from_parts(tracer: BoxedTracer, meter: &Meter) -> Self {
        let operations = meter
            .u64_counter(OPERATIONS_COUNTER)
            .with_description("Count of book operations")
            .with_unit("operations")
            .build();
        let duration = meter
            .f64_histogram(DURATION_HISTOGRAM)
            .with_description("Duration of book operations")
            .with_unit("ms")
            .build();

        Self {
            tracer: Arc::new(tracer),
            operations,
            duration,
        }
    }

    pub fn tracer(&self) -> &BoxedTracer {
        &self.tracer
    }

    /// Traced operation with duration recording.
    ///
    /// On success the elapsed wall-clock time in milliseconds is recorded into
    /// the duration histogram keyed by the same attributes as the span.
    pub async fn execute<T, E, F>(
        &self,
        name: &'static str,
        attributes: Vec<KeyValue>,
        work: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        let started = Instant::now();
        let result = trace_call(&self.tracer, name, attributes.clone(), work).await;

        if result.is_ok() {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.duration.record(elapsed_ms, &attributes);
        }

        result
    }

    /// Increment the operation counter for `operation` with the given outcome.
    pub fn count(&self, operation: &'static str, status: OperationStatus) {
        self.operations.add(
            1,
            &[
                KeyValue::new("operation", operation),
                KeyValue::new("status", status.as_str()),
            ],
        );
    }
}

//! Logging, tracing, and metrics bootstrap.

use anyhow::Context as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    metrics::SdkMeterProvider, propagation::TraceContextPropagator, trace::SdkTracerProvider,
    Resource,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod instrumentation;
pub mod settings;

pub use instrumentation::{trace_call, Instrumentation, OperationStatus};
pub use settings::{LogFormat, TelemetrySettings, TraceExporter};

/// Keeps the installed providers alive; flush them with [`TelemetryGuard::shutdown`].
pub struct TelemetryGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl TelemetryGuard {
    /// Flush pending spans and metrics. Failures are logged, never fatal.
    pub fn shutdown(self) {
        if let Err(err) = self.tracer_provider.shutdown() {
            tracing::warn!(error = %err, "failed to shut down tracer provider");
        }
        if let Err(err) = self.meter_provider.shutdown() {
            tracing::warn!(error = %err, "failed to shut down meter provider");
        }
        tracing::info!("telemetry shut down");
    }
}

/// Install the log subscriber, the W3C trace-context propagator, and the
/// global tracer and meter providers.
///
/// Must run before the async runtime starts: the OTLP HTTP exporters use a
/// blocking client on their own export threads.
pub fn init(settings: &TelemetrySettings, environment: &str) -> anyhow::Result<TelemetryGuard> {
    init_subscriber(settings)?;

    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::builder()
        .with_service_name(settings.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", settings.service_version.clone()),
            KeyValue::new("environment", environment.to_string()),
        ])
        .build();

    let tracer_provider = build_tracer_provider(settings, resource.clone())?;
    let meter_provider = build_meter_provider(settings, resource)?;

    global::set_tracer_provider(tracer_provider.clone());
    global::set_meter_provider(meter_provider.clone());

    tracing::info!(
        target: "shelf-telemetry",
        service = %settings.service_name,
        traces = ?settings.traces,
        traces_endpoint = %settings.otlp_traces_endpoint,
        metrics_endpoint = ?settings.otlp_metrics_endpoint,
        "telemetry initialized"
    );

    Ok(TelemetryGuard {
        tracer_provider,
        meter_provider,
    })
}

fn init_subscriber(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .with_context(|| format!("invalid log filter '{}'", settings.log_filter))?;

    let registry = tracing_subscriber::registry().with(filter);
    match settings.log_format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    }
    .context("failed to install log subscriber")
}

fn build_tracer_provider(
    settings: &TelemetrySettings,
    resource: Resource,
) -> anyhow::Result<SdkTracerProvider> {
    let builder = SdkTracerProvider::builder().with_resource(resource);

    let provider = match settings.traces {
        TraceExporter::None => builder.build(),
        TraceExporter::Otlp => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(settings.otlp_traces_endpoint.clone())
                .build()
                .context("failed to build OTLP span exporter")?;
            builder.with_batch_exporter(exporter).build()
        }
    };

    Ok(provider)
}

fn build_meter_provider(
    settings: &TelemetrySettings,
    resource: Resource,
) -> anyhow::Result<SdkMeterProvider> {
    let builder = SdkMeterProvider::builder().with_resource(resource);

    let provider = match &settings.otlp_metrics_endpoint {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::MetricExporter::builder()
                .with_http()
                .with_endpoint(endpoint.clone())
                .build()
                .context("failed to build OTLP metric exporter")?;
            builder.with_periodic_exporter(exporter).build()
        }
        None => builder.build(),
    };

    Ok(provider)
}

use serde::Deserialize;

/// Telemetry section of the layered settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "TelemetrySettings::default_service_name")]
    pub service_name: String,
    #[serde(default = "TelemetrySettings::default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "TelemetrySettings::default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub traces: TraceExporter,
    #[serde(default = "TelemetrySettings::default_otlp_traces_endpoint")]
    pub otlp_traces_endpoint: String,
    /// Metrics are only exported when an endpoint is configured.
    #[serde(default)]
    pub otlp_metrics_endpoint: Option<String>,
}

impl TelemetrySettings {
    fn default_service_name() -> String {
        "books-api".to_string()
    }

    fn default_service_version() -> String {
        "1.0.0".to_string()
    }

    fn default_log_filter() -> String {
        "info".to_string()
    }

    fn default_otlp_traces_endpoint() -> String {
        "http://localhost:4318/v1/traces".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            service_name: Self::default_service_name(),
            service_version: Self::default_service_version(),
            log_format: LogFormat::Pretty,
            log_filter: Self::default_log_filter(),
            traces: TraceExporter::default(),
            otlp_traces_endpoint: Self::default_otlp_traces_endpoint(),
            otlp_metrics_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where finished spans are sent.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TraceExporter {
    /// Spans are created (and propagated) but never exported.
    None,
    #[default]
    Otlp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_export_traces_over_otlp_http() {
        let settings = TelemetrySettings::default();
        assert_eq!(settings.traces, TraceExporter::Otlp);
        assert_eq!(settings.otlp_traces_endpoint, "http://localhost:4318/v1/traces");
        assert!(settings.otlp_metrics_endpoint.is_none());
    }
}

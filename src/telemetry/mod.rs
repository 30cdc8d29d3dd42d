// src/telemetry/mod.rs
// Telemetry spine: tracing subscriber, OTLP/metrics exporters, sanitized emission

pub mod breaker;
pub mod sanitize;

use crate::config::{ExporterKind, TelemetryConfig};
use crate::error::Result;
use breaker::TelemetryBreaker;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use std::sync::LazyLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Process-global circuit breaker shared by all emission helpers.
static BREAKER: LazyLock<TelemetryBreaker> = LazyLock::new(TelemetryBreaker::new);

/// Keeps exporter providers alive; shuts them down on drop.
pub struct TelemetryGuard {
    tracer_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::debug!(error = %e, "OTLP tracer shutdown failed");
            }
        }
    }
}

/// Initialize the global subscriber and configured exporters.
///
/// `json_logs` selects the structured JSON formatter (hook and server paths);
/// interactive CLI commands use the plain stderr formatter. Call once at
/// startup; later calls are ignored by `try_init`.
pub fn init(config: &TelemetryConfig, json_logs: bool) -> Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_env("SCRIBE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn,scribe=info"));

    sanitize::set_debug_mode(config.debug);

    let mut guard = TelemetryGuard {
        tracer_provider: None,
    };

    if !config.enabled {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
        return Ok(guard);
    }

    let otel_layer = config
        .exporters
        .iter()
        .find(|e| e.kind == ExporterKind::Otlp)
        .and_then(|exporter| match build_otlp_tracer(exporter.endpoint.as_deref()) {
            Ok(provider) => {
                let tracer = provider.tracer("scribe");
                guard.tracer_provider = Some(provider);
                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            }
            Err(e) => {
                tracing::warn!(error = %e, "OTLP exporter init failed, continuing without it");
                BREAKER.record_failure();
                None
            }
        });

    if config
        .exporters
        .iter()
        .any(|e| e.kind == ExporterKind::Prometheus)
    {
        install_prometheus();
    }

    // JSON logs carry trace_id/span_id via the fmt layer's span context when
    // a recording span is active.
    let base = tracing_subscriber::registry().with(filter).with(otel_layer);
    if json_logs {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr);
        let _ = base.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false);
        let _ = base.with(fmt_layer).try_init();
    }

    Ok(guard)
}

fn build_otlp_tracer(
    endpoint: Option<&str>,
) -> anyhow::Result<opentelemetry_sdk::trace::SdkTracerProvider> {
    let mut builder = opentelemetry_otlp::SpanExporter::builder().with_tonic();
    if let Some(endpoint) = endpoint {
        builder = builder.with_endpoint(endpoint.to_string());
    }
    let exporter = builder.build()?;
    Ok(opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build())
}

fn install_prometheus() {
    match metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        Ok(()) => tracing::debug!("Prometheus metrics exporter installed"),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus exporter init failed");
            BREAKER.record_failure();
        }
    }
}

/// Increment an operation counter, subject to the circuit breaker.
pub fn counter(name: &'static str, value: u64) {
    if !BREAKER.is_enabled() {
        return;
    }
    metrics::counter!(name).increment(value);
    BREAKER.record_success();
}

/// Increment a counter with a success/failure outcome label.
pub fn outcome_counter(name: &'static str, success: bool) {
    if !BREAKER.is_enabled() {
        return;
    }
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!(name, "outcome" => outcome).increment(1);
    BREAKER.record_success();
}

/// Record an operation duration histogram in milliseconds.
pub fn duration_ms(name: &'static str, millis: f64) {
    if !BREAKER.is_enabled() {
        return;
    }
    metrics::histogram!(name).record(millis);
    BREAKER.record_success();
}

/// Record a gauge (queue depths, message counts).
pub fn gauge(name: &'static str, value: f64) {
    if !BREAKER.is_enabled() {
        return;
    }
    metrics::gauge!(name).set(value);
    BREAKER.record_success();
}

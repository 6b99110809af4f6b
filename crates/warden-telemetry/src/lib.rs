//! Structured logging init and the default [`TelemetrySink`] adapter
//! (spec.md §4.10, §9).

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use warden_core::facade::TelemetrySink;

/// Errors from telemetry setup.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The OTel tracer pipeline failed to install.
    #[error("otel setup failed: {0}")]
    Otel(String),
}

/// Initialize JSON-structured logging with an env filter
/// (`RUST_LOG`, e.g. `"info,warden_agents=debug"`). Idempotent: a
/// second call is a silent no-op if a global subscriber is already set.
pub fn init_json_logging() {
    let fmt_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Install an OTLP tracer pipeline for `service_name` (behind the
/// `otel` feature). Does not attach a `tracing` layer; callers that
/// want span export through `tracing` must bridge it themselves.
#[cfg(feature = "otel")]
pub fn init_otel(service_name: &str) -> Result<(), TelemetryError> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::trace as sdktrace;
    use opentelemetry_sdk::{runtime, Resource};

    let resource = Resource::new(vec![KeyValue::new("service.name", service_name.to_owned())]);
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().http())
        .with_trace_config(sdktrace::config().with_resource(resource))
        .install_batch(runtime::Tokio)
        .map_err(|e| TelemetryError::Otel(e.to_string()))?;
    Ok(())
}

/// [`TelemetrySink`] that emits every span/event through `tracing`,
/// at `info` level, as a structured JSON field. This is the sink
/// `warden-agents` wires by default; an OTLP-backed sink would layer
/// on top of the same `tracing` subscriber via [`init_otel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

#[async_trait]
impl TelemetrySink for TracingTelemetrySink {
    async fn emit(&self, kind: &str, payload: serde_json::Value) {
        tracing::info!(kind, payload = %payload, "telemetry event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_sink_does_not_panic_without_a_subscriber() {
        let sink = TracingTelemetrySink;
        sink.emit("test.kind", serde_json::json!({"a": 1})).await;
    }
}

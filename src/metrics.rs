use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::info;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder; later calls return the existing handle
pub fn init_metrics() -> Result<PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        // Buckets: 10ms .. 30s, upstream polls are slow
        .set_buckets_for_metric(
            Matcher::Full("skyrelay.poll.duration_ms".to_string()),
            &[
                10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0,
            ],
        )
        .context("Failed to set buckets for skyrelay.poll.duration_ms")?
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let handle = METRICS_HANDLE.get_or_init(|| handle).clone();
    initialize_metrics();
    info!("Prometheus metrics recorder installed");

    Ok(handle)
}

/// Register every relay metric at zero so dashboards see them before traffic
pub fn initialize_metrics() {
    metrics::counter!("skyrelay.poll.success_total").absolute(0);
    metrics::counter!("skyrelay.poll.errors_total").absolute(0);
    metrics::gauge!("skyrelay.sse.active_streams").set(0.0);
}

/// Handler for GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match METRICS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics recorder not installed".to_string(),
        ),
    }
}

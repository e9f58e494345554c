//! Prometheus exposition for task-bridge.
//!
//! HTTP request metrics come from the shared middleware; policy decisions and
//! upstream calls are counted where they happen.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder. Calling it twice is an error.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("Metrics handle already initialized"))?;

    Ok(())
}

/// Metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count one call to an upstream API.
pub fn record_upstream_call(upstream: &'static str, outcome: &'static str) {
    metrics::counter!(
        "upstream_calls_total",
        "upstream" => upstream,
        "outcome" => outcome
    )
    .increment(1);
}

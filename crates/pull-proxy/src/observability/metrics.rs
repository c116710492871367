//! Metrics definitions for the pull proxy.
//!
//! All metrics follow Prometheus naming conventions:
//! - `pull_proxy_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `outcome`: 4 values (success, failed, timeout, cancelled)
//! - `reason`: bounded by `PullErrorKind` (5 values)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Bucket layout:
/// - connect duration: handshakes usually finish well under the 10s timeout
/// - retry delay: the 2s..60s backoff range
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("pull_proxy_connect_duration_seconds".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set connect duration buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("pull_proxy_retry_delay_seconds".to_string()),
            &[1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0],
        )
        .map_err(|e| format!("Failed to set retry delay buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Record the outcome of one connect attempt.
///
/// Metrics: `pull_proxy_connect_attempts_total`, `pull_proxy_connect_duration_seconds`
/// Labels: `outcome`
pub fn record_connect_attempt(outcome: &str, duration: Duration) {
    counter!("pull_proxy_connect_attempts_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("pull_proxy_connect_duration_seconds", "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}

/// Record a scheduled reconnect and its delay.
///
/// Metrics: `pull_proxy_reconnects_scheduled_total`, `pull_proxy_retry_delay_seconds`
pub fn record_reconnect_scheduled(delay: Duration) {
    counter!("pull_proxy_reconnects_scheduled_total").increment(1);
    histogram!("pull_proxy_retry_delay_seconds").record(delay.as_secs_f64());
}

/// Record the loss of an established session.
///
/// Metric: `pull_proxy_disconnects_total`
/// Labels: `reason` (a `PullErrorKind`)
pub fn record_disconnect(reason: &str) {
    counter!("pull_proxy_disconnects_total", "reason" => reason.to_string()).increment(1);
}

/// Metric: `pull_proxy_active_closes_total`
pub fn record_active_close() {
    counter!("pull_proxy_active_closes_total").increment(1);
}

/// Record that a proxy stopped after running out of retries.
///
/// Metric: `pull_proxy_budget_exhausted_total`
pub fn record_budget_exhausted() {
    counter!("pull_proxy_budget_exhausted_total").increment(1);
}

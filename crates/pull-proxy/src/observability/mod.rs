//! Observability for the pull proxy.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `pull_proxy_connect_attempts_total` | Counter | `outcome` | Connect attempts by result |
//! | `pull_proxy_connect_duration_seconds` | Histogram | `outcome` | Time to connect or fail |
//! | `pull_proxy_reconnects_scheduled_total` | Counter | none | Retries armed |
//! | `pull_proxy_retry_delay_seconds` | Histogram | none | Backoff delays chosen |
//! | `pull_proxy_disconnects_total` | Counter | `reason` | Established sessions lost |
//! | `pull_proxy_active_closes_total` | Counter | none | Sink-requested closes |
//! | `pull_proxy_budget_exhausted_total` | Counter | none | Proxies that gave up |
//!
//! # Logging
//!
//! Targets: `pull_proxy.actor`, `pull_proxy.attempt`, `pull_proxy.events`,
//! `pull_proxy.config`. Upstream URLs are logged with credentials masked.

pub mod metrics;
pub mod status;

pub use metrics::init_metrics_recorder;
pub use status::status_router;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "pull_proxy=info";

/// Install a global `tracing` subscriber for embedding binaries.
///
/// Honors `RUST_LOG`; `json` switches to JSON lines.
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init_tracing(json: bool) -> Result<(), String> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| format!("Failed to install tracing subscriber: {e}"))
}

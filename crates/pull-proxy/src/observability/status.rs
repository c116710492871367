//! Status endpoints for a pull proxy.
//!
//! - `GET /health` - 200 while the proxy actor is running, 503 after it stopped
//! - `GET /ready` - 200 while the upstream is live, 503 otherwise
//! - `GET /status` - JSON [`ProxySnapshot`](crate::actors::ProxySnapshot)
//!
//! The `/metrics` endpoint is served separately via `metrics-exporter-prometheus`.

use crate::actors::{ProxySnapshot, PullProxyHandle};
use crate::types::LiveStatus;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

/// Create the status router for one proxy.
pub fn status_router(handle: PullProxyHandle) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .with_state(handle)
}

async fn liveness_handler(State(handle): State<PullProxyHandle>) -> StatusCode {
    if handle.is_running() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(State(handle): State<PullProxyHandle>) -> StatusCode {
    if handle.status() == LiveStatus::Live {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn status_handler(State(handle): State<PullProxyHandle>) -> Json<ProxySnapshot> {
    Json(handle.snapshot())
}

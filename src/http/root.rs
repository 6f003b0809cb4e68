//! Liveness and warm-up endpoints.

use std::time::UNIX_EPOCH;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use super::server::AppState;

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({ "ok": 1 }))
}

/// `GET /hello`
pub async fn hello() -> Json<Value> {
    Json(json!({ "hello": "world" }))
}

/// `GET /_ah/warmup`
pub async fn warmup() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub status: &'static str,
    pub version: &'static str,
    /// Unix seconds.
    pub started_at: u64,
    pub uptime_secs: u64,
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    let started_at = state
        .started_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(ServiceStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at,
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

//! Liveness endpoint.

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Body of GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process is serving.
    pub status: &'static str,
    /// Name of the service.
    pub service: &'static str,
    /// Crate version of the running binary.
    pub version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "postwall",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Returns the health check router. It needs no state.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

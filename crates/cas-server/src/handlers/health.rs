//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

/// Response for GET /healthz.
#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Handle GET /healthz.
pub(crate) async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

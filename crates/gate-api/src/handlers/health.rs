//! Health check handlers
//!
//! Endpoints for liveness and readiness probes.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Readiness response with per-dependency health
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: bool,
    pub cache: bool,
}

/// Basic health check (liveness probe)
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check with dependency health
///
/// GET /health/ready
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let db_healthy = state
        .service_context()
        .pool()
        .acquire()
        .await
        .map(|_| true)
        .unwrap_or(false);

    let cache_healthy = state
        .service_context()
        .abuse_store()
        .health_check()
        .await
        .is_ok();

    // A dead cache degrades the abuse gate (which fails open) but does not
    // take authentication down; only the database is load-bearing here.
    let status = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = ReadinessResponse {
        status: if db_healthy { "ready" } else { "degraded" },
        database: db_healthy,
        cache: cache_healthy,
    };

    (status, Json(response))
}

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// Number of registered providers.
    pub providers: usize,
    /// Groups currently being polled.
    pub running_groups: usize,
}

/// GET /api/health -- sidecar liveness probe.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = aiyou_db::health_check(&state.pool).await.is_ok();

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        providers: state.registry.providers().len(),
        running_groups: state.supervisor.running_count().await,
    })
}

/// Mount health check routes (root level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health_check))
}

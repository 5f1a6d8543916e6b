//! Route definitions for model health, priorities, and providers.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::models;
use crate::state::AppState;

/// ```text
/// GET    /models/health                   -> list_model_health
/// POST   /models/health/reset             -> reset_model_health
/// GET    /models/priorities/{category}    -> get_priorities
/// PUT    /models/priorities/{category}    -> set_priorities
/// GET    /providers                       -> list_providers
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/models/health", get(models::list_model_health))
        .route("/models/health/reset", post(models::reset_model_health))
        .route(
            "/models/priorities/{category}",
            get(models::get_priorities).put(models::set_priorities),
        )
        .route("/providers", get(models::list_providers))
}

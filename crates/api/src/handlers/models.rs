//! Handlers for model health, fallback priorities, and configured providers.

use aiyou_core::catalog::{self, ModelCategory};
use aiyou_core::generation_config::ProviderInfo;
use aiyou_core::health::ModelHealth;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ResetHealthRequest {
    /// Reset one model; all models when absent.
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetHealthResponse {
    pub reset: u64,
}

#[derive(Debug, Deserialize)]
pub struct SetPriorityRequest {
    pub model_ids: Vec<String>,
}

/// A registered provider and the catalog models it serves.
#[derive(Debug, Serialize)]
pub struct ProviderView {
    #[serde(flatten)]
    pub info: ProviderInfo,
    pub models: Vec<&'static str>,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// GET /api/v1/models/health
///
/// Health of every catalog model, in catalog order. Models that were never
/// attempted report as healthy.
pub async fn list_model_health(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let mut snapshot = state.health.snapshot().await;
    let health: Vec<ModelHealth> = catalog::all_models()
        .iter()
        .map(|m| {
            snapshot
                .remove(m.id)
                .unwrap_or_else(|| ModelHealth::unseen(m.id))
        })
        .collect();
    Ok(Json(DataResponse { data: health }))
}

/// POST /api/v1/models/health/reset
///
/// The body is optional; an empty body resets every model.
pub async fn reset_model_health(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let input: ResetHealthRequest = if body.is_empty() {
        ResetHealthRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid reset body: {e}")))?
    };
    let reset = state.health.reset(input.model_id.as_deref()).await?;
    tracing::info!(model_id = ?input.model_id, reset, "Model health reset");
    Ok(Json(DataResponse {
        data: ResetHealthResponse { reset },
    }))
}

// ---------------------------------------------------------------------------
// Priorities
// ---------------------------------------------------------------------------

/// GET /api/v1/models/priorities/{category}
pub async fn get_priorities(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> AppResult<impl IntoResponse> {
    let category = ModelCategory::from_str_db(&category)?;
    let entries = state.resolver.priorities(category).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// PUT /api/v1/models/priorities/{category}
pub async fn set_priorities(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Json(input): Json<SetPriorityRequest>,
) -> AppResult<impl IntoResponse> {
    let category = ModelCategory::from_str_db(&category)?;
    let entries = state
        .resolver
        .set_priority(category, &input.model_ids)
        .await?;
    Ok(Json(DataResponse { data: entries }))
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// GET /api/v1/providers
pub async fn list_providers(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let providers: Vec<ProviderView> = state
        .registry
        .providers()
        .into_iter()
        .map(|info| {
            let models = catalog::all_models()
                .iter()
                .filter(|m| m.provider_id == info.id)
                .map(|m| m.id)
                .collect();
            ProviderView { info, models }
        })
        .collect();
    Ok(Json(DataResponse { data: providers }))
}

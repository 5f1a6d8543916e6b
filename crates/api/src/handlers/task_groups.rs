//! Handlers for task group planning, prompts, and generation control.
//!
//! Every state change goes through the [`GenerationSupervisor`] so the
//! in-flight guard and the lifecycle rules apply uniformly.
//!
//! [`GenerationSupervisor`]: aiyou_pipeline::GenerationSupervisor

use aiyou_core::error::CoreError;
use aiyou_core::generation_config::GenerationConfig;
use aiyou_core::shot::Shot;
use aiyou_core::types::DbId;
use aiyou_db::models::generation_task::GenerationTask;
use aiyou_db::models::task_group::TaskGroup;
use aiyou_db::repositories::{GenerationTaskRepo, TaskGroupRepo};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /projects/{project_id}/task-groups/plan`.
#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub shots: Vec<Shot>,
    /// Overrides the configured planner bound.
    #[serde(default)]
    pub max_group_duration_secs: Option<f64>,
    #[serde(default)]
    pub config: GenerationConfig,
}

/// Body of `PUT /task-groups/{id}/prompt`. A missing or blank prompt clears it.
#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceImageRequest {
    pub url: String,
}

/// A group with its submission history.
#[derive(Debug, Serialize)]
pub struct TaskGroupDetail {
    #[serde(flatten)]
    pub group: TaskGroup,
    pub tasks: Vec<GenerationTask>,
}

// ---------------------------------------------------------------------------
// Project scope
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/task-groups/plan
///
/// Replace the project's groups with a fresh plan. Returns 201.
pub async fn plan_task_groups(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(input): Json<PlanRequest>,
) -> AppResult<impl IntoResponse> {
    let groups = state
        .supervisor
        .plan_groups(
            &project_id,
            &input.shots,
            input.max_group_duration_secs,
            input.config,
        )
        .await?;

    tracing::info!(
        project_id = %project_id,
        shot_count = input.shots.len(),
        group_count = groups.len(),
        "Task groups planned",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: groups })))
}

/// GET /api/v1/projects/{project_id}/task-groups
///
/// The project's groups with their aggregated overall status.
pub async fn list_task_groups(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let progress = state.supervisor.project_progress(&project_id).await?;
    Ok(Json(DataResponse { data: progress }))
}

/// POST /api/v1/projects/{project_id}/generate
///
/// Start every group of the project that is ready. Per-group failures are
/// reported in the body rather than failing the request.
pub async fn generate_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let launches = state.supervisor.generate_all(&project_id).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: launches })))
}

// ---------------------------------------------------------------------------
// Single group
// ---------------------------------------------------------------------------

/// GET /api/v1/task-groups/{id}
pub async fn get_task_group(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let group = TaskGroupRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "TaskGroup",
            id,
        }))?;
    let tasks = GenerationTaskRepo::list_for_group(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: TaskGroupDetail { group, tasks },
    }))
}

/// PUT /api/v1/task-groups/{id}/prompt
pub async fn set_prompt(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<PromptRequest>,
) -> AppResult<impl IntoResponse> {
    let group = state
        .supervisor
        .assign_prompt(id, input.prompt.as_deref())
        .await?;
    Ok(Json(DataResponse { data: group }))
}

/// PUT /api/v1/task-groups/{id}/reference-image
pub async fn set_reference_image(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ReferenceImageRequest>,
) -> AppResult<impl IntoResponse> {
    let url = input.url.trim();
    if url.is_empty() {
        return Err(AppError::BadRequest("url must not be empty".into()));
    }
    let group = state.supervisor.attach_reference_image(id, url).await?;
    Ok(Json(DataResponse { data: group }))
}

/// POST /api/v1/task-groups/{id}/generate
///
/// Start one group. Returns 202 with the group in `uploading`; progress
/// arrives over the WebSocket stream.
pub async fn generate_group(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let group = state.supervisor.generate(id).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: group })))
}

/// POST /api/v1/task-groups/{id}/cancel
pub async fn cancel_group(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let group = state.supervisor.cancel(id).await?;
    Ok(Json(DataResponse { data: group }))
}

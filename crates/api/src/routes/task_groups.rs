//! Route definitions for projects and task groups.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::task_groups;
use crate::state::AppState;

/// Routes mounted at the `/api/v1` root.
///
/// ```text
/// GET    /projects/{project_id}/task-groups        -> list_task_groups
/// POST   /projects/{project_id}/task-groups/plan   -> plan_task_groups
/// POST   /projects/{project_id}/generate           -> generate_project
/// GET    /task-groups/{id}                         -> get_task_group
/// PUT    /task-groups/{id}/prompt                  -> set_prompt
/// PUT    /task-groups/{id}/reference-image         -> set_reference_image
/// POST   /task-groups/{id}/generate                -> generate_group
/// POST   /task-groups/{id}/cancel                  -> cancel_group
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/task-groups",
            get(task_groups::list_task_groups),
        )
        .route(
            "/projects/{project_id}/task-groups/plan",
            post(task_groups::plan_task_groups),
        )
        .route(
            "/projects/{project_id}/generate",
            post(task_groups::generate_project),
        )
        .route("/task-groups/{id}", get(task_groups::get_task_group))
        .route("/task-groups/{id}/prompt", put(task_groups::set_prompt))
        .route(
            "/task-groups/{id}/reference-image",
            put(task_groups::set_reference_image),
        )
        .route("/task-groups/{id}/generate", post(task_groups::generate_group))
        .route("/task-groups/{id}/cancel", post(task_groups::cancel_group))
}

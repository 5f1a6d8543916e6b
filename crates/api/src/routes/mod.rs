pub mod health;
pub mod models;
pub mod task_groups;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                              WebSocket event stream
///
/// /projects/{project_id}/task-groups               list with overall status
/// /projects/{project_id}/task-groups/plan          plan from shots (POST)
/// /projects/{project_id}/generate                  start all ready groups (POST)
///
/// /task-groups/{id}                                get with task history
/// /task-groups/{id}/prompt                         set or clear prompt (PUT)
/// /task-groups/{id}/reference-image                attach image (PUT)
/// /task-groups/{id}/generate                       start (POST)
/// /task-groups/{id}/cancel                         cancel (POST)
///
/// /models/health                                   health of every model
/// /models/health/reset                             reset counters (POST)
/// /models/priorities/{category}                    get, replace (PUT)
/// /providers                                       configured providers
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(task_groups::router())
        .merge(models::router())
}

//! Submission attempt entity model.

use aiyou_core::error::CoreError;
use aiyou_core::task_status::AttemptState;
use aiyou_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `generation_tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationTask {
    pub id: DbId,
    pub task_group_id: DbId,
    pub provider_id: String,
    pub model_id: String,
    /// Set once the provider accepts the job.
    pub provider_task_id: Option<String>,
    pub state: String,
    pub progress: i64,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub submitted_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl GenerationTask {
    pub fn state(&self) -> Result<AttemptState, CoreError> {
        AttemptState::from_str_db(&self.state)
    }
}

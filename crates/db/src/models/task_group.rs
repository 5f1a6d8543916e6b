//! Task group entity model.

use aiyou_core::error::CoreError;
use aiyou_core::generation_config::GenerationConfig;
use aiyou_core::lifecycle::GroupStatus;
use aiyou_core::shot::Shot;
use aiyou_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `task_groups` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskGroup {
    pub id: DbId,
    pub project_id: String,
    pub group_number: i64,
    pub shot_ids: Json<Vec<String>>,
    pub shots: Json<Vec<Shot>>,
    pub total_duration_secs: f64,
    pub config: Json<GenerationConfig>,
    pub prompt: Option<String>,
    pub reference_image_url: Option<String>,
    pub status: String,
    pub progress: i64,
    /// Model used by the most recent attempt.
    pub model_id: Option<String>,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TaskGroup {
    /// Parsed lifecycle status.
    pub fn status(&self) -> Result<GroupStatus, CoreError> {
        GroupStatus::from_str_db(&self.status)
    }
}

/// Insert DTO produced from a planned group.
#[derive(Debug, Clone)]
pub struct NewTaskGroup {
    pub group_number: i64,
    pub shots: Vec<Shot>,
    pub total_duration_secs: f64,
    pub config: GenerationConfig,
    pub reference_image_url: Option<String>,
}

//! Model health entity model.

use aiyou_core::health::HealthRecord;
use aiyou_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `model_health` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ModelHealthRow {
    pub model_id: String,
    pub attempts: i64,
    pub failures: i64,
    pub consecutive_failures: i64,
    pub last_failure_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl From<ModelHealthRow> for HealthRecord {
    fn from(row: ModelHealthRow) -> Self {
        Self {
            model_id: row.model_id,
            attempts: clamp_count(row.attempts),
            failures: clamp_count(row.failures),
            consecutive_failures: clamp_count(row.consecutive_failures),
            last_failure_at: row.last_failure_at,
        }
    }
}

fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

//! Model priority entity model.

use serde::Serialize;
use sqlx::FromRow;

/// A row from the `model_priorities` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ModelPriority {
    pub category: String,
    /// Zero-based position in the user's order.
    pub position: i64,
    pub model_id: String,
}

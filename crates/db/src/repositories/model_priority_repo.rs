//! Repository for the `model_priorities` table.

use crate::models::model_priority::ModelPriority;
use crate::DbPool;

/// Provides persistence for per-category user preference order.
pub struct ModelPriorityRepo;

impl ModelPriorityRepo {
    /// The user's ordered model ids for a category. Empty when never set.
    pub async fn list(pool: &DbPool, category: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ModelPriority>(
            "SELECT category, position, model_id FROM model_priorities \
             WHERE category = ?1 ORDER BY position",
        )
        .bind(category)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.model_id).collect())
    }

    /// Replace a category's order in one transaction.
    pub async fn replace(
        pool: &DbPool,
        category: &str,
        model_ids: &[String],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM model_priorities WHERE category = ?1")
            .bind(category)
            .execute(&mut *tx)
            .await?;
        for (position, model_id) in model_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO model_priorities (category, position, model_id) VALUES (?1, ?2, ?3)",
            )
            .bind(category)
            .bind(position as i64)
            .bind(model_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }
}

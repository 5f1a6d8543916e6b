//! Repository for the `model_health` table.

use aiyou_core::health::HealthRecord;
use chrono::Utc;

use crate::models::model_health::ModelHealthRow;
use crate::DbPool;

/// Column list for `model_health` queries.
const COLUMNS: &str =
    "model_id, attempts, failures, consecutive_failures, last_failure_at, updated_at";

/// Provides persistence for per-model outcome counters.
pub struct ModelHealthRepo;

impl ModelHealthRepo {
    /// Every stored record, ordered by model id.
    pub async fn list_all(pool: &DbPool) -> Result<Vec<ModelHealthRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM model_health ORDER BY model_id");
        sqlx::query_as::<_, ModelHealthRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Find one model's record.
    pub async fn find(
        pool: &DbPool,
        model_id: &str,
    ) -> Result<Option<ModelHealthRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM model_health WHERE model_id = ?1");
        sqlx::query_as::<_, ModelHealthRow>(&query)
            .bind(model_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or overwrite a model's counters.
    pub async fn upsert(pool: &DbPool, record: &HealthRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO model_health \
                (model_id, attempts, failures, consecutive_failures, last_failure_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (model_id) DO UPDATE SET \
                attempts = excluded.attempts, \
                failures = excluded.failures, \
                consecutive_failures = excluded.consecutive_failures, \
                last_failure_at = excluded.last_failure_at, \
                updated_at = excluded.updated_at",
        )
        .bind(&record.model_id)
        .bind(i64::from(record.attempts))
        .bind(i64::from(record.failures))
        .bind(i64::from(record.consecutive_failures))
        .bind(record.last_failure_at)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Zero one model's counters. Returns `false` if no record exists.
    pub async fn reset(pool: &DbPool, model_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE model_health \
             SET attempts = 0, failures = 0, consecutive_failures = 0, \
                 last_failure_at = NULL, updated_at = ?2 \
             WHERE model_id = ?1",
        )
        .bind(model_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Zero every model's counters. Returns the number of records reset.
    pub async fn reset_all(pool: &DbPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE model_health \
             SET attempts = 0, failures = 0, consecutive_failures = 0, \
                 last_failure_at = NULL, updated_at = ?1",
        )
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

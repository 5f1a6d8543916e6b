//! Repository for the `generation_tasks` table.
//!
//! Every submission attempt gets a row. The newest row of a group is the
//! authoritative one; older rows are history.

use aiyou_core::task_status::AttemptState;
use aiyou_core::types::{DbId, Timestamp};
use chrono::Utc;

use crate::models::generation_task::GenerationTask;
use crate::DbPool;

/// Column list for `generation_tasks` queries.
const COLUMNS: &str = "\
    id, task_group_id, provider_id, model_id, provider_task_id, state, \
    progress, result_url, error_message, submitted_at, completed_at";

/// Provides persistence for submission attempts.
pub struct GenerationTaskRepo;

impl GenerationTaskRepo {
    /// Insert a new attempt in the `submitting` state.
    pub async fn create(
        pool: &DbPool,
        task_group_id: DbId,
        provider_id: &str,
        model_id: &str,
        submitted_at: Timestamp,
    ) -> Result<GenerationTask, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_tasks \
                (task_group_id, provider_id, model_id, state, progress, submitted_at) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationTask>(&query)
            .bind(task_group_id)
            .bind(provider_id)
            .bind(model_id)
            .bind(AttemptState::Submitting.as_str())
            .bind(submitted_at)
            .fetch_one(pool)
            .await
    }

    /// Find an attempt by id.
    pub async fn find_by_id(
        pool: &DbPool,
        id: DbId,
    ) -> Result<Option<GenerationTask>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_tasks WHERE id = ?1");
        sqlx::query_as::<_, GenerationTask>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The authoritative (newest) attempt of a group.
    pub async fn latest_for_group(
        pool: &DbPool,
        task_group_id: DbId,
    ) -> Result<Option<GenerationTask>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_tasks \
             WHERE task_group_id = ?1 ORDER BY id DESC LIMIT 1"
        );
        sqlx::query_as::<_, GenerationTask>(&query)
            .bind(task_group_id)
            .fetch_optional(pool)
            .await
    }

    /// Every attempt of a group, oldest first.
    pub async fn list_for_group(
        pool: &DbPool,
        task_group_id: DbId,
    ) -> Result<Vec<GenerationTask>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_tasks WHERE task_group_id = ?1 ORDER BY id"
        );
        sqlx::query_as::<_, GenerationTask>(&query)
            .bind(task_group_id)
            .fetch_all(pool)
            .await
    }

    /// Record the provider's task id once the job is accepted.
    pub async fn set_provider_task_id(
        pool: &DbPool,
        id: DbId,
        provider_task_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE generation_tasks SET provider_task_id = ?2, state = ?3 WHERE id = ?1")
            .bind(id)
            .bind(provider_task_id)
            .bind(AttemptState::Queued.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record a live state and progress.
    pub async fn update_progress(
        pool: &DbPool,
        id: DbId,
        state: AttemptState,
        progress: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE generation_tasks SET state = ?2, progress = ?3 WHERE id = ?1")
            .bind(id)
            .bind(state.as_str())
            .bind(progress)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Close the attempt as completed.
    pub async fn complete(pool: &DbPool, id: DbId, result_url: &str) -> Result<(), sqlx::Error> {
        Self::finish(pool, id, AttemptState::Completed, Some(result_url), None).await
    }

    /// Close the attempt as failed.
    pub async fn fail(pool: &DbPool, id: DbId, error_message: &str) -> Result<(), sqlx::Error> {
        Self::finish(pool, id, AttemptState::Error, None, Some(error_message)).await
    }

    /// Close the attempt after an explicit cancel.
    pub async fn mark_cancelled(pool: &DbPool, id: DbId) -> Result<(), sqlx::Error> {
        Self::finish(pool, id, AttemptState::Cancelled, None, None).await
    }

    /// Close an attempt lost before the provider accepted it.
    pub async fn mark_interrupted(pool: &DbPool, id: DbId) -> Result<(), sqlx::Error> {
        Self::finish(pool, id, AttemptState::Interrupted, None, None).await
    }

    async fn finish(
        pool: &DbPool,
        id: DbId,
        state: AttemptState,
        result_url: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let progress_sql = if state == AttemptState::Completed {
            "100"
        } else {
            "progress"
        };
        let query = format!(
            "UPDATE generation_tasks \
             SET state = ?2, progress = {progress_sql}, result_url = ?3, error_message = ?4, \
                 completed_at = ?5 \
             WHERE id = ?1"
        );
        sqlx::query(&query)
            .bind(id)
            .bind(state.as_str())
            .bind(result_url)
            .bind(error_message)
            .bind(Utc::now())
            .execute(pool)
            .await?;
        Ok(())
    }
}

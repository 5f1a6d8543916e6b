//! Repository for the `task_groups` table.
//!
//! Status values are written through `GroupStatus::as_str`; no string
//! literals for statuses appear in the queries below except the in-flight
//! filter, which is built from the same enum.

use aiyou_core::lifecycle::GroupStatus;
use aiyou_core::types::DbId;
use chrono::Utc;
use sqlx::types::Json;

use crate::models::task_group::{NewTaskGroup, TaskGroup};
use crate::DbPool;

/// Column list for `task_groups` queries.
const COLUMNS: &str = "\
    id, project_id, group_number, shot_ids, shots, total_duration_secs, \
    config, prompt, reference_image_url, status, progress, model_id, \
    result_url, error_message, created_at, updated_at";

/// Statuses a new attempt may start from.
const STARTABLE: [GroupStatus; 3] = [
    GroupStatus::PromptReady,
    GroupStatus::ImageFused,
    GroupStatus::Failed,
];

/// Statuses with a provider call or polling loop outstanding.
const IN_FLIGHT: [GroupStatus; 3] = [
    GroupStatus::Uploading,
    GroupStatus::Queued,
    GroupStatus::Processing,
];

fn status_list(statuses: &[GroupStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Provides persistence for task groups.
pub struct TaskGroupRepo;

impl TaskGroupRepo {
    /// Replace every group of a project with a freshly planned set.
    ///
    /// Runs in one transaction; attempts of the old groups cascade away.
    pub async fn replace_for_project(
        pool: &DbPool,
        project_id: &str,
        groups: &[NewTaskGroup],
    ) -> Result<Vec<TaskGroup>, sqlx::Error> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM task_groups WHERE project_id = ?1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO task_groups \
                (project_id, group_number, shot_ids, shots, total_duration_secs, config, \
                 reference_image_url, status, progress, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9) \
             RETURNING {COLUMNS}"
        );
        let mut created = Vec::with_capacity(groups.len());
        for group in groups {
            let shot_ids: Vec<String> = group.shots.iter().map(|s| s.id.clone()).collect();
            let row = sqlx::query_as::<_, TaskGroup>(&query)
                .bind(project_id)
                .bind(group.group_number)
                .bind(Json(&shot_ids))
                .bind(Json(&group.shots))
                .bind(group.total_duration_secs)
                .bind(Json(&group.config))
                .bind(group.reference_image_url.as_deref())
                .bind(GroupStatus::Idle.as_str())
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
            created.push(row);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Find a group by its internal id.
    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<TaskGroup>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM task_groups WHERE id = ?1");
        sqlx::query_as::<_, TaskGroup>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's groups in group-number order.
    pub async fn list_by_project(
        pool: &DbPool,
        project_id: &str,
    ) -> Result<Vec<TaskGroup>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM task_groups WHERE project_id = ?1 ORDER BY group_number"
        );
        sqlx::query_as::<_, TaskGroup>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// List every group persisted as uploading, queued, or processing.
    pub async fn list_in_flight(pool: &DbPool) -> Result<Vec<TaskGroup>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM task_groups WHERE status IN ({}) ORDER BY id",
            status_list(&IN_FLIGHT)
        );
        sqlx::query_as::<_, TaskGroup>(&query).fetch_all(pool).await
    }

    /// Count a project's in-flight groups.
    pub async fn count_in_flight_for_project(
        pool: &DbPool,
        project_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*) FROM task_groups WHERE project_id = ?1 AND status IN ({})",
            status_list(&IN_FLIGHT)
        );
        let (count,): (i64,) = sqlx::query_as(&query)
            .bind(project_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Store (or clear) a prompt and move the group to `status`.
    ///
    /// Progress, result, and error are cleared.
    pub async fn set_prompt(
        pool: &DbPool,
        id: DbId,
        prompt: Option<&str>,
        status: GroupStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE task_groups \
             SET prompt = ?2, status = ?3, progress = 0, result_url = NULL, \
                 error_message = NULL, updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(prompt)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Attach the fused reference image and move to `image_fused`.
    pub async fn mark_image_fused(
        pool: &DbPool,
        id: DbId,
        reference_image_url: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE task_groups \
             SET reference_image_url = ?2, status = ?3, updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(reference_image_url)
        .bind(GroupStatus::ImageFused.as_str())
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Atomically move a startable group to `uploading` for a new attempt.
    ///
    /// Returns `false` when the group was not in a startable status, so two
    /// concurrent generate requests cannot both start.
    pub async fn begin_attempt(
        pool: &DbPool,
        id: DbId,
        model_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE task_groups \
             SET status = ?2, progress = 0, model_id = ?3, result_url = NULL, \
                 error_message = NULL, updated_at = ?4 \
             WHERE id = ?1 AND status IN ({})",
            status_list(&STARTABLE)
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(GroupStatus::Uploading.as_str())
            .bind(model_id)
            .bind(Utc::now())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a live status and progress.
    pub async fn update_progress(
        pool: &DbPool,
        id: DbId,
        status: GroupStatus,
        progress: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE task_groups SET status = ?2, progress = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(progress)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark the group completed with its media URL.
    pub async fn mark_completed(
        pool: &DbPool,
        id: DbId,
        result_url: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE task_groups \
             SET status = ?2, progress = 100, result_url = ?3, error_message = NULL, \
                 updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(GroupStatus::Completed.as_str())
        .bind(result_url)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark the group failed with a human-readable error.
    pub async fn mark_failed(
        pool: &DbPool,
        id: DbId,
        error_message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE task_groups \
             SET status = ?2, error_message = ?3, result_url = NULL, updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(GroupStatus::Failed.as_str())
        .bind(error_message)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Return the group to `prompt_ready` with progress 0 and no error.
    pub async fn reset_to_prompt_ready(pool: &DbPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE task_groups \
             SET status = ?2, progress = 0, result_url = NULL, error_message = NULL, \
                 updated_at = ?3 \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(GroupStatus::PromptReady.as_str())
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }
}

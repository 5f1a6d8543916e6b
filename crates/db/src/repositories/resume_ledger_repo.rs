//! Repository for the `resume_ledger` table.
//!
//! A provider task id is resumed at most once per process run. The claim is
//! a single `INSERT OR IGNORE`, so concurrent callers cannot both win.

use chrono::Utc;

use crate::DbPool;

/// Provides the durable "already resumed" set.
pub struct ResumeLedgerRepo;

impl ResumeLedgerRepo {
    /// Claim `provider_task_id` for `run_id`. Returns `false` when it was
    /// already claimed by this run.
    pub async fn try_claim(
        pool: &DbPool,
        run_id: &str,
        provider_task_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO resume_ledger (run_id, provider_task_id, resumed_at) \
             VALUES (?1, ?2, ?3)",
        )
        .bind(run_id)
        .bind(provider_task_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Drop entries left by earlier runs.
    pub async fn purge_other_runs(pool: &DbPool, run_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM resume_ledger WHERE run_id <> ?1")
            .bind(run_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

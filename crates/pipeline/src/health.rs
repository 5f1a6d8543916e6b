//! Process-wide model health tracking.
//!
//! One record per model id. Updates are serialized through a single lock
//! that is held while the record is written through to the database, so
//! concurrent outcomes for the same model never lose an increment and the
//! stored row always matches the in-memory one.

use std::collections::HashMap;

use aiyou_core::health::{HealthRecord, ModelHealth};
use aiyou_db::repositories::ModelHealthRepo;
use aiyou_db::DbPool;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::PipelineError;

pub struct ModelHealthTracker {
    pool: DbPool,
    records: Mutex<HashMap<String, HealthRecord>>,
}

impl ModelHealthTracker {
    /// Build the tracker from the persisted records.
    pub async fn load(pool: DbPool) -> Result<Self, PipelineError> {
        let rows = ModelHealthRepo::list_all(&pool).await?;
        let records: HashMap<String, HealthRecord> = rows
            .into_iter()
            .map(HealthRecord::from)
            .map(|r| (r.model_id.clone(), r))
            .collect();
        tracing::info!(models = records.len(), "Loaded model health records");
        Ok(Self {
            pool,
            records: Mutex::new(records),
        })
    }

    /// Apply one terminal outcome and persist the updated record.
    ///
    /// Returns the record as it stood right after this outcome was applied.
    pub async fn record_outcome(
        &self,
        model_id: &str,
        success: bool,
    ) -> Result<HealthRecord, PipelineError> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(model_id.to_string())
            .or_insert_with(|| HealthRecord::new(model_id));
        record.record_outcome(success, Utc::now());
        let snapshot = record.clone();
        ModelHealthRepo::upsert(&self.pool, &snapshot).await?;

        if !success {
            let health = snapshot.health();
            if !health.healthy {
                tracing::warn!(
                    model_id,
                    consecutive_failures = health.consecutive_failures,
                    "Model marked unhealthy",
                );
            }
        }
        Ok(snapshot)
    }

    /// Health of one model. Models never attempted are healthy.
    pub async fn get_health(&self, model_id: &str) -> ModelHealth {
        self.records
            .lock()
            .await
            .get(model_id)
            .map(HealthRecord::health)
            .unwrap_or_else(|| ModelHealth::unseen(model_id))
    }

    /// Health of every model with a record.
    pub async fn snapshot(&self) -> HashMap<String, ModelHealth> {
        self.records
            .lock()
            .await
            .iter()
            .map(|(id, r)| (id.clone(), r.health()))
            .collect()
    }

    /// Zero the counters of one model, or of every model when `model_id` is
    /// `None`. Returns how many records were reset.
    pub async fn reset(&self, model_id: Option<&str>) -> Result<u64, PipelineError> {
        let mut records = self.records.lock().await;
        let count = match model_id {
            Some(id) => {
                let existed = ModelHealthRepo::reset(&self.pool, id).await?;
                if let Some(record) = records.get_mut(id) {
                    record.reset();
                }
                u64::from(existed)
            }
            None => {
                let count = ModelHealthRepo::reset_all(&self.pool).await?;
                records.values_mut().for_each(HealthRecord::reset);
                count
            }
        };
        tracing::info!(model_id = model_id.unwrap_or("*"), count, "Reset model health");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn test_pool() -> DbPool {
        let pool = aiyou_db::create_pool("sqlite::memory:").await.unwrap();
        aiyou_db::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn unseen_model_is_healthy() {
        let tracker = ModelHealthTracker::load(test_pool().await).await.unwrap();
        let health = tracker.get_health("sora-2").await;
        assert!(health.healthy);
        assert_eq!(health.success_rate, 100.0);
    }

    #[tokio::test]
    async fn three_failures_then_success() {
        let tracker = ModelHealthTracker::load(test_pool().await).await.unwrap();
        for _ in 0..3 {
            tracker.record_outcome("sora-2", false).await.unwrap();
        }
        assert!(!tracker.get_health("sora-2").await.healthy);

        tracker.record_outcome("sora-2", true).await.unwrap();
        let health = tracker.get_health("sora-2").await;
        assert!(health.healthy);
        assert_eq!(health.attempts, 4);
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.success_rate, 25.0);
    }

    #[tokio::test]
    async fn records_survive_reload() {
        let pool = test_pool().await;
        let tracker = ModelHealthTracker::load(pool.clone()).await.unwrap();
        tracker.record_outcome("kling-v2-1", false).await.unwrap();
        tracker.record_outcome("kling-v2-1", false).await.unwrap();
        drop(tracker);

        let reloaded = ModelHealthTracker::load(pool).await.unwrap();
        let health = reloaded.get_health("kling-v2-1").await;
        assert_eq!(health.attempts, 2);
        assert_eq!(health.consecutive_failures, 2);
        assert!(health.last_failure_at.is_some());
    }

    #[tokio::test]
    async fn reset_one_and_all() {
        let tracker = ModelHealthTracker::load(test_pool().await).await.unwrap();
        tracker.record_outcome("a", false).await.unwrap();
        tracker.record_outcome("b", false).await.unwrap();

        assert_eq!(tracker.reset(Some("a")).await.unwrap(), 1);
        assert_eq!(tracker.get_health("a").await.attempts, 0);
        assert_eq!(tracker.get_health("b").await.attempts, 1);
        assert_eq!(tracker.reset(Some("missing")).await.unwrap(), 0);

        tracker.reset(None).await.unwrap();
        assert_eq!(tracker.get_health("b").await.attempts, 0);
        assert!(tracker.get_health("b").await.healthy);
    }

    #[tokio::test]
    async fn concurrent_outcomes_are_not_lost() {
        let tracker = Arc::new(ModelHealthTracker::load(test_pool().await).await.unwrap());
        let outcomes: Vec<bool> = (0..40).map(|i| i % 3 == 0 || i % 7 == 0).collect();

        let handles: Vec<_> = outcomes
            .iter()
            .map(|&success| {
                let tracker = Arc::clone(&tracker);
                tokio::spawn(async move {
                    let after = tracker.record_outcome("hailuo-02", success).await.unwrap();
                    (after.attempts, success)
                })
            })
            .collect();

        let mut applied = Vec::new();
        for handle in handles {
            applied.push(handle.await.unwrap());
        }
        // The attempt count right after each update gives the arrival order.
        applied.sort_by_key(|(attempts, _)| *attempts);
        let order: Vec<u32> = applied.iter().map(|(a, _)| *a).collect();
        assert_eq!(order, (1..=40).collect::<Vec<u32>>());

        let trailing_failures = applied
            .iter()
            .rev()
            .take_while(|(_, success)| !success)
            .count() as u32;
        let health = tracker.get_health("hailuo-02").await;
        assert_eq!(health.attempts, 40);
        assert_eq!(health.consecutive_failures, trailing_failures);
        let failures = outcomes.iter().filter(|s| !**s).count() as f64;
        assert!((health.success_rate - (40.0 - failures) / 40.0 * 100.0).abs() < 1e-9);
    }
}

//! Per-model health records and the health verdict derived from them.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// A model is unhealthy once this many failures occur in a row.
pub const UNHEALTHY_CONSECUTIVE_FAILURES: u32 = 3;

/// Success rate reported for a model with no recorded attempts.
pub const UNSEEN_SUCCESS_RATE: f64 = 100.0;

/// Outcome counters for one model id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub model_id: String,
    pub attempts: u32,
    pub failures: u32,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Timestamp>,
}

impl HealthRecord {
    /// A record with no history.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            attempts: 0,
            failures: 0,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }

    /// Apply one terminal task outcome.
    pub fn record_outcome(&mut self, success: bool, now: Timestamp) {
        self.attempts = self.attempts.saturating_add(1);
        if success {
            self.consecutive_failures = 0;
        } else {
            self.failures = self.failures.saturating_add(1);
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.last_failure_at = Some(now);
        }
    }

    /// Zero every counter, keeping the record itself.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.failures = 0;
        self.consecutive_failures = 0;
        self.last_failure_at = None;
    }

    pub fn successes(&self) -> u32 {
        self.attempts.saturating_sub(self.failures)
    }

    /// The verdict the resolver reads.
    pub fn health(&self) -> ModelHealth {
        let success_rate = if self.attempts == 0 {
            UNSEEN_SUCCESS_RATE
        } else {
            f64::from(self.successes()) / f64::from(self.attempts) * 100.0
        };
        ModelHealth {
            model_id: self.model_id.clone(),
            healthy: self.consecutive_failures < UNHEALTHY_CONSECUTIVE_FAILURES,
            success_rate,
            consecutive_failures: self.consecutive_failures,
            attempts: self.attempts,
            last_failure_at: self.last_failure_at,
        }
    }
}

/// Health snapshot for display and selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHealth {
    pub model_id: String,
    pub healthy: bool,
    /// Percentage in `0.0..=100.0`.
    pub success_rate: f64,
    pub consecutive_failures: u32,
    pub attempts: u32,
    pub last_failure_at: Option<Timestamp>,
}

impl ModelHealth {
    /// Verdict for a model that has never been attempted.
    pub fn unseen(model_id: impl Into<String>) -> Self {
        HealthRecord::new(model_id).health()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn unseen_model_is_healthy_with_full_rate() {
        let health = ModelHealth::unseen("sora-2");
        assert!(health.healthy);
        assert_eq!(health.success_rate, 100.0);
        assert_eq!(health.attempts, 0);
    }

    #[test]
    fn three_consecutive_failures_mark_unhealthy() {
        let mut record = HealthRecord::new("m1");
        let now = Utc::now();
        record.record_outcome(false, now);
        record.record_outcome(false, now);
        assert!(record.health().healthy);
        record.record_outcome(false, now);
        let health = record.health();
        assert!(!health.healthy);
        assert_eq!(health.consecutive_failures, 3);
        assert_eq!(health.success_rate, 0.0);
        assert_eq!(record.last_failure_at, Some(now));
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let mut record = HealthRecord::new("m1");
        let now = Utc::now();
        for _ in 0..3 {
            record.record_outcome(false, now);
        }
        record.record_outcome(true, now);
        let health = record.health();
        assert!(health.healthy);
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.attempts, 4);
        assert_eq!(health.success_rate, 25.0);
        // Last failure stamp survives the success.
        assert_eq!(record.last_failure_at, Some(now));
    }

    #[test]
    fn reset_clears_counters() {
        let mut record = HealthRecord::new("m1");
        record.record_outcome(false, Utc::now());
        record.reset();
        assert_eq!(record, HealthRecord::new("m1"));
    }
}

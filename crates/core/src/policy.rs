//! Polling and timeout policy for live and resumed tasks.
//!
//! The bounds are plain parameters. They are not scaled by any
//! provider-declared expected duration.

use std::time::Duration;

use crate::types::Timestamp;

/// Default delay between two status probes of one task.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default age after which a live task is force-failed.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(600);
/// Default age after which a task found on restart is force-failed.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(600);

/// Timing parameters shared by the orchestrator and the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationPolicy {
    pub poll_interval: Duration,
    pub task_timeout: Duration,
    pub stale_after: Duration,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

impl GenerationPolicy {
    /// Whether a live task submitted at `submitted_at` has exceeded the
    /// timeout at `now`.
    pub fn has_timed_out(&self, submitted_at: Timestamp, now: Timestamp) -> bool {
        task_age(submitted_at, now) > self.task_timeout
    }

    /// Whether a task found on restart is too old to resume.
    pub fn is_stale(&self, submitted_at: Timestamp, now: Timestamp) -> bool {
        task_age(submitted_at, now) > self.stale_after
    }
}

/// Elapsed time since submission. Clock skew into the future counts as zero.
pub fn task_age(submitted_at: Timestamp, now: Timestamp) -> Duration {
    (now - submitted_at).to_std().unwrap_or(Duration::ZERO)
}

/// Human-readable message stored on a timed-out group.
pub fn timeout_message(bound: Duration) -> String {
    format!(
        "Generation timed out: no result after {} seconds",
        bound.as_secs()
    )
}

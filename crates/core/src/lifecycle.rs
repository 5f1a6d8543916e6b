//! Task group lifecycle: status values, the legal transition table, and
//! overall status aggregation.
//!
//! ```text
//! idle -> prompt_ready -> (image_fused)? -> uploading -> (queued|processing) -> completed | failed
//! ```
//!
//! `completed` and `failed` are terminal for a generation attempt. Leaving
//! them again requires an explicit operator action: a fresh generate
//! request (from `failed`) or a new prompt assignment.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Group status
// ---------------------------------------------------------------------------

/// Lifecycle status of a task group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Idle,
    PromptReady,
    ImageFused,
    Uploading,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl GroupStatus {
    /// Parse a status string from the database.
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "idle" => Ok(Self::Idle),
            "prompt_ready" => Ok(Self::PromptReady),
            "image_fused" => Ok(Self::ImageFused),
            "uploading" => Ok(Self::Uploading),
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(CoreError::Validation(format!(
                "Invalid group status '{s}'. Must be one of: {}",
                Self::ALL.join(", ")
            ))),
        }
    }

    /// Convert to a database-compatible string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PromptReady => "prompt_ready",
            Self::ImageFused => "image_fused",
            Self::Uploading => "uploading",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// All valid status values.
    pub const ALL: &'static [&'static str] = &[
        "idle",
        "prompt_ready",
        "image_fused",
        "uploading",
        "queued",
        "processing",
        "completed",
        "failed",
    ];

    /// `completed` and `failed` end a generation attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// A provider call or polling loop may be outstanding for this group.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Uploading | Self::Queued | Self::Processing)
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Whether `from -> to` is a legal lifecycle transition.
///
/// `completed` and `failed` are only reachable from `uploading`, `queued`
/// or `processing`, so no path reaches a terminal state without passing
/// through `uploading`. Cancellation of any prompted, non-terminal status
/// returns to `prompt_ready`.
pub fn can_transition(from: GroupStatus, to: GroupStatus) -> bool {
    use GroupStatus::*;
    matches!(
        (from, to),
        (Idle, PromptReady)
            | (PromptReady, Idle)
            | (PromptReady, ImageFused)
            | (PromptReady, Uploading)
            | (ImageFused, PromptReady)
            | (ImageFused, Uploading)
            | (Uploading, Queued)
            | (Uploading, Processing)
            | (Uploading, Completed)
            | (Uploading, Failed)
            | (Uploading, PromptReady)
            | (Queued, Processing)
            | (Queued, Completed)
            | (Queued, Failed)
            | (Queued, PromptReady)
            | (Processing, Processing)
            | (Processing, Completed)
            | (Processing, Failed)
            | (Processing, PromptReady)
            | (Failed, Uploading)
            | (Failed, PromptReady)
            | (Failed, Idle)
            | (Completed, PromptReady)
            | (Completed, Idle)
    )
}

/// Reject an illegal transition with a conflict error.
pub fn validate_transition(from: GroupStatus, to: GroupStatus) -> Result<(), CoreError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Cannot move task group from '{from}' to '{to}'"
        )))
    }
}

/// Status a group lands in after cancellation, or `None` when there is
/// nothing to cancel (`idle` has no prompt; terminal groups are final).
pub fn cancel_target(from: GroupStatus) -> Option<GroupStatus> {
    match from {
        GroupStatus::PromptReady
        | GroupStatus::ImageFused
        | GroupStatus::Uploading
        | GroupStatus::Queued
        | GroupStatus::Processing => Some(GroupStatus::PromptReady),
        GroupStatus::Idle | GroupStatus::Completed | GroupStatus::Failed => None,
    }
}

/// Check that a generate request may start from `status` with `prompt`.
///
/// A missing prompt is a validation error; a group that is already running
/// or finished is a conflict. Neither changes any state.
pub fn check_generate_allowed(status: GroupStatus, prompt: Option<&str>) -> Result<(), CoreError> {
    match status {
        GroupStatus::PromptReady | GroupStatus::ImageFused | GroupStatus::Failed => {
            if prompt.map(str::trim).unwrap_or_default().is_empty() {
                return Err(CoreError::Validation(
                    "Task group has no prompt; assign a prompt before generating".to_string(),
                ));
            }
            Ok(())
        }
        GroupStatus::Idle => Err(CoreError::Validation(
            "Task group has no prompt; assign a prompt before generating".to_string(),
        )),
        GroupStatus::Uploading | GroupStatus::Queued | GroupStatus::Processing => Err(
            CoreError::Conflict(format!("Task group is already generating ('{status}')")),
        ),
        GroupStatus::Completed => Err(CoreError::Conflict(
            "Task group is already completed; assign a new prompt to regenerate".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Combined status across every group of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Processing,
    Completed,
    Failed,
}

/// `failed` if any group failed, `completed` if every group completed,
/// otherwise `processing`. An empty project counts as completed.
pub fn aggregate_status<I>(statuses: I) -> OverallStatus
where
    I: IntoIterator<Item = GroupStatus>,
{
    let mut all_completed = true;
    for status in statuses {
        match status {
            GroupStatus::Failed => return OverallStatus::Failed,
            GroupStatus::Completed => {}
            _ => all_completed = false,
        }
    }
    if all_completed {
        OverallStatus::Completed
    } else {
        OverallStatus::Processing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use GroupStatus::*;

    const EVERY: [GroupStatus; 8] = [
        Idle,
        PromptReady,
        ImageFused,
        Uploading,
        Queued,
        Processing,
        Completed,
        Failed,
    ];

    // -- status strings --

    #[test]
    fn db_strings_round_trip() {
        for status in EVERY {
            assert_eq!(GroupStatus::from_str_db(status.as_str()).unwrap(), status);
        }
        assert_eq!(GroupStatus::ALL.len(), EVERY.len());
    }

    #[test]
    fn unknown_db_string_rejected() {
        assert_matches!(
            GroupStatus::from_str_db("cancelled"),
            Err(CoreError::Validation(_))
        );
    }

    // -- transitions --

    #[test]
    fn happy_path_is_legal() {
        let path = [Idle, PromptReady, ImageFused, Uploading, Queued, Processing, Completed];
        for pair in path.windows(2) {
            assert!(can_transition(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn terminal_states_unreachable_without_uploading() {
        for from in [Idle, PromptReady, ImageFused] {
            assert!(!can_transition(from, Completed));
            assert!(!can_transition(from, Failed));
        }
    }

    #[test]
    fn random_walks_pass_through_uploading_before_terminal() {
        let mut seed: u64 = 42;
        for _ in 0..500 {
            let mut status = Idle;
            let mut uploaded = false;
            for _ in 0..12 {
                let legal: Vec<GroupStatus> =
                    EVERY.into_iter().filter(|to| can_transition(status, *to)).collect();
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
                let next = legal[(seed >> 33) as usize % legal.len()];
                if next == Uploading {
                    uploaded = true;
                }
                if next.is_terminal() {
                    assert!(uploaded, "reached {next} without uploading");
                }
                // A new attempt must upload again.
                if matches!(next, Idle | PromptReady) {
                    uploaded = false;
                }
                status = next;
            }
        }
    }

    #[test]
    fn illegal_transition_is_conflict() {
        assert_matches!(
            validate_transition(Idle, Processing),
            Err(CoreError::Conflict(_))
        );
        assert!(validate_transition(Processing, Completed).is_ok());
    }

    // -- cancellation --

    #[test]
    fn cancel_lands_in_prompt_ready() {
        for from in [PromptReady, ImageFused, Uploading, Queued, Processing] {
            assert_eq!(cancel_target(from), Some(PromptReady));
            assert!(from == PromptReady || can_transition(from, PromptReady));
        }
        assert_eq!(cancel_target(Completed), None);
        assert_eq!(cancel_target(Failed), None);
        assert_eq!(cancel_target(Idle), None);
    }

    // -- generate guard --

    #[test]
    fn generate_requires_prompt() {
        assert_matches!(
            check_generate_allowed(PromptReady, Some("   ")),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            check_generate_allowed(Idle, None),
            Err(CoreError::Validation(_))
        );
        assert!(check_generate_allowed(PromptReady, Some("a cat")).is_ok());
        assert!(check_generate_allowed(Failed, Some("a cat")).is_ok());
    }

    #[test]
    fn generate_rejected_while_running_or_done() {
        for status in [Uploading, Queued, Processing, Completed] {
            assert_matches!(
                check_generate_allowed(status, Some("a cat")),
                Err(CoreError::Conflict(_))
            );
        }
    }

    // -- aggregation --

    #[test]
    fn aggregate_any_failed_is_failed() {
        assert_eq!(aggregate_status([Completed, Failed, Processing]), OverallStatus::Failed);
    }

    #[test]
    fn aggregate_all_completed_is_completed() {
        assert_eq!(aggregate_status([Completed, Completed]), OverallStatus::Completed);
        assert_eq!(aggregate_status(Vec::new()), OverallStatus::Completed);
    }

    #[test]
    fn aggregate_otherwise_processing() {
        assert_eq!(aggregate_status([Completed, Idle]), OverallStatus::Processing);
        assert_eq!(aggregate_status([Queued, Processing]), OverallStatus::Processing);
    }
}

//! Normalized provider task status and submission attempt states.
//!
//! Every adapter maps its own status vocabulary onto [`TaskState`]. Codes an
//! adapter does not recognise map to [`TaskState::Processing`] so a task is
//! never silently dropped.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Upper bound of a progress percentage.
pub const MAX_PROGRESS: u8 = 100;

// ---------------------------------------------------------------------------
// Normalized task state
// ---------------------------------------------------------------------------

/// The four states every provider status is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Processing,
    Completed,
    Error,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Result of one status probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    /// Percentage in `0..=100`.
    pub progress: u8,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

impl TaskStatus {
    pub fn queued() -> Self {
        Self {
            state: TaskState::Queued,
            progress: 0,
            result_url: None,
            error_message: None,
        }
    }

    pub fn processing(progress: u8) -> Self {
        Self {
            state: TaskState::Processing,
            progress: progress.min(MAX_PROGRESS),
            result_url: None,
            error_message: None,
        }
    }

    pub fn completed(result_url: impl Into<String>) -> Self {
        Self {
            state: TaskState::Completed,
            progress: MAX_PROGRESS,
            result_url: Some(result_url.into()),
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: TaskState::Error,
            progress: 0,
            result_url: None,
            error_message: Some(message.into()),
        }
    }

    /// A `completed` status without a media URL is unusable and is
    /// reported as an error instead.
    pub fn completed_or_error(result_url: Option<String>) -> Self {
        match result_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => Self::completed(url),
            None => Self::error("Provider reported completion without a result URL"),
        }
    }
}

/// Clamp a provider-reported percentage, accepting fractional and
/// out-of-range values.
pub fn clamp_progress(raw: f64) -> u8 {
    if !raw.is_finite() || raw <= 0.0 {
        0
    } else if raw >= f64::from(MAX_PROGRESS) {
        MAX_PROGRESS
    } else {
        raw.round() as u8
    }
}

/// Progress never regresses while a task is live.
pub fn merge_progress(previous: u8, reported: u8) -> u8 {
    previous.max(reported).min(MAX_PROGRESS)
}

// ---------------------------------------------------------------------------
// Attempt state
// ---------------------------------------------------------------------------

/// State of one persisted submission attempt (a `generation_tasks` row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    /// Submit call issued, no provider task id yet.
    Submitting,
    Queued,
    Processing,
    Completed,
    Error,
    /// Stopped by an explicit cancel request.
    Cancelled,
    /// Lost to a process exit before the provider accepted it.
    Interrupted,
}

impl AttemptState {
    /// Parse a state string from the database.
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "submitting" => Ok(Self::Submitting),
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "cancelled" => Ok(Self::Cancelled),
            "interrupted" => Ok(Self::Interrupted),
            _ => Err(CoreError::Validation(format!(
                "Invalid attempt state '{s}'"
            ))),
        }
    }

    /// Convert to a database-compatible string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitting => "submitting",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Error | Self::Cancelled | Self::Interrupted
        )
    }
}

impl From<TaskState> for AttemptState {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Queued => Self::Queued,
            TaskState::Processing => Self::Processing,
            TaskState::Completed => Self::Completed,
            TaskState::Error => Self::Error,
        }
    }
}

use aiyou_core::error::CoreError;
use aiyou_core::types::DbId;
use aiyou_providers::ProviderError;

/// Errors surfaced by pipeline operations.
///
/// Domain errors travel as [`CoreError`] so the HTTP layer maps them to
/// status codes in one place.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PipelineError {
    pub fn group_not_found(id: DbId) -> Self {
        Self::Core(CoreError::NotFound {
            entity: "TaskGroup",
            id,
        })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Core(CoreError::Validation(message.into()))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Core(CoreError::Conflict(message.into()))
    }
}

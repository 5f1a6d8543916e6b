//! The per-group state machine.
//!
//! A [`TaskOrchestrator`] takes one prepared group through submission,
//! polling, and a terminal write. Every status change is persisted before
//! it is published on the event bus. Health is recorded exactly once per
//! terminal outcome that the model is responsible for; cancellation and
//! shutdown never touch it.
//!
//! Two tokens govern the loop. `cancel` is the group's own token, a child of
//! `shutdown`. When `cancel` fires while `shutdown` has not, the user asked
//! for a cancel; otherwise the process is stopping and the group is left in
//! flight for the next start to resume.

use std::sync::Arc;

use aiyou_core::lifecycle::{check_generate_allowed, validate_transition, GroupStatus};
use aiyou_core::policy::{timeout_message, GenerationPolicy};
use aiyou_core::task_status::{merge_progress, AttemptState, TaskState, TaskStatus};
use aiyou_core::types::{DbId, Timestamp};
use aiyou_db::models::generation_task::GenerationTask;
use aiyou_db::models::task_group::TaskGroup;
use aiyou_db::repositories::{GenerationTaskRepo, TaskGroupRepo};
use aiyou_db::DbPool;
use aiyou_events::{EventBus, GenerationEvent, GenerationEventKind};
use aiyou_providers::{ProviderAdapter, ProviderRegistry, SubmitRequest};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::health::ModelHealthTracker;
use crate::resolver::{ModelPriorityResolver, ResolvedModel};

// ---------------------------------------------------------------------------
// Shared context
// ---------------------------------------------------------------------------

/// Everything an orchestrator needs, cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct OrchestratorContext {
    pub pool: DbPool,
    pub registry: Arc<ProviderRegistry>,
    pub health: Arc<ModelHealthTracker>,
    pub resolver: Arc<ModelPriorityResolver>,
    pub events: Arc<EventBus>,
    pub policy: GenerationPolicy,
}

/// How an orchestrator run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    Completed { result_url: String },
    Failed { error: String },
    /// Cancelled by request; the group is back at `prompt_ready`.
    Cancelled,
    /// Stopped by shutdown; the group stays in flight for resumption.
    Suspended,
}

/// A group that passed validation and has been moved to `uploading`.
pub struct PreparedAttempt {
    pub group: TaskGroup,
    prompt: String,
    model: ResolvedModel,
    adapter: Arc<dyn ProviderAdapter>,
}

/// A provider task that was accepted and is being polled.
pub struct LiveTask {
    pub task_id: DbId,
    pub provider_task_id: String,
    pub model_id: String,
    pub submitted_at: Timestamp,
    pub adapter: Arc<dyn ProviderAdapter>,
    /// Last persisted group status.
    pub status: GroupStatus,
    /// Last persisted progress; never decreases.
    pub progress: u8,
}

impl LiveTask {
    /// Rebuild the live view of a persisted attempt.
    pub fn from_persisted(
        task: &GenerationTask,
        group: &TaskGroup,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<Self, PipelineError> {
        let provider_task_id = task.provider_task_id.clone().ok_or_else(|| {
            PipelineError::conflict(format!("Attempt {} has no provider task id", task.id))
        })?;
        Ok(Self {
            task_id: task.id,
            provider_task_id,
            model_id: task.model_id.clone(),
            submitted_at: task.submitted_at,
            adapter,
            status: group.status()?,
            progress: group.progress.clamp(0, 100) as u8,
        })
    }
}

// ---------------------------------------------------------------------------
// TaskOrchestrator
// ---------------------------------------------------------------------------

pub struct TaskOrchestrator {
    ctx: OrchestratorContext,
    group_id: DbId,
    project_id: String,
    cancel: CancellationToken,
    shutdown: CancellationToken,
}

impl TaskOrchestrator {
    pub fn new(
        ctx: OrchestratorContext,
        group_id: DbId,
        project_id: impl Into<String>,
        cancel: CancellationToken,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            ctx,
            group_id,
            project_id: project_id.into(),
            cancel,
            shutdown,
        }
    }

    /// Validate a generate request, pick the model, and move the group to
    /// `uploading`.
    ///
    /// Errors leave the group untouched.
    pub async fn prepare(
        ctx: &OrchestratorContext,
        group_id: DbId,
    ) -> Result<PreparedAttempt, PipelineError> {
        let group = TaskGroupRepo::find_by_id(&ctx.pool, group_id)
            .await?
            .ok_or_else(|| PipelineError::group_not_found(group_id))?;
        let status = group.status()?;
        check_generate_allowed(status, group.prompt.as_deref())?;
        group.config.validate()?;
        let prompt = group.prompt.clone().unwrap_or_default();

        let model = ctx.resolver.resolve(group.config.category).await?;
        let adapter = ctx.registry.get(&model.provider_id).ok_or_else(|| {
            PipelineError::validation(format!(
                "Provider '{}' is not configured",
                model.provider_id
            ))
        })?;

        if !TaskGroupRepo::begin_attempt(&ctx.pool, group_id, &model.model_id).await? {
            return Err(PipelineError::conflict(
                "Task group changed state before generation could start",
            ));
        }
        let group = TaskGroupRepo::find_by_id(&ctx.pool, group_id)
            .await?
            .ok_or_else(|| PipelineError::group_not_found(group_id))?;

        ctx.events.publish(GenerationEvent::new(
            group_id,
            group.project_id.clone(),
            GenerationEventKind::StatusChanged {
                status: GroupStatus::Uploading,
                progress: 0,
            },
        ));
        tracing::info!(
            group_id,
            model_id = %model.model_id,
            provider = %model.provider_id,
            "Starting generation attempt",
        );
        Ok(PreparedAttempt {
            group,
            prompt,
            model,
            adapter,
        })
    }

    /// Submit the prepared attempt and poll it to a terminal state.
    pub async fn run(self, attempt: PreparedAttempt) -> GroupOutcome {
        let result = self.submit_and_poll(attempt).await;
        self.settle(result).await
    }

    /// Keep polling an attempt accepted before a restart.
    ///
    /// The caller has already probed once, so the first probe waits one
    /// poll interval.
    pub async fn resume(self, live: LiveTask) -> GroupOutcome {
        let result = self.poll(live, true).await;
        self.settle(result).await
    }

    async fn submit_and_poll(
        &self,
        attempt: PreparedAttempt,
    ) -> Result<GroupOutcome, PipelineError> {
        let PreparedAttempt {
            group,
            prompt,
            model,
            adapter,
        } = attempt;

        let submitted_at = Utc::now();
        let task = GenerationTaskRepo::create(
            &self.ctx.pool,
            self.group_id,
            &model.provider_id,
            &model.model_id,
            submitted_at,
        )
        .await?;
        let request = SubmitRequest::for_provider(
            adapter.info(),
            prompt,
            model.provider_model.as_str(),
            &group.config,
            group.reference_image_url.as_deref(),
        );

        let submitted = tokio::select! {
            _ = self.cancel.cancelled() => return self.on_cancelled(Some(task.id)).await,
            result = adapter.submit_task(&request) => result,
        };
        let response = match submitted {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(group_id = self.group_id, error = %e, "Provider rejected submission");
                return self
                    .fail(task.id, Some(model.model_id.as_str()), &e.to_string())
                    .await;
            }
        };

        GenerationTaskRepo::set_provider_task_id(&self.ctx.pool, task.id, &response.provider_task_id)
            .await?;
        validate_transition(GroupStatus::Uploading, GroupStatus::Queued)?;
        TaskGroupRepo::update_progress(&self.ctx.pool, self.group_id, GroupStatus::Queued, 0)
            .await?;
        self.publish(GenerationEventKind::StatusChanged {
            status: GroupStatus::Queued,
            progress: 0,
        });
        tracing::info!(
            group_id = self.group_id,
            provider_task_id = %response.provider_task_id,
            "Provider accepted task",
        );

        let live = LiveTask {
            task_id: task.id,
            provider_task_id: response.provider_task_id,
            model_id: model.model_id,
            submitted_at,
            adapter,
            status: GroupStatus::Queued,
            progress: 0,
        };
        self.poll(live, false).await
    }

    async fn poll(
        &self,
        mut live: LiveTask,
        wait_first: bool,
    ) -> Result<GroupOutcome, PipelineError> {
        if wait_first {
            tokio::select! {
                _ = self.cancel.cancelled() => return self.on_cancelled(Some(live.task_id)).await,
                _ = tokio::time::sleep(self.ctx.policy.poll_interval) => {}
            }
        }

        loop {
            if self.ctx.policy.has_timed_out(live.submitted_at, Utc::now()) {
                let message = timeout_message(self.ctx.policy.task_timeout);
                tracing::warn!(group_id = self.group_id, "Generation timed out");
                return self
                    .fail(live.task_id, Some(live.model_id.as_str()), &message)
                    .await;
            }

            let probe = tokio::select! {
                _ = self.cancel.cancelled() => return self.on_cancelled(Some(live.task_id)).await,
                result = live.adapter.check_status(&live.provider_task_id) => result,
            };
            match probe {
                Ok(status) => {
                    if let Some(outcome) = self.apply_status(&mut live, status).await? {
                        return Ok(outcome);
                    }
                }
                Err(e) => {
                    tracing::warn!(group_id = self.group_id, error = %e, "Status probe failed");
                    return self
                        .fail(live.task_id, Some(live.model_id.as_str()), &e.to_string())
                        .await;
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return self.on_cancelled(Some(live.task_id)).await,
                _ = tokio::time::sleep(self.ctx.policy.poll_interval) => {}
            }
        }
    }

    /// Apply one normalized status. Returns the outcome when it is terminal.
    ///
    /// Progress is merged so it never moves backwards, and a group that
    /// reached `processing` stays there until it finishes.
    pub async fn apply_status(
        &self,
        live: &mut LiveTask,
        status: TaskStatus,
    ) -> Result<Option<GroupOutcome>, PipelineError> {
        match status.state {
            TaskState::Completed => {
                let outcome = match status.result_url.filter(|u| !u.is_empty()) {
                    Some(url) => self.complete(live, &url).await?,
                    None => {
                        self.fail(
                            live.task_id,
                            Some(live.model_id.as_str()),
                            "Provider reported completion without a result URL",
                        )
                        .await?
                    }
                };
                Ok(Some(outcome))
            }
            TaskState::Error => {
                let message = status
                    .error_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Provider reported the task as failed".to_string());
                Ok(Some(
                    self.fail(live.task_id, Some(live.model_id.as_str()), &message)
                        .await?,
                ))
            }
            TaskState::Queued | TaskState::Processing => {
                let next = if status.state == TaskState::Processing
                    || live.status == GroupStatus::Processing
                {
                    GroupStatus::Processing
                } else {
                    GroupStatus::Queued
                };
                let progress = merge_progress(live.progress, status.progress);
                if next == live.status && progress == live.progress {
                    return Ok(None);
                }
                if next != live.status {
                    validate_transition(live.status, next)?;
                }

                let attempt_state = match next {
                    GroupStatus::Processing => AttemptState::Processing,
                    _ => AttemptState::Queued,
                };
                TaskGroupRepo::update_progress(
                    &self.ctx.pool,
                    self.group_id,
                    next,
                    i64::from(progress),
                )
                .await?;
                GenerationTaskRepo::update_progress(
                    &self.ctx.pool,
                    live.task_id,
                    attempt_state,
                    i64::from(progress),
                )
                .await?;
                live.status = next;
                live.progress = progress;
                self.publish(GenerationEventKind::StatusChanged {
                    status: next,
                    progress,
                });
                Ok(None)
            }
        }
    }

    async fn complete(
        &self,
        live: &LiveTask,
        result_url: &str,
    ) -> Result<GroupOutcome, PipelineError> {
        self.record_health(&live.model_id, true).await;
        GenerationTaskRepo::complete(&self.ctx.pool, live.task_id, result_url).await?;
        TaskGroupRepo::mark_completed(&self.ctx.pool, self.group_id, result_url).await?;
        self.publish(GenerationEventKind::Completed {
            result_url: result_url.to_string(),
            model_id: live.model_id.clone(),
        });
        tracing::info!(group_id = self.group_id, model_id = %live.model_id, "Generation completed");
        Ok(GroupOutcome::Completed {
            result_url: result_url.to_string(),
        })
    }

    /// Close the attempt and the group as failed.
    ///
    /// A failure is charged to `model_id` when one is given. Health is
    /// recorded before the group becomes terminal, so a regenerate that
    /// sees the failed group also sees the failure.
    pub async fn fail(
        &self,
        task_id: DbId,
        model_id: Option<&str>,
        message: &str,
    ) -> Result<GroupOutcome, PipelineError> {
        if let Some(model_id) = model_id {
            self.record_health(model_id, false).await;
        }
        GenerationTaskRepo::fail(&self.ctx.pool, task_id, message).await?;
        TaskGroupRepo::mark_failed(&self.ctx.pool, self.group_id, message).await?;
        self.publish(GenerationEventKind::Failed {
            error: message.to_string(),
            model_id: model_id.map(str::to_string),
        });
        tracing::info!(group_id = self.group_id, error = message, "Generation failed");
        Ok(GroupOutcome::Failed {
            error: message.to_string(),
        })
    }

    /// Drop an attempt the provider never accepted and return the group to
    /// `prompt_ready`. Used on restart; no health is recorded.
    pub async fn interrupt(&self, task_id: Option<DbId>) -> Result<(), PipelineError> {
        if let Some(task_id) = task_id {
            GenerationTaskRepo::mark_interrupted(&self.ctx.pool, task_id).await?;
        }
        TaskGroupRepo::reset_to_prompt_ready(&self.ctx.pool, self.group_id).await?;
        self.publish(GenerationEventKind::StatusChanged {
            status: GroupStatus::PromptReady,
            progress: 0,
        });
        tracing::info!(group_id = self.group_id, "Interrupted attempt reset to prompt_ready");
        Ok(())
    }

    async fn on_cancelled(&self, task_id: Option<DbId>) -> Result<GroupOutcome, PipelineError> {
        if self.shutdown.is_cancelled() {
            tracing::info!(group_id = self.group_id, "Suspending generation for shutdown");
            return Ok(GroupOutcome::Suspended);
        }
        if let Some(task_id) = task_id {
            GenerationTaskRepo::mark_cancelled(&self.ctx.pool, task_id).await?;
        }
        TaskGroupRepo::reset_to_prompt_ready(&self.ctx.pool, self.group_id).await?;
        self.publish(GenerationEventKind::Cancelled);
        tracing::info!(group_id = self.group_id, "Generation cancelled");
        Ok(GroupOutcome::Cancelled)
    }

    /// Turn an unexpected error into a failed group.
    async fn settle(&self, result: Result<GroupOutcome, PipelineError>) -> GroupOutcome {
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(group_id = self.group_id, error = %e, "Generation aborted");
                let message = format!("Generation aborted: {e}");
                if let Err(db_err) =
                    TaskGroupRepo::mark_failed(&self.ctx.pool, self.group_id, &message).await
                {
                    tracing::error!(
                        group_id = self.group_id,
                        error = %db_err,
                        "Failed to record aborted generation",
                    );
                }
                self.publish(GenerationEventKind::Failed {
                    error: message.clone(),
                    model_id: None,
                });
                GroupOutcome::Failed { error: message }
            }
        }
    }

    async fn record_health(&self, model_id: &str, success: bool) {
        if let Err(e) = self.ctx.health.record_outcome(model_id, success).await {
            tracing::error!(model_id, error = %e, "Failed to persist model health");
        }
    }

    fn publish(&self, kind: GenerationEventKind) {
        self.ctx
            .events
            .publish(GenerationEvent::new(self.group_id, self.project_id.clone(), kind));
    }
}

//! Group lifecycle management above the orchestrator.
//!
//! The supervisor owns one spawned [`TaskOrchestrator`] per running group,
//! keyed by group id, each with a child of the supervisor's shutdown token.
//! It plans groups from shots, applies prompt and reference-image edits,
//! starts and cancels generations, and on startup resumes every group the
//! previous process left in flight.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use aiyou_core::generation_config::{normalize_prompt, GenerationConfig, MAX_DURATION_SECS};
use aiyou_core::lifecycle::{
    aggregate_status, cancel_target, validate_transition, GroupStatus, OverallStatus,
};
use aiyou_core::planner::plan_task_groups;
use aiyou_core::policy::timeout_message;
use aiyou_core::shot::Shot;
use aiyou_core::types::DbId;
use aiyou_db::models::task_group::{NewTaskGroup, TaskGroup};
use aiyou_db::repositories::{GenerationTaskRepo, ResumeLedgerRepo, TaskGroupRepo};
use aiyou_events::{GenerationEvent, GenerationEventKind};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::orchestrator::{GroupOutcome, LiveTask, OrchestratorContext, TaskOrchestrator};

/// A spawned orchestrator.
///
/// The outcome is published on a watch channel so waiters never need to
/// take the entry out of the running map.
struct RunningGroup {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    outcome: watch::Receiver<Option<GroupOutcome>>,
}

impl RunningGroup {
    fn spawn<F>(cancel: CancellationToken, run: F) -> Self
    where
        F: Future<Output = GroupOutcome> + Send + 'static,
    {
        let (tx, outcome) = watch::channel(None);
        let handle = tokio::spawn(async move {
            let result = run.await;
            tx.send_replace(Some(result));
        });
        Self {
            cancel,
            handle,
            outcome,
        }
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to exit and return how it ended.
    async fn join(self) -> Result<Option<GroupOutcome>, tokio::task::JoinError> {
        self.handle.await?;
        let outcome = self.outcome.borrow().clone();
        Ok(outcome)
    }
}

/// Result of starting one group during a project-wide generate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupLaunch {
    pub group_id: DbId,
    pub started: bool,
    pub error: Option<String>,
}

/// A project's groups and their combined status.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectProgress {
    pub project_id: String,
    pub overall_status: OverallStatus,
    pub groups: Vec<TaskGroup>,
}

/// What startup resumption did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResumeReport {
    /// Polling restarted.
    pub resumed: usize,
    /// The first probe was terminal and was applied directly.
    pub applied: usize,
    /// Too old to resume; force-failed.
    pub stale_failed: usize,
    /// Never accepted by the provider; reset to `prompt_ready`.
    pub interrupted: usize,
    /// Provider no longer configured; failed without a health penalty.
    pub failed: usize,
    /// Already claimed or already running.
    pub skipped: usize,
    pub errors: usize,
}

enum ResumeAction {
    Resumed,
    Applied,
    StaleFailed,
    Interrupted,
    Failed,
    Skipped,
}

pub struct GenerationSupervisor {
    ctx: OrchestratorContext,
    run_id: String,
    max_group_duration_secs: f64,
    shutdown_timeout: Duration,
    shutdown: CancellationToken,
    running: RwLock<HashMap<DbId, RunningGroup>>,
}

impl GenerationSupervisor {
    pub fn new(ctx: OrchestratorContext, config: &PipelineConfig) -> Self {
        Self {
            ctx,
            run_id: uuid::Uuid::new_v4().to_string(),
            max_group_duration_secs: config.max_group_duration_secs,
            shutdown_timeout: config.shutdown_timeout,
            shutdown: CancellationToken::new(),
            running: RwLock::new(HashMap::new()),
        }
    }

    /// Identifier of this process run in the resume ledger.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn context(&self) -> &OrchestratorContext {
        &self.ctx
    }

    // -----------------------------------------------------------------------
    // Planning and editing
    // -----------------------------------------------------------------------

    /// Pack `shots` into groups and replace the project's existing groups.
    ///
    /// Each group's clip duration is its total shot duration rounded up.
    /// Rejected while any group of the project is generating.
    pub async fn plan_groups(
        &self,
        project_id: &str,
        shots: &[Shot],
        max_group_duration_secs: Option<f64>,
        config: GenerationConfig,
    ) -> Result<Vec<TaskGroup>, PipelineError> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(PipelineError::validation("project_id must not be empty"));
        }
        let max = max_group_duration_secs.unwrap_or(self.max_group_duration_secs);
        let planned = plan_task_groups(shots, max)?;

        if TaskGroupRepo::count_in_flight_for_project(&self.ctx.pool, project_id).await? > 0 {
            return Err(PipelineError::conflict(
                "Cannot re-plan while task groups of this project are generating",
            ));
        }

        let new_groups: Vec<NewTaskGroup> = planned
            .into_iter()
            .map(|p| {
                if p.is_oversized(max) {
                    tracing::warn!(
                        project_id,
                        group_number = p.group_number,
                        duration = p.total_duration_secs,
                        "Single shot exceeds the group duration bound",
                    );
                }
                let duration_secs =
                    (p.total_duration_secs.ceil() as u32).clamp(1, MAX_DURATION_SECS);
                NewTaskGroup {
                    group_number: i64::from(p.group_number),
                    total_duration_secs: p.total_duration_secs,
                    config: GenerationConfig {
                        duration_secs,
                        ..config.clone()
                    },
                    shots: p.shots,
                    reference_image_url: None,
                }
            })
            .collect();

        let groups =
            TaskGroupRepo::replace_for_project(&self.ctx.pool, project_id, &new_groups).await?;
        tracing::info!(project_id, groups = groups.len(), "Planned task groups");
        Ok(groups)
    }

    /// Set or clear a group's prompt.
    ///
    /// A prompt moves the group to `prompt_ready` (an `image_fused` group
    /// keeps its status); clearing it moves the group back to `idle`.
    pub async fn assign_prompt(
        &self,
        group_id: DbId,
        prompt: Option<&str>,
    ) -> Result<TaskGroup, PipelineError> {
        let group = self.find_group(group_id).await?;
        let status = group.status()?;
        if status.is_in_flight() {
            return Err(PipelineError::conflict(
                "Cannot change the prompt while the task group is generating",
            ));
        }
        let prompt = normalize_prompt(prompt)?;
        let target = match (&prompt, status) {
            (Some(_), GroupStatus::ImageFused) => GroupStatus::ImageFused,
            (Some(_), _) => GroupStatus::PromptReady,
            (None, _) => GroupStatus::Idle,
        };
        if target != status {
            validate_transition(status, target)?;
        }

        TaskGroupRepo::set_prompt(&self.ctx.pool, group_id, prompt.as_deref(), target).await?;
        self.publish(
            &group,
            GenerationEventKind::StatusChanged {
                status: target,
                progress: 0,
            },
        );
        self.find_group(group_id).await
    }

    /// Attach a fused reference image to a prompted group.
    pub async fn attach_reference_image(
        &self,
        group_id: DbId,
        reference_image_url: &str,
    ) -> Result<TaskGroup, PipelineError> {
        let url = reference_image_url.trim();
        if url.is_empty() {
            return Err(PipelineError::validation(
                "reference_image_url must not be empty",
            ));
        }
        let group = self.find_group(group_id).await?;
        let status = group.status()?;
        match status {
            GroupStatus::PromptReady => {
                validate_transition(status, GroupStatus::ImageFused)?;
            }
            GroupStatus::ImageFused => {}
            GroupStatus::Idle => {
                return Err(PipelineError::validation(
                    "Assign a prompt before attaching a reference image",
                ));
            }
            other => {
                return Err(PipelineError::conflict(format!(
                    "Cannot attach a reference image to a '{other}' task group"
                )));
            }
        }

        TaskGroupRepo::mark_image_fused(&self.ctx.pool, group_id, url).await?;
        self.publish(
            &group,
            GenerationEventKind::StatusChanged {
                status: GroupStatus::ImageFused,
                progress: 0,
            },
        );
        self.find_group(group_id).await
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Start generating one group. Returns the group in `uploading`.
    pub async fn generate(&self, group_id: DbId) -> Result<TaskGroup, PipelineError> {
        let mut running = self.running.write().await;
        if running.get(&group_id).is_some_and(|r| !r.is_finished()) {
            return Err(PipelineError::conflict("Task group is already generating"));
        }

        let attempt = TaskOrchestrator::prepare(&self.ctx, group_id).await?;
        let group = attempt.group.clone();
        let (orchestrator, cancel) = self.orchestrator_for(&group);
        running.insert(group_id, RunningGroup::spawn(cancel, orchestrator.run(attempt)));
        Ok(group)
    }

    /// Start every group of a project that can start.
    ///
    /// Groups already generating or completed are skipped. Other groups
    /// that cannot start are reported with the reason.
    pub async fn generate_all(&self, project_id: &str) -> Result<Vec<GroupLaunch>, PipelineError> {
        let groups = TaskGroupRepo::list_by_project(&self.ctx.pool, project_id).await?;
        if groups.is_empty() {
            return Err(PipelineError::validation(
                "Project has no task groups; plan shots first",
            ));
        }

        let mut launches = Vec::with_capacity(groups.len());
        for group in groups {
            let status = group.status()?;
            let launch = if status.is_in_flight() || status == GroupStatus::Completed {
                GroupLaunch {
                    group_id: group.id,
                    started: false,
                    error: None,
                }
            } else {
                match self.generate(group.id).await {
                    Ok(_) => GroupLaunch {
                        group_id: group.id,
                        started: true,
                        error: None,
                    },
                    Err(e) => GroupLaunch {
                        group_id: group.id,
                        started: false,
                        error: Some(e.to_string()),
                    },
                }
            };
            launches.push(launch);
        }
        Ok(launches)
    }

    /// Cancel a group and return it to `prompt_ready`.
    ///
    /// A running orchestrator is stopped and awaited. Terminal and `idle`
    /// groups cannot be cancelled.
    pub async fn cancel(&self, group_id: DbId) -> Result<TaskGroup, PipelineError> {
        let entry = self.running.write().await.remove(&group_id);
        if let Some(entry) = entry {
            if !entry.is_finished() {
                entry.cancel.cancel();
                match entry.join().await {
                    Ok(outcome) => {
                        tracing::debug!(group_id, ?outcome, "Orchestrator stopped");
                    }
                    Err(e) => {
                        tracing::error!(group_id, error = %e, "Orchestrator task panicked");
                    }
                }
                return self.find_group(group_id).await;
            }
        }

        let group = self.find_group(group_id).await?;
        let status = group.status()?;
        if cancel_target(status).is_none() {
            return Err(PipelineError::conflict(format!(
                "A '{status}' task group cannot be cancelled"
            )));
        }
        if status == GroupStatus::PromptReady {
            return Ok(group);
        }

        if status.is_in_flight() {
            if let Some(task) = GenerationTaskRepo::latest_for_group(&self.ctx.pool, group_id).await? {
                if !task.state()?.is_final() {
                    GenerationTaskRepo::mark_cancelled(&self.ctx.pool, task.id).await?;
                }
            }
        }
        TaskGroupRepo::reset_to_prompt_ready(&self.ctx.pool, group_id).await?;
        self.publish(&group, GenerationEventKind::Cancelled);
        tracing::info!(group_id, from = %status, "Task group cancelled");
        self.find_group(group_id).await
    }

    /// A project's groups and their aggregate status.
    pub async fn project_progress(&self, project_id: &str) -> Result<ProjectProgress, PipelineError> {
        let groups = TaskGroupRepo::list_by_project(&self.ctx.pool, project_id).await?;
        let statuses = groups
            .iter()
            .map(TaskGroup::status)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProjectProgress {
            project_id: project_id.to_string(),
            overall_status: aggregate_status(statuses),
            groups,
        })
    }

    pub async fn is_running(&self, group_id: DbId) -> bool {
        self.running
            .read()
            .await
            .get(&group_id)
            .is_some_and(|r| !r.is_finished())
    }

    pub async fn running_count(&self) -> usize {
        self.running
            .read()
            .await
            .values()
            .filter(|r| !r.is_finished())
            .count()
    }

    /// Wait for a group's orchestrator to finish. `None` when nothing was
    /// spawned for the group or the task panicked.
    ///
    /// The group stays registered while waiting, so it can still be
    /// cancelled.
    pub async fn wait(&self, group_id: DbId) -> Option<GroupOutcome> {
        let mut rx = self.running.read().await.get(&group_id)?.outcome.clone();
        let outcome = rx.wait_for(Option::is_some).await.ok()?;
        (*outcome).clone()
    }

    // -----------------------------------------------------------------------
    // Restart resumption
    // -----------------------------------------------------------------------

    /// Resume every group persisted as in flight.
    ///
    /// Each provider task is claimed in the resume ledger first, so it is
    /// resumed at most once per run. One status probe decides what happens:
    /// a terminal result is applied directly, a task older than the stale
    /// bound is force-failed, and anything else goes back to polling.
    ///
    /// Groups are probed concurrently; the running map is locked only to
    /// register a resumed orchestrator.
    pub async fn resume_in_flight(&self) -> Result<ResumeReport, PipelineError> {
        let purged = ResumeLedgerRepo::purge_other_runs(&self.ctx.pool, &self.run_id).await?;
        let groups = TaskGroupRepo::list_in_flight(&self.ctx.pool).await?;
        tracing::info!(
            run_id = %self.run_id,
            groups = groups.len(),
            purged,
            "Resuming in-flight task groups",
        );

        let results = join_all(groups.into_iter().map(|group| async move {
            let group_id = group.id;
            (group_id, self.resume_group(group).await)
        }))
        .await;

        let mut report = ResumeReport::default();
        for (group_id, result) in results {
            match result {
                Ok(ResumeAction::Resumed) => report.resumed += 1,
                Ok(ResumeAction::Applied) => report.applied += 1,
                Ok(ResumeAction::StaleFailed) => report.stale_failed += 1,
                Ok(ResumeAction::Interrupted) => report.interrupted += 1,
                Ok(ResumeAction::Failed) => report.failed += 1,
                Ok(ResumeAction::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(group_id, error = %e, "Failed to resume task group");
                    report.errors += 1;
                }
            }
        }
        tracing::info!(?report, "Resumption finished");
        Ok(report)
    }

    async fn resume_group(&self, group: TaskGroup) -> Result<ResumeAction, PipelineError> {
        if self.is_running(group.id).await {
            return Ok(ResumeAction::Skipped);
        }

        let (orchestrator, cancel) = self.orchestrator_for(&group);
        let task = GenerationTaskRepo::latest_for_group(&self.ctx.pool, group.id).await?;
        let Some(task) = task else {
            orchestrator.interrupt(None).await?;
            return Ok(ResumeAction::Interrupted);
        };
        let Some(provider_task_id) = task.provider_task_id.clone() else {
            orchestrator.interrupt(Some(task.id)).await?;
            return Ok(ResumeAction::Interrupted);
        };

        if !ResumeLedgerRepo::try_claim(&self.ctx.pool, &self.run_id, &provider_task_id).await? {
            tracing::debug!(group_id = group.id, %provider_task_id, "Already resumed this run");
            return Ok(ResumeAction::Skipped);
        }

        let Some(adapter) = self.ctx.registry.get(&task.provider_id) else {
            let message = format!("Provider '{}' is no longer configured", task.provider_id);
            orchestrator.fail(task.id, None, &message).await?;
            return Ok(ResumeAction::Failed);
        };
        let mut live = LiveTask::from_persisted(&task, &group, adapter)?;

        let probe = live.adapter.check_status(&provider_task_id).await;
        match probe {
            Ok(status) if status.state.is_terminal() => {
                orchestrator.apply_status(&mut live, status).await?;
                return Ok(ResumeAction::Applied);
            }
            _ if self.ctx.policy.is_stale(task.submitted_at, Utc::now()) => {
                tracing::warn!(group_id = group.id, %provider_task_id, "Stale task force-failed");
                let message = timeout_message(self.ctx.policy.stale_after);
                orchestrator
                    .fail(task.id, Some(task.model_id.as_str()), &message)
                    .await?;
                return Ok(ResumeAction::StaleFailed);
            }
            Ok(status) => {
                orchestrator.apply_status(&mut live, status).await?;
            }
            Err(e) => {
                tracing::warn!(
                    group_id = group.id,
                    error = %e,
                    "Resume probe failed; polling continues",
                );
            }
        }

        let mut running = self.running.write().await;
        if running.get(&group.id).is_some_and(|r| !r.is_finished()) {
            return Ok(ResumeAction::Skipped);
        }
        tracing::info!(group_id = group.id, %provider_task_id, "Resumed polling");
        running.insert(group.id, RunningGroup::spawn(cancel, orchestrator.resume(live)));
        Ok(ResumeAction::Resumed)
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Stop every orchestrator without touching group state, waiting up to
    /// the shutdown timeout for each.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let entries: Vec<(DbId, RunningGroup)> = self.running.write().await.drain().collect();
        tracing::info!(running = entries.len(), "Stopping generation supervisor");

        for (group_id, entry) in entries {
            match tokio::time::timeout(self.shutdown_timeout, entry.join()).await {
                Ok(Ok(outcome)) => tracing::debug!(group_id, ?outcome, "Orchestrator stopped"),
                Ok(Err(e)) => tracing::error!(group_id, error = %e, "Orchestrator task panicked"),
                Err(_) => tracing::warn!(group_id, "Orchestrator did not stop in time"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn orchestrator_for(&self, group: &TaskGroup) -> (TaskOrchestrator, CancellationToken) {
        let cancel = self.shutdown.child_token();
        let orchestrator = TaskOrchestrator::new(
            self.ctx.clone(),
            group.id,
            group.project_id.clone(),
            cancel.clone(),
            self.shutdown.clone(),
        );
        (orchestrator, cancel)
    }

    async fn find_group(&self, group_id: DbId) -> Result<TaskGroup, PipelineError> {
        TaskGroupRepo::find_by_id(&self.ctx.pool, group_id)
            .await?
            .ok_or_else(|| PipelineError::group_not_found(group_id))
    }

    fn publish(&self, group: &TaskGroup, kind: GenerationEventKind) {
        self.ctx
            .events
            .publish(GenerationEvent::new(group.id, group.project_id.clone(), kind));
    }
}

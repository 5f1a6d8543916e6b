//! Task group planning: partition an ordered shot list into
//! duration-bounded generation units.
//!
//! Greedy single pass with no lookahead or reordering. A shot longer than
//! the bound is never split; it gets a group of its own whose total
//! legitimately exceeds the bound.

use crate::error::CoreError;
use crate::shot::{validate_shots, Shot};

/// Default upper bound on a task group's total duration in seconds.
pub const DEFAULT_MAX_GROUP_DURATION_SECS: f64 = 10.0;

/// A planned group, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedGroup {
    /// Sequential group number, starting at 1.
    pub group_number: u32,
    /// Shot snapshots in their original order.
    pub shots: Vec<Shot>,
    /// Sum of the member shots' durations.
    pub total_duration_secs: f64,
}

impl PlannedGroup {
    /// Ids of the member shots, in order.
    pub fn shot_ids(&self) -> Vec<String> {
        self.shots.iter().map(|s| s.id.clone()).collect()
    }

    /// True when this group is a singleton holding one over-long shot.
    pub fn is_oversized(&self, max_group_duration_secs: f64) -> bool {
        self.total_duration_secs > max_group_duration_secs
    }
}

/// Validate the planner bound.
pub fn validate_max_group_duration(max_group_duration_secs: f64) -> Result<(), CoreError> {
    if !max_group_duration_secs.is_finite() || max_group_duration_secs <= 0.0 {
        return Err(CoreError::Validation(format!(
            "max_group_duration_secs must be a positive number, got {max_group_duration_secs}"
        )));
    }
    Ok(())
}

/// Partition `shots` into groups whose total duration stays within
/// `max_group_duration_secs`.
///
/// For each shot in order: if adding it would push the running total past
/// the bound and the current group is non-empty, the current group is
/// closed first. The shot is then always appended.
pub fn plan_task_groups(
    shots: &[Shot],
    max_group_duration_secs: f64,
) -> Result<Vec<PlannedGroup>, CoreError> {
    validate_max_group_duration(max_group_duration_secs)?;
    validate_shots(shots)?;

    let mut groups = Vec::new();
    let mut current: Vec<Shot> = Vec::new();
    let mut running_total = 0.0;

    for shot in shots {
        if running_total + shot.duration_secs > max_group_duration_secs && !current.is_empty() {
            close_group(&mut groups, std::mem::take(&mut current), running_total);
            running_total = 0.0;
        }
        running_total += shot.duration_secs;
        current.push(shot.clone());
    }

    if !current.is_empty() {
        close_group(&mut groups, current, running_total);
    }

    Ok(groups)
}

fn close_group(groups: &mut Vec<PlannedGroup>, shots: Vec<Shot>, total_duration_secs: f64) {
    let group_number = groups.len() as u32 + 1;
    groups.push(PlannedGroup {
        group_number,
        shots,
        total_duration_secs,
    });
}

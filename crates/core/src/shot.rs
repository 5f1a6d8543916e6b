//! Shots: the ordered narrative units produced by the storyboard.
//!
//! Shots are immutable input to the planner. Only `id` and `duration_secs`
//! drive planning; the descriptive fields travel with the shot snapshot that
//! is embedded in each task group.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum length of a shot identifier.
const MAX_SHOT_ID_LEN: usize = 128;

/// One timed unit of narrative content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    /// Identifier assigned by the storyboard, unique within a shot list.
    pub id: String,
    /// Shot length in seconds.
    pub duration_secs: f64,
    #[serde(default)]
    pub scene: String,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub visual_description: String,
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub dialogue: Option<String>,
}

impl Shot {
    /// Create a shot with only the fields the planner needs.
    pub fn new(id: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            id: id.into(),
            duration_secs,
            scene: String::new(),
            characters: Vec::new(),
            visual_description: String::new(),
            camera: None,
            dialogue: None,
        }
    }
}

/// Validate a shot list before planning.
///
/// Rules:
/// - Every id is non-empty, at most `MAX_SHOT_ID_LEN` characters, and unique.
/// - Every duration is finite and non-negative.
pub fn validate_shots(shots: &[Shot]) -> Result<(), CoreError> {
    let mut seen = HashSet::with_capacity(shots.len());
    for (i, shot) in shots.iter().enumerate() {
        if shot.id.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Shot at index {i} has an empty id"
            )));
        }
        if shot.id.len() > MAX_SHOT_ID_LEN {
            return Err(CoreError::Validation(format!(
                "Shot id at index {i} exceeds {MAX_SHOT_ID_LEN} characters"
            )));
        }
        if !shot.duration_secs.is_finite() || shot.duration_secs < 0.0 {
            return Err(CoreError::Validation(format!(
                "Shot '{}' has an invalid duration {}",
                shot.id, shot.duration_secs
            )));
        }
        if !seen.insert(shot.id.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate shot id: \"{}\"",
                shot.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_shot_list() {
        let shots = vec![Shot::new("s1", 4.0), Shot::new("s2", 0.0)];
        assert!(validate_shots(&shots).is_ok());
    }

    #[test]
    fn empty_id_rejected() {
        assert!(validate_shots(&[Shot::new("  ", 4.0)]).is_err());
    }

    #[test]
    fn negative_duration_rejected() {
        assert!(validate_shots(&[Shot::new("s1", -1.0)]).is_err());
    }

    #[test]
    fn nan_duration_rejected() {
        assert!(validate_shots(&[Shot::new("s1", f64::NAN)]).is_err());
    }

    #[test]
    fn duplicate_id_rejected() {
        let shots = vec![Shot::new("s1", 4.0), Shot::new("s1", 2.0)];
        assert!(validate_shots(&shots).is_err());
    }

    #[test]
    fn descriptive_fields_default_when_missing() {
        let shot: Shot = serde_json::from_str(r#"{"id":"s1","duration_secs":3.5}"#).unwrap();
        assert_eq!(shot, Shot::new("s1", 3.5));
    }
}

//! Provider-neutral generation settings and provider capabilities.
//!
//! A task group carries a [`GenerationConfig`] in generic terms. Adapters
//! translate it into their own vocabulary after it has been fitted to the
//! target provider's [`ProviderCapabilities`].

use serde::{Deserialize, Serialize};

use crate::catalog::ModelCategory;
use crate::error::CoreError;

/// Default clip length requested from video providers.
pub const DEFAULT_DURATION_SECS: u32 = 5;
/// Upper bound accepted for a requested clip length.
pub const MAX_DURATION_SECS: u32 = 60;
/// Upper bound on stored prompt length in characters.
pub const MAX_PROMPT_LEN: usize = 10_000;

// ---------------------------------------------------------------------------
// Generic settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Square => "1:1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Standard,
    High,
}

/// Settings stored on a task group and handed to the selected adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub category: ModelCategory,
    pub aspect_ratio: AspectRatio,
    pub duration_secs: u32,
    pub quality: Quality,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            category: ModelCategory::Video,
            aspect_ratio: AspectRatio::Landscape,
            duration_secs: DEFAULT_DURATION_SECS,
            quality: Quality::Standard,
        }
    }
}

impl GenerationConfig {
    /// Reject settings no provider could honour.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.duration_secs == 0 || self.duration_secs > MAX_DURATION_SECS {
            return Err(CoreError::Validation(format!(
                "duration_secs must be between 1 and {MAX_DURATION_SECS}, got {}",
                self.duration_secs
            )));
        }
        Ok(())
    }

    /// Copy of this config with duration and aspect ratio snapped to what
    /// `capabilities` supports.
    pub fn fitted_to(&self, capabilities: &ProviderCapabilities) -> Self {
        Self {
            duration_secs: capabilities.snap_duration(self.duration_secs),
            aspect_ratio: capabilities.resolve_aspect_ratio(self.aspect_ratio),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Provider capabilities
// ---------------------------------------------------------------------------

/// What a provider accepts. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub supports_image_reference: bool,
    /// Durations in seconds, empty when any duration is accepted.
    pub supported_durations: Vec<u32>,
    pub supported_aspect_ratios: Vec<AspectRatio>,
}

impl ProviderCapabilities {
    /// Nearest supported duration; ties resolve to the longer one.
    pub fn snap_duration(&self, requested: u32) -> u32 {
        self.supported_durations
            .iter()
            .copied()
            .min_by_key(|d| (d.abs_diff(requested), std::cmp::Reverse(*d)))
            .unwrap_or(requested)
    }

    /// The requested ratio when supported, else the provider's first one.
    pub fn resolve_aspect_ratio(&self, requested: AspectRatio) -> AspectRatio {
        if self.supported_aspect_ratios.is_empty()
            || self.supported_aspect_ratios.contains(&requested)
        {
            requested
        } else {
            self.supported_aspect_ratios[0]
        }
    }
}

/// Identity and capabilities of a registered provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub display_name: String,
    pub capabilities: ProviderCapabilities,
}

// ---------------------------------------------------------------------------
// Prompt validation
// ---------------------------------------------------------------------------

/// Trim a prompt coming from the prompt-construction collaborator.
///
/// Blank input clears the prompt (`None`). Over-long input is rejected.
pub fn normalize_prompt(prompt: Option<&str>) -> Result<Option<String>, CoreError> {
    let Some(trimmed) = prompt.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    if trimmed.chars().count() > MAX_PROMPT_LEN {
        return Err(CoreError::Validation(format!(
            "Prompt exceeds {MAX_PROMPT_LEN} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

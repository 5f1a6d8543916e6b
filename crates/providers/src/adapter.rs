//! The uniform contract every provider adapter implements.

use async_trait::async_trait;
use aiyou_core::generation_config::{GenerationConfig, ProviderInfo};
use aiyou_core::task_status::TaskStatus;

use crate::error::ProviderError;

/// A provider-neutral submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub prompt: String,
    /// Provider-specific model identifier.
    pub model: String,
    pub config: GenerationConfig,
    pub reference_image_url: Option<String>,
}

impl SubmitRequest {
    /// Build a request fitted to a provider's capabilities.
    ///
    /// Duration and aspect ratio are snapped to supported values, and the
    /// reference image is dropped when the provider cannot take one.
    pub fn for_provider(
        info: &ProviderInfo,
        prompt: impl Into<String>,
        model: impl Into<String>,
        config: &GenerationConfig,
        reference_image_url: Option<&str>,
    ) -> Self {
        let capabilities = &info.capabilities;
        Self {
            prompt: prompt.into(),
            model: model.into(),
            config: config.fitted_to(capabilities),
            reference_image_url: reference_image_url
                .filter(|_| capabilities.supports_image_reference)
                .map(str::to_string),
        }
    }
}

/// Returned once the provider accepts a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub provider_task_id: String,
}

/// One external generation back-end.
///
/// Implementations own their wire format. Callers never branch on which
/// provider they hold.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identity and capabilities. Constant for the adapter's lifetime.
    fn info(&self) -> &ProviderInfo;

    /// Submit a job and return as soon as the provider accepts it.
    async fn submit_task(&self, request: &SubmitRequest) -> Result<SubmitResponse, ProviderError>;

    /// Probe a job. Unknown provider status codes map to `processing`.
    async fn check_status(&self, provider_task_id: &str) -> Result<TaskStatus, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiyou_core::generation_config::{AspectRatio, ProviderCapabilities};

    fn info(supports_image_reference: bool) -> ProviderInfo {
        ProviderInfo {
            id: "p".into(),
            display_name: "P".into(),
            capabilities: ProviderCapabilities {
                supports_image_reference,
                supported_durations: vec![5, 10],
                supported_aspect_ratios: vec![AspectRatio::Landscape],
            },
        }
    }

    #[test]
    fn reference_dropped_when_unsupported() {
        let config = GenerationConfig::default();
        let req = SubmitRequest::for_provider(&info(false), "x", "m", &config, Some("https://i"));
        assert!(req.reference_image_url.is_none());

        let req = SubmitRequest::for_provider(&info(true), "x", "m", &config, Some("https://i"));
        assert_eq!(req.reference_image_url.as_deref(), Some("https://i"));
    }

    #[test]
    fn config_is_fitted() {
        let config = GenerationConfig {
            duration_secs: 8,
            aspect_ratio: AspectRatio::Portrait,
            ..GenerationConfig::default()
        };
        let req = SubmitRequest::for_provider(&info(false), "x", "m", &config, None);
        assert_eq!(req.config.duration_secs, 10);
        assert_eq!(req.config.aspect_ratio, AspectRatio::Landscape);
    }
}

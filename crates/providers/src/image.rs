//! Synchronous image adapter for OpenAI-compatible
//! `POST /images/generations` endpoints.
//!
//! The remote call returns the finished image, so the adapter hands out a
//! synthetic task id and answers the first status probe for it with the
//! stored terminal result. Results nobody collects (the group was
//! cancelled before its first probe) expire after [`RESULT_TTL`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use aiyou_core::catalog::PROVIDER_IMAGE;
use aiyou_core::generation_config::{
    AspectRatio, ProviderCapabilities, ProviderInfo, Quality,
};
use aiyou_core::task_status::TaskStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::adapter::{ProviderAdapter, SubmitRequest, SubmitResponse};
use crate::error::ProviderError;
use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Prefix of the synthetic task ids this adapter issues.
const TASK_ID_PREFIX: &str = "img-";

/// How long an uncollected result is kept.
pub const RESULT_TTL: Duration = Duration::from_secs(60 * 60);

struct StoredResult {
    status: TaskStatus,
    stored_at: Instant,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'static str,
    quality: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

impl ImageData {
    /// Hosted URL, or an inline data URL for base64-only responses.
    fn into_url(self) -> Option<String> {
        self.url
            .filter(|u| !u.is_empty())
            .or_else(|| self.b64_json.map(|b64| format!("data:image/png;base64,{b64}")))
    }
}

/// Adapter for OpenAI-compatible image generation.
pub struct ImageAdapter {
    info: ProviderInfo,
    client: reqwest::Client,
    base_url: String,
    /// Terminal results awaiting their first status probe.
    results: Mutex<HashMap<String, StoredResult>>,
    result_ttl: Duration,
}

impl ImageAdapter {
    /// Create with custom configuration.
    pub fn with_config(
        api_key: &str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            info: ProviderInfo {
                id: PROVIDER_IMAGE.to_string(),
                display_name: "OpenAI Images".to_string(),
                capabilities: ProviderCapabilities {
                    supports_image_reference: false,
                    supported_durations: Vec::new(),
                    supported_aspect_ratios: vec![
                        AspectRatio::Landscape,
                        AspectRatio::Portrait,
                        AspectRatio::Square,
                    ],
                },
            },
            client: http::bearer_client(PROVIDER_IMAGE, api_key, timeout)?,
            base_url: http::normalize_base_url(base_url),
            results: Mutex::new(HashMap::new()),
            result_ttl: RESULT_TTL,
        })
    }

    /// Override how long uncollected results are kept.
    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    /// DALL-E models use their own size and quality vocabulary.
    fn size_and_quality(
        model: &str,
        aspect_ratio: AspectRatio,
        quality: Quality,
    ) -> (&'static str, &'static str) {
        let dall_e = model.starts_with("dall-e");
        let size = match (aspect_ratio, dall_e) {
            (AspectRatio::Square, _) => "1024x1024",
            (AspectRatio::Landscape, true) => "1792x1024",
            (AspectRatio::Portrait, true) => "1024x1792",
            (AspectRatio::Landscape, false) => "1536x1024",
            (AspectRatio::Portrait, false) => "1024x1536",
        };
        let quality = match (quality, dall_e) {
            (Quality::Standard, true) => "standard",
            (Quality::High, true) => "hd",
            (Quality::Standard, false) => "medium",
            (Quality::High, false) => "high",
        };
        (size, quality)
    }
}

#[async_trait]
impl ProviderAdapter for ImageAdapter {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn submit_task(&self, request: &SubmitRequest) -> Result<SubmitResponse, ProviderError> {
        let (size, quality) = Self::size_and_quality(
            &request.model,
            request.config.aspect_ratio,
            request.config.quality,
        );
        let body = GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            n: 1,
            size,
            quality,
        };
        let response = http::send(
            PROVIDER_IMAGE,
            self.client
                .post(format!("{}/images/generations", self.base_url))
                .json(&body),
        )
        .await?;
        let generated: GenerateResponse = http::parse_json(PROVIDER_IMAGE, response).await?;
        let url = generated.data.into_iter().next().and_then(ImageData::into_url);

        let provider_task_id = format!("{TASK_ID_PREFIX}{}", uuid::Uuid::new_v4());
        let mut results = self.results.lock().await;
        let before = results.len();
        results.retain(|_, r| r.stored_at.elapsed() < self.result_ttl);
        if results.len() < before {
            tracing::debug!(expired = before - results.len(), "Dropped uncollected image results");
        }
        results.insert(
            provider_task_id.clone(),
            StoredResult {
                status: TaskStatus::completed_or_error(url),
                stored_at: Instant::now(),
            },
        );
        Ok(SubmitResponse { provider_task_id })
    }

    async fn check_status(&self, provider_task_id: &str) -> Result<TaskStatus, ProviderError> {
        self.results
            .lock()
            .await
            .remove(provider_task_id)
            .map(|r| r.status)
            .ok_or_else(|| {
                ProviderError::rejected(
                    PROVIDER_IMAGE,
                    format!("Unknown or already collected task id '{provider_task_id}'"),
                )
            })
    }
}

//! Sora video adapter (OpenAI `/videos` API).
//!
//! Jobs are created with `POST /videos` and polled with
//! `GET /videos/{id}`. A finished video is served from
//! `GET /videos/{id}/content`, which becomes the result URL.

use std::time::Duration;

use async_trait::async_trait;
use aiyou_core::catalog::PROVIDER_SORA;
use aiyou_core::generation_config::{
    AspectRatio, ProviderCapabilities, ProviderInfo, Quality,
};
use aiyou_core::task_status::{clamp_progress, TaskStatus};
use serde::{Deserialize, Serialize};

use crate::adapter::{ProviderAdapter, SubmitRequest, SubmitResponse};
use crate::error::ProviderError;
use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Clip lengths the API accepts, in seconds.
const SUPPORTED_DURATIONS: [u32; 3] = [4, 8, 12];

#[derive(Debug, Serialize)]
struct CreateVideoBody<'a> {
    model: &'a str,
    prompt: &'a str,
    /// Sent as a string, e.g. `"8"`.
    seconds: String,
    size: &'static str,
}

#[derive(Debug, Deserialize)]
struct VideoJob {
    id: String,
    status: String,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    error: Option<VideoError>,
}

#[derive(Debug, Deserialize)]
struct VideoError {
    #[serde(default)]
    message: Option<String>,
}

/// Adapter for OpenAI's Sora video models.
pub struct SoraAdapter {
    info: ProviderInfo,
    client: reqwest::Client,
    base_url: String,
}

impl SoraAdapter {
    /// Create with custom configuration.
    pub fn with_config(
        api_key: &str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            info: ProviderInfo {
                id: PROVIDER_SORA.to_string(),
                display_name: "OpenAI Sora".to_string(),
                capabilities: ProviderCapabilities {
                    supports_image_reference: false,
                    supported_durations: SUPPORTED_DURATIONS.to_vec(),
                    supported_aspect_ratios: vec![AspectRatio::Landscape, AspectRatio::Portrait],
                },
            },
            client: http::bearer_client(PROVIDER_SORA, api_key, timeout)?,
            base_url: http::normalize_base_url(base_url),
        })
    }

    /// Output size for the given ratio. Pro models render larger frames at
    /// high quality.
    fn size(model: &str, aspect_ratio: AspectRatio, quality: Quality) -> &'static str {
        let large = quality == Quality::High && model.ends_with("-pro");
        match (aspect_ratio, large) {
            (AspectRatio::Portrait, false) => "720x1280",
            (AspectRatio::Portrait, true) => "1024x1792",
            (_, false) => "1280x720",
            (_, true) => "1792x1024",
        }
    }

    fn map_status(&self, job: VideoJob) -> TaskStatus {
        let progress = job.progress.map(clamp_progress).unwrap_or(0);
        match job.status.as_str() {
            "queued" => TaskStatus::queued(),
            "in_progress" => TaskStatus::processing(progress),
            "completed" => TaskStatus::completed_or_error(Some(format!(
                "{}/videos/{}/content",
                self.base_url, job.id
            ))),
            "failed" => TaskStatus::error(
                job.error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "Sora reported the video as failed".to_string()),
            ),
            other => {
                tracing::debug!(status = other, "Unmapped Sora status, treating as processing");
                TaskStatus::processing(progress)
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for SoraAdapter {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn submit_task(&self, request: &SubmitRequest) -> Result<SubmitResponse, ProviderError> {
        let body = CreateVideoBody {
            model: &request.model,
            prompt: &request.prompt,
            seconds: request.config.duration_secs.to_string(),
            size: Self::size(
                &request.model,
                request.config.aspect_ratio,
                request.config.quality,
            ),
        };
        let response = http::send(
            PROVIDER_SORA,
            self.client
                .post(format!("{}/videos", self.base_url))
                .json(&body),
        )
        .await?;
        let job: VideoJob = http::parse_json(PROVIDER_SORA, response).await?;
        if job.status == "failed" {
            return Err(ProviderError::rejected(
                PROVIDER_SORA,
                job.error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "Video job rejected".to_string()),
            ));
        }
        Ok(SubmitResponse {
            provider_task_id: job.id,
        })
    }

    async fn check_status(&self, provider_task_id: &str) -> Result<TaskStatus, ProviderError> {
        let response = http::send(
            PROVIDER_SORA,
            self.client
                .get(format!("{}/videos/{provider_task_id}", self.base_url)),
        )
        .await?;
        let job: VideoJob = http::parse_json(PROVIDER_SORA, response).await?;
        Ok(self.map_status(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiyou_core::generation_config::GenerationConfig;
    use aiyou_core::task_status::TaskState;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::error::ProviderErrorCode;

    fn adapter(server: &MockServer) -> SoraAdapter {
        SoraAdapter::with_config("sk-test", server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn request(adapter: &SoraAdapter, config: GenerationConfig) -> SubmitRequest {
        SubmitRequest::for_provider(adapter.info(), "a fox at dusk", "sora-2", &config, None)
    }

    #[tokio::test]
    async fn submit_translates_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "sora-2",
                "seconds": "8",
                "size": "720x1280"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "vid_1", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sora = adapter(&server);
        let config = GenerationConfig {
            duration_secs: 7,
            aspect_ratio: AspectRatio::Portrait,
            ..GenerationConfig::default()
        };
        let resp = sora.submit_task(&request(&sora, config)).await.unwrap();
        assert_eq!(resp.provider_task_id, "vid_1");
    }

    #[tokio::test]
    async fn submit_non_success_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let sora = adapter(&server);
        let err = sora
            .submit_task(&request(&sora, GenerationConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::Http);
        assert_eq!(err.status, Some(429));
        assert_eq!(err.message, "slow down");
    }

    #[tokio::test]
    async fn status_maps_vocabulary() {
        let server = MockServer::start().await;
        for (id, body) in [
            ("q", json!({"id": "q", "status": "queued"})),
            ("p", json!({"id": "p", "status": "in_progress", "progress": 42})),
            ("d", json!({"id": "d", "status": "completed", "progress": 100})),
            ("f", json!({"id": "f", "status": "failed", "error": {"message": "moderation"}})),
            ("u", json!({"id": "u", "status": "warming_up", "progress": 5})),
        ] {
            Mock::given(method("GET"))
                .and(path(format!("/videos/{id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }

        let sora = adapter(&server);
        assert_eq!(sora.check_status("q").await.unwrap().state, TaskState::Queued);

        let processing = sora.check_status("p").await.unwrap();
        assert_eq!(processing.state, TaskState::Processing);
        assert_eq!(processing.progress, 42);

        let done = sora.check_status("d").await.unwrap();
        assert_eq!(done.state, TaskState::Completed);
        assert_eq!(done.result_url, Some(format!("{}/videos/d/content", server.uri())));

        let failed = sora.check_status("f").await.unwrap();
        assert_eq!(failed.state, TaskState::Error);
        assert_eq!(failed.error_message.as_deref(), Some("moderation"));

        let unknown = sora.check_status("u").await.unwrap();
        assert_eq!(unknown.state, TaskState::Processing);
        assert_eq!(unknown.progress, 5);
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = adapter(&server).check_status("x").await.unwrap_err();
        assert_matches!(err.code, ProviderErrorCode::Decode);
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let sora =
            SoraAdapter::with_config("sk-test", "http://127.0.0.1:1", Duration::from_secs(2))
                .unwrap();
        let err = sora.check_status("x").await.unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::Network);
        assert_eq!(err.provider, "sora");
    }

    #[test]
    fn pro_high_quality_renders_large() {
        assert_eq!(
            SoraAdapter::size("sora-2-pro", AspectRatio::Landscape, Quality::High),
            "1792x1024"
        );
        assert_eq!(
            SoraAdapter::size("sora-2", AspectRatio::Landscape, Quality::High),
            "1280x720"
        );
    }
}

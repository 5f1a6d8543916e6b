//! Kling video adapter.
//!
//! Text-only prompts go to `/v1/videos/text2video`, prompts with a
//! reference image to `/v1/videos/image2video`. Status lives under the same
//! path family, so the returned task id is prefixed with the endpoint kind
//! (`"image2video:<id>"`).
//!
//! Every response is wrapped in `{ code, message, data }`; a non-zero
//! `code` is a rejection even on HTTP 200.

use std::time::Duration;

use async_trait::async_trait;
use aiyou_core::catalog::PROVIDER_KLING;
use aiyou_core::generation_config::{
    AspectRatio, ProviderCapabilities, ProviderInfo, Quality,
};
use aiyou_core::task_status::TaskStatus;
use serde::{Deserialize, Serialize};

use crate::adapter::{ProviderAdapter, SubmitRequest, SubmitResponse};
use crate::error::ProviderError;
use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.klingai.com";

const TEXT_TO_VIDEO: &str = "text2video";
const IMAGE_TO_VIDEO: &str = "image2video";

#[derive(Debug, Serialize)]
struct CreateTaskBody<'a> {
    model_name: &'a str,
    prompt: &'a str,
    /// `"5"` or `"10"`.
    duration: String,
    /// `"std"` or `"pro"`.
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    task_id: String,
    #[serde(default)]
    task_status: Option<String>,
    #[serde(default)]
    task_status_msg: Option<String>,
    #[serde(default)]
    task_result: Option<TaskResult>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    #[serde(default)]
    videos: Vec<VideoOutput>,
}

#[derive(Debug, Deserialize)]
struct VideoOutput {
    url: String,
}

/// Adapter for Kling's video models.
pub struct KlingAdapter {
    info: ProviderInfo,
    client: reqwest::Client,
    base_url: String,
}

impl KlingAdapter {
    /// Create with custom configuration.
    pub fn with_config(
        api_key: &str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            info: ProviderInfo {
                id: PROVIDER_KLING.to_string(),
                display_name: "Kling".to_string(),
                capabilities: ProviderCapabilities {
                    supports_image_reference: true,
                    supported_durations: vec![5, 10],
                    supported_aspect_ratios: vec![
                        AspectRatio::Landscape,
                        AspectRatio::Portrait,
                        AspectRatio::Square,
                    ],
                },
            },
            client: http::bearer_client(PROVIDER_KLING, api_key, timeout)?,
            base_url: http::normalize_base_url(base_url),
        })
    }

    /// Split `"kind:id"`. Ids without a known prefix are text-to-video.
    fn split_task_id(provider_task_id: &str) -> (&str, &str) {
        match provider_task_id.split_once(':') {
            Some((kind, id)) if kind == TEXT_TO_VIDEO || kind == IMAGE_TO_VIDEO => (kind, id),
            _ => (TEXT_TO_VIDEO, provider_task_id),
        }
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, ProviderError> {
        if envelope.code != 0 {
            return Err(ProviderError::rejected(
                PROVIDER_KLING,
                format!(
                    "code {}: {}",
                    envelope.code,
                    envelope.message.unwrap_or_default()
                ),
            ));
        }
        envelope
            .data
            .ok_or_else(|| ProviderError::decode(PROVIDER_KLING, "Response has no data"))
    }

    fn map_status(data: TaskData) -> TaskStatus {
        match data.task_status.as_deref().unwrap_or_default() {
            "submitted" => TaskStatus::queued(),
            "processing" => TaskStatus::processing(0),
            "succeed" => TaskStatus::completed_or_error(
                data.task_result
                    .and_then(|r| r.videos.into_iter().next())
                    .map(|v| v.url),
            ),
            "failed" => TaskStatus::error(
                data.task_status_msg
                    .unwrap_or_else(|| "Kling reported the task as failed".to_string()),
            ),
            other => {
                tracing::debug!(status = other, "Unmapped Kling status, treating as processing");
                TaskStatus::processing(0)
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for KlingAdapter {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn submit_task(&self, request: &SubmitRequest) -> Result<SubmitResponse, ProviderError> {
        let image = request.reference_image_url.as_deref();
        let kind = if image.is_some() {
            IMAGE_TO_VIDEO
        } else {
            TEXT_TO_VIDEO
        };
        let body = CreateTaskBody {
            model_name: &request.model,
            prompt: &request.prompt,
            duration: request.config.duration_secs.to_string(),
            mode: match request.config.quality {
                Quality::Standard => "std",
                Quality::High => "pro",
            },
            // The reference image fixes the frame shape for image2video.
            aspect_ratio: image
                .is_none()
                .then_some(request.config.aspect_ratio.as_str()),
            image,
        };

        let response = http::send(
            PROVIDER_KLING,
            self.client
                .post(format!("{}/v1/videos/{kind}", self.base_url))
                .json(&body),
        )
        .await?;
        let envelope: Envelope<TaskData> = http::parse_json(PROVIDER_KLING, response).await?;
        let data = Self::unwrap_envelope(envelope)?;
        Ok(SubmitResponse {
            provider_task_id: format!("{kind}:{}", data.task_id),
        })
    }

    async fn check_status(&self, provider_task_id: &str) -> Result<TaskStatus, ProviderError> {
        let (kind, id) = Self::split_task_id(provider_task_id);
        let response = http::send(
            PROVIDER_KLING,
            self.client
                .get(format!("{}/v1/videos/{kind}/{id}", self.base_url)),
        )
        .await?;
        let envelope: Envelope<TaskData> = http::parse_json(PROVIDER_KLING, response).await?;
        Ok(Self::map_status(Self::unwrap_envelope(envelope)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiyou_core::generation_config::GenerationConfig;
    use aiyou_core::task_status::TaskState;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::error::ProviderErrorCode;

    fn adapter(server: &MockServer) -> KlingAdapter {
        KlingAdapter::with_config("kling-token", server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn reference_image_routes_to_image2video() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos/image2video"))
            .and(body_partial_json(json!({
                "model_name": "kling-v2-1",
                "duration": "10",
                "mode": "pro",
                "image": "https://img/ref.png"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "message": "SUCCEED",
                "data": {"task_id": "abc", "task_status": "submitted"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let kling = adapter(&server);
        let config = GenerationConfig {
            duration_secs: 9,
            quality: Quality::High,
            ..GenerationConfig::default()
        };
        let req = SubmitRequest::for_provider(
            kling.info(),
            "a fox",
            "kling-v2-1",
            &config,
            Some("https://img/ref.png"),
        );
        let resp = kling.submit_task(&req).await.unwrap();
        assert_eq!(resp.provider_task_id, "image2video:abc");
    }

    #[tokio::test]
    async fn text_prompt_sends_aspect_ratio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos/text2video"))
            .and(body_partial_json(json!({"aspect_ratio": "1:1", "duration": "5", "mode": "std"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"task_id": "t1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let kling = adapter(&server);
        let config = GenerationConfig {
            aspect_ratio: AspectRatio::Square,
            ..GenerationConfig::default()
        };
        let req = SubmitRequest::for_provider(kling.info(), "a fox", "kling-v2-1", &config, None);
        assert_eq!(
            kling.submit_task(&req).await.unwrap().provider_task_id,
            "text2video:t1"
        );
    }

    #[tokio::test]
    async fn nonzero_code_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos/text2video"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1102,
                "message": "balance not enough",
                "data": null
            })))
            .mount(&server)
            .await;

        let kling = adapter(&server);
        let req = SubmitRequest::for_provider(
            kling.info(),
            "a fox",
            "kling-v2-1",
            &GenerationConfig::default(),
            None,
        );
        let err = kling.submit_task(&req).await.unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::Rejected);
        assert!(err.message.contains("balance not enough"));
    }

    #[tokio::test]
    async fn status_uses_encoded_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/image2video/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {
                    "task_id": "abc",
                    "task_status": "succeed",
                    "task_result": {"videos": [{"id": "v", "url": "https://cdn/k.mp4", "duration": "10"}]}
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/text2video/def"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"task_id": "def", "task_status": "failed", "task_status_msg": "nsfw"}
            })))
            .mount(&server)
            .await;

        let kling = adapter(&server);
        let done = kling.check_status("image2video:abc").await.unwrap();
        assert_eq!(done.state, TaskState::Completed);
        assert_eq!(done.result_url.as_deref(), Some("https://cdn/k.mp4"));

        let failed = kling.check_status("def").await.unwrap();
        assert_eq!(failed.state, TaskState::Error);
        assert_eq!(failed.error_message.as_deref(), Some("nsfw"));
    }

    #[test]
    fn status_vocabulary() {
        let data = |status: &str| TaskData {
            task_id: "x".into(),
            task_status: Some(status.into()),
            task_status_msg: None,
            task_result: None,
        };
        assert_eq!(KlingAdapter::map_status(data("submitted")).state, TaskState::Queued);
        assert_eq!(KlingAdapter::map_status(data("processing")).state, TaskState::Processing);
        assert_eq!(KlingAdapter::map_status(data("paused")).state, TaskState::Processing);
        // Success without a video is unusable.
        assert_eq!(KlingAdapter::map_status(data("succeed")).state, TaskState::Error);
    }
}

//! Hailuo video adapter (MiniMax video generation API).
//!
//! Three calls: create (`POST /v1/video_generation`), query
//! (`GET /v1/query/video_generation`), and, once the query reports
//! `Success`, a file lookup (`GET /v1/files/retrieve`) that yields the
//! download URL. Errors are reported in `base_resp.status_code` with
//! HTTP 200.

use std::time::Duration;

use async_trait::async_trait;
use aiyou_core::catalog::PROVIDER_HAILUO;
use aiyou_core::generation_config::{
    AspectRatio, ProviderCapabilities, ProviderInfo, Quality,
};
use aiyou_core::task_status::TaskStatus;
use serde::{Deserialize, Serialize};

use crate::adapter::{ProviderAdapter, SubmitRequest, SubmitResponse};
use crate::error::ProviderError;
use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.minimax.io";

/// 1080P output is only offered for the short duration.
const FULL_HD_MAX_DURATION_SECS: u32 = 6;

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    duration: u32,
    resolution: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_frame_image: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct BaseResp {
    #[serde(default)]
    status_code: i64,
    #[serde(default)]
    status_msg: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    base_resp: BaseResp,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    base_resp: BaseResp,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    file: Option<FileObject>,
    #[serde(default)]
    base_resp: BaseResp,
}

#[derive(Debug, Deserialize)]
struct FileObject {
    #[serde(default)]
    download_url: Option<String>,
}

/// Adapter for MiniMax Hailuo video models.
pub struct HailuoAdapter {
    info: ProviderInfo,
    client: reqwest::Client,
    base_url: String,
}

impl HailuoAdapter {
    /// Create with custom configuration.
    pub fn with_config(
        api_key: &str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            info: ProviderInfo {
                id: PROVIDER_HAILUO.to_string(),
                display_name: "MiniMax Hailuo".to_string(),
                capabilities: ProviderCapabilities {
                    supports_image_reference: true,
                    supported_durations: vec![6, 10],
                    supported_aspect_ratios: vec![AspectRatio::Landscape],
                },
            },
            client: http::bearer_client(PROVIDER_HAILUO, api_key, timeout)?,
            base_url: http::normalize_base_url(base_url),
        })
    }

    fn resolution(quality: Quality, duration_secs: u32) -> &'static str {
        if quality == Quality::High && duration_secs <= FULL_HD_MAX_DURATION_SECS {
            "1080P"
        } else {
            "768P"
        }
    }

    fn check_base_resp(base_resp: &BaseResp) -> Result<(), ProviderError> {
        if base_resp.status_code != 0 {
            return Err(ProviderError::rejected(
                PROVIDER_HAILUO,
                format!("status {}: {}", base_resp.status_code, base_resp.status_msg),
            ));
        }
        Ok(())
    }

    async fn download_url(&self, file_id: &str) -> Result<Option<String>, ProviderError> {
        let response = http::send(
            PROVIDER_HAILUO,
            self.client
                .get(format!("{}/v1/files/retrieve", self.base_url))
                .query(&[("file_id", file_id)]),
        )
        .await?;
        let file: FileResponse = http::parse_json(PROVIDER_HAILUO, response).await?;
        Self::check_base_resp(&file.base_resp)?;
        Ok(file.file.and_then(|f| f.download_url))
    }
}

#[async_trait]
impl ProviderAdapter for HailuoAdapter {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn submit_task(&self, request: &SubmitRequest) -> Result<SubmitResponse, ProviderError> {
        let body = CreateBody {
            model: &request.model,
            prompt: &request.prompt,
            duration: request.config.duration_secs,
            resolution: Self::resolution(request.config.quality, request.config.duration_secs),
            first_frame_image: request.reference_image_url.as_deref(),
        };
        let response = http::send(
            PROVIDER_HAILUO,
            self.client
                .post(format!("{}/v1/video_generation", self.base_url))
                .json(&body),
        )
        .await?;
        let created: CreateResponse = http::parse_json(PROVIDER_HAILUO, response).await?;
        Self::check_base_resp(&created.base_resp)?;
        if created.task_id.is_empty() {
            return Err(ProviderError::decode(PROVIDER_HAILUO, "Response has no task_id"));
        }
        Ok(SubmitResponse {
            provider_task_id: created.task_id,
        })
    }

    async fn check_status(&self, provider_task_id: &str) -> Result<TaskStatus, ProviderError> {
        let response = http::send(
            PROVIDER_HAILUO,
            self.client
                .get(format!("{}/v1/query/video_generation", self.base_url))
                .query(&[("task_id", provider_task_id)]),
        )
        .await?;
        let query: QueryResponse = http::parse_json(PROVIDER_HAILUO, response).await?;
        Self::check_base_resp(&query.base_resp)?;

        let status = match query.status.as_str() {
            "Preparing" | "Queueing" => TaskStatus::queued(),
            "Processing" => TaskStatus::processing(0),
            "Success" => {
                let url = match query.file_id.as_deref() {
                    Some(file_id) => self.download_url(file_id).await?,
                    None => None,
                };
                TaskStatus::completed_or_error(url)
            }
            "Fail" => TaskStatus::error("Hailuo reported the generation as failed"),
            other => {
                tracing::debug!(status = other, "Unmapped Hailuo status, treating as processing");
                TaskStatus::processing(0)
            }
        };
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiyou_core::generation_config::GenerationConfig;
    use aiyou_core::task_status::TaskState;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::error::ProviderErrorCode;

    fn adapter(server: &MockServer) -> HailuoAdapter {
        HailuoAdapter::with_config("mm-key", server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn submit_snaps_duration_and_resolution() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/video_generation"))
            .and(body_partial_json(json!({
                "model": "MiniMax-Hailuo-02",
                "duration": 10,
                "resolution": "768P",
                "first_frame_image": "https://img/ref.png"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "task_id": "106916112212032",
                "base_resp": {"status_code": 0, "status_msg": "success"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let hailuo = adapter(&server);
        let config = GenerationConfig {
            duration_secs: 9,
            quality: Quality::High,
            ..GenerationConfig::default()
        };
        let req = SubmitRequest::for_provider(
            hailuo.info(),
            "a fox",
            "MiniMax-Hailuo-02",
            &config,
            Some("https://img/ref.png"),
        );
        assert_eq!(
            hailuo.submit_task(&req).await.unwrap().provider_task_id,
            "106916112212032"
        );
    }

    #[tokio::test]
    async fn base_resp_error_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/video_generation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "task_id": "",
                "base_resp": {"status_code": 1008, "status_msg": "insufficient balance"}
            })))
            .mount(&server)
            .await;

        let hailuo = adapter(&server);
        let req = SubmitRequest::for_provider(
            hailuo.info(),
            "a fox",
            "MiniMax-Hailuo-02",
            &GenerationConfig::default(),
            None,
        );
        let err = hailuo.submit_task(&req).await.unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::Rejected);
        assert!(err.message.contains("insufficient balance"));
    }

    #[tokio::test]
    async fn success_resolves_download_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/query/video_generation"))
            .and(query_param("task_id", "t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "task_id": "t1",
                "status": "Success",
                "file_id": "f1",
                "base_resp": {"status_code": 0, "status_msg": "success"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/files/retrieve"))
            .and(query_param("file_id", "f1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "file": {"file_id": "f1", "download_url": "https://cdn/h.mp4"},
                "base_resp": {"status_code": 0, "status_msg": "success"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let status = adapter(&server).check_status("t1").await.unwrap();
        assert_eq!(status.state, TaskState::Completed);
        assert_eq!(status.result_url.as_deref(), Some("https://cdn/h.mp4"));
    }

    #[tokio::test]
    async fn status_vocabulary() {
        let server = MockServer::start().await;
        for (id, status) in [
            ("a", "Preparing"),
            ("b", "Queueing"),
            ("c", "Processing"),
            ("d", "Fail"),
            ("e", "Rendering"),
        ] {
            Mock::given(method("GET"))
                .and(path("/v1/query/video_generation"))
                .and(query_param("task_id", id))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "task_id": id,
                    "status": status,
                    "base_resp": {"status_code": 0}
                })))
                .mount(&server)
                .await;
        }

        let hailuo = adapter(&server);
        assert_eq!(hailuo.check_status("a").await.unwrap().state, TaskState::Queued);
        assert_eq!(hailuo.check_status("b").await.unwrap().state, TaskState::Queued);
        assert_eq!(hailuo.check_status("c").await.unwrap().state, TaskState::Processing);
        assert_eq!(hailuo.check_status("d").await.unwrap().state, TaskState::Error);
        assert_eq!(hailuo.check_status("e").await.unwrap().state, TaskState::Processing);
    }

    #[test]
    fn full_hd_only_for_short_clips() {
        assert_eq!(HailuoAdapter::resolution(Quality::High, 6), "1080P");
        assert_eq!(HailuoAdapter::resolution(Quality::High, 10), "768P");
        assert_eq!(HailuoAdapter::resolution(Quality::Standard, 6), "768P");
    }
}

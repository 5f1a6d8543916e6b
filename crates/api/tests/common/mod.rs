#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aiyou_api::config::ServerConfig;
use aiyou_api::router::build_app_router;
use aiyou_api::state::{build_supervisor, AppState};
use aiyou_core::generation_config::{AspectRatio, ProviderCapabilities, ProviderInfo};
use aiyou_core::task_status::TaskStatus;
use aiyou_db::DbPool;
use aiyou_pipeline::PipelineConfig;
use aiyou_providers::{
    ProviderAdapter, ProviderError, ProviderRegistry, SubmitRequest, SubmitResponse,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Provider that answers every probe from a fixed script; the last status
/// repeats.
pub struct ScriptedProvider {
    info: ProviderInfo,
    statuses: Mutex<VecDeque<TaskStatus>>,
}

impl ScriptedProvider {
    pub fn new(provider_id: &str, statuses: Vec<TaskStatus>) -> Arc<Self> {
        Arc::new(Self {
            info: ProviderInfo {
                id: provider_id.to_string(),
                display_name: provider_id.to_string(),
                capabilities: ProviderCapabilities {
                    supports_image_reference: true,
                    supported_durations: vec![5, 10],
                    supported_aspect_ratios: vec![AspectRatio::Landscape],
                },
            },
            statuses: Mutex::new(statuses.into()),
        })
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn submit_task(&self, _request: &SubmitRequest) -> Result<SubmitResponse, ProviderError> {
        Ok(SubmitResponse {
            provider_task_id: format!("{}-task", self.info.id),
        })
    }

    async fn check_status(&self, _provider_task_id: &str) -> Result<TaskStatus, ProviderError> {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            Ok(statuses.pop_front().unwrap())
        } else {
            Ok(statuses.front().cloned().unwrap())
        }
    }
}

/// A router over an in-memory database, plus the state behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Sora completes after one processing tick; Kling stays queued.
pub async fn build_test_app() -> TestApp {
    build_test_app_with(vec![
        ScriptedProvider::new(
            "sora",
            vec![
                TaskStatus::processing(40),
                TaskStatus::completed("https://cdn.test/clip.mp4"),
            ],
        ),
        ScriptedProvider::new("kling", vec![TaskStatus::queued()]),
    ])
    .await
}

pub async fn build_test_app_with(providers: Vec<Arc<ScriptedProvider>>) -> TestApp {
    let pool = test_pool().await;
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider).unwrap();
    }
    let pipeline_config = PipelineConfig {
        poll_interval: Duration::from_millis(10),
        shutdown_timeout: Duration::from_secs(2),
        ..PipelineConfig::default()
    };
    let supervisor = build_supervisor(pool, Arc::new(registry), &pipeline_config)
        .await
        .unwrap();

    let config = test_config();
    let state = AppState::new(config.clone(), supervisor);
    let router = build_app_router(state.clone(), &config).unwrap();
    TestApp { router, state }
}

pub async fn test_pool() -> DbPool {
    let pool = aiyou_db::create_pool("sqlite::memory:").await.unwrap();
    aiyou_db::run_migrations(&pool).await.unwrap();
    pool
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn post_empty(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn send_json(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::POST, uri, body).await
}

pub async fn put_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::PUT, uri, body).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

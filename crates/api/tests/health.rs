//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get};
use tower::ServiceExt;

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = common::build_test_app().await;
    let response = get(&app, "/api/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["providers"], 2);
    assert_eq!(json["running_groups"], 0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = common::build_test_app().await;
    let response = get(&app, "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = common::build_test_app().await;
    let response = get(&app, "/api/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn cors_preflight_allows_dev_origin() {
    let app = common::build_test_app().await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/providers")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "PUT")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "http://localhost:5173"
    );
}

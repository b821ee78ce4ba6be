//! API endpoint integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use drishti::api::{self, ApiState};
use drishti::stream::multipart;
use tower::ServiceExt;

mod common;
use common::{TestOpener, quiet_controller};

/// Build a test API router over `opener`
fn build_test_router(opener: TestOpener) -> axum::Router {
    let controller = Arc::new(quiet_controller(Arc::new(opener)));
    api::router(Arc::new(ApiState { controller }))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_root_banner() {
    let app = build_test_router(TestOpener::endless());

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&body).contains("running"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_router(TestOpener::endless());

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_status_shape_when_idle() {
    let app = build_test_router(TestOpener::endless());

    let response = app.oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(
        json,
        serde_json::json!({"is_streaming": false, "camera_initialized": false})
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_without_camera_is_server_error() {
    let app = build_test_router(TestOpener::unavailable());

    let response = app.clone().oneshot(get("/start")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = json_body(response).await;
    let error = json["error"].as_str().unwrap();
    assert!(error.starts_with("Could not open camera"), "{error}");

    let status = json_body(app.oneshot(get("/status")).await.unwrap()).await;
    assert_eq!(status["is_streaming"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_status_stop_cycle() {
    let app = build_test_router(TestOpener::endless());

    let response = app.clone().oneshot(get("/start")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "Stream started successfully");

    let status = json_body(app.clone().oneshot(get("/status")).await.unwrap()).await;
    assert_eq!(status["is_streaming"], true);
    assert_eq!(status["camera_initialized"], true);

    let stop = Request::builder()
        .method(Method::POST)
        .uri("/stop")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(stop).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "Stream stopped successfully");

    let status = json_body(app.oneshot(get("/status")).await.unwrap()).await;
    assert_eq!(status["is_streaming"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_when_idle_succeeds() {
    let app = build_test_router(TestOpener::endless());

    let response = app.oneshot(get("/stop")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_video_feed_when_idle_is_empty() {
    let app = build_test_router(TestOpener::endless());

    let response = app.oneshot(get("/video_feed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        multipart::CONTENT_TYPE
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_video_feed_streams_multipart_jpeg() {
    let app = build_test_router(TestOpener::with_frames(2));

    let response = app.clone().oneshot(get("/start")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/video_feed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    // The camera runs dry after two frames, which ends the body
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let part_header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8";
    let parts = body
        .windows(part_header.len())
        .filter(|w| *w == part_header)
        .count();
    assert_eq!(parts, 2);
    assert!(body.ends_with(b"\xFF\xD9\r\n"));
}

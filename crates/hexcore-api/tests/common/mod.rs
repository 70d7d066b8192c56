//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use hexcore_api::bootstrap::{Adapters, build_dispatcher};
use hexcore_api::routes;
use hexcore_api::state::AppState;
use hexcore_dispatch::PipelineConfig;
use hexcore_test_support::{FixedClock, RecordingMetrics};
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const PASSWORD: &str = "Secret#123";

/// Build the full app router over the in-memory backend with a fixed clock.
pub fn build_test_app() -> Router {
    build_test_app_with_metrics(Arc::new(RecordingMetrics::default()))
}

pub fn build_test_app_with_metrics(metrics: Arc<RecordingMetrics>) -> Router {
    let dispatcher = build_dispatcher(
        Adapters::in_memory(),
        &PipelineConfig::default(),
        Arc::new(FixedClock::default()),
        metrics,
    )
    .unwrap();
    routes::app(AppState::new(dispatcher))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Send a request with a JSON body and return the response.
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    send(app, request).await
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: &Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, "POST", uri, body).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Send a DELETE request and return the response.
pub async fn delete(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Register a user and return its id.
pub async fn register(app: &Router, email: &str) -> String {
    let (status, json) = post_json(
        app,
        "/api/v1/users",
        &serde_json::json!({ "email": email, "password": PASSWORD, "name": "Ada" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["aggregate_id"].as_str().unwrap().to_string()
}

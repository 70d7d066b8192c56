//! Integration tests for the login route.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_login_with_valid_credentials_returns_200() {
    let app = common::build_test_app();
    let id = common::register(&app, "ada@example.com").await;

    let (status, json) = common::post_json(
        &app,
        "/api/v1/auth/login",
        &json!({ "email": "ada@example.com", "password": common::PASSWORD }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_id"], id);
    assert_eq!(json["roles"], json!(["user"]));
}

#[tokio::test]
async fn test_login_with_wrong_password_returns_401() {
    let app = common::build_test_app();
    common::register(&app, "ada@example.com").await;

    let (status, json) = common::post_json(
        &app,
        "/api/v1/auth/login",
        &json!({ "email": "ada@example.com", "password": "Wrong#123" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn test_login_records_client_metadata_in_history() {
    let app = common::build_test_app();
    let id = common::register(&app, "ada@example.com").await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.7")
        .header("user-agent", "api-test")
        .header("x-correlation-id", "0191f2a4-0000-7000-8000-000000000001")
        .body(Body::from(
            json!({ "email": "ada@example.com", "password": common::PASSWORD }).to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let (_, history) = common::get_json(&app, &format!("/api/v1/users/{id}/history")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let _ = response.into_body().collect().await.unwrap();
    let login = &history["events"][1];
    assert_eq!(login["event_type"], "user.logged_in");
    assert_eq!(login["payload"]["ip"], "203.0.113.7");
    assert_eq!(login["payload"]["user_agent"], "api-test");
    assert_eq!(login["correlation_id"], "0191f2a4-0000-7000-8000-000000000001");
}

//! Integration tests for the user routes.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use hexcore_test_support::RecordingMetrics;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_register_and_get_round_trip() {
    let app = common::build_test_app();

    let id = common::register(&app, "Ada@Example.com").await;
    let (status, json) = common::get_json(&app, &format!("/api/v1/users/{id}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_id"], id);
    assert_eq!(json["email"], "ada@example.com");
    assert_eq!(json["status"], "active");
    assert_eq!(json["roles"], json!(["user"]));
    assert_eq!(json["version"], 1);
    assert!(json.get("password").is_none());
}

#[tokio::test]
async fn test_duplicate_email_returns_409() {
    let app = common::build_test_app();
    common::register(&app, "ada@example.com").await;

    let (status, json) = common::post_json(
        &app,
        "/api/v1/users",
        &json!({ "email": "ada@example.com", "password": common::PASSWORD, "name": "Other" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn test_weak_password_returns_400() {
    let app = common::build_test_app();

    let (status, json) = common::post_json(
        &app,
        "/api/v1/users",
        &json!({ "email": "ada@example.com", "password": "password", "name": "Ada" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_failed");
}

#[tokio::test]
async fn test_unknown_user_returns_404() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(&app, &format!("/api/v1/users/{}", Uuid::new_v4())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_update_profile_is_visible_on_next_read() {
    let app = common::build_test_app();
    let id = common::register(&app, "ada@example.com").await;
    common::get_json(&app, &format!("/api/v1/users/{id}")).await;

    let (status, json) = common::send_json(
        &app,
        "PUT",
        &format!("/api/v1/users/{id}/profile"),
        &json!({ "name": "Countess", "bio": "Mathematician" }),
    )
    .await;
    let (_, view) = common::get_json(&app, &format!("/api/v1/users/{id}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 2);
    assert_eq!(view["name"], "Countess");
    assert_eq!(view["bio"], "Mathematician");
}

#[tokio::test]
async fn test_revoking_the_last_role_returns_422() {
    let app = common::build_test_app();
    let id = common::register(&app, "ada@example.com").await;

    let (status, json) = common::delete(&app, &format!("/api/v1/users/{id}/roles/user")).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "invariant_violation");
}

#[tokio::test]
async fn test_assign_unknown_role_returns_400() {
    let app = common::build_test_app();
    let id = common::register(&app, "ada@example.com").await;

    let (status, _) = common::post_json(
        &app,
        &format!("/api/v1/users/{id}/roles"),
        &json!({ "role": "superuser" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lock_and_unlock_user() {
    let app = common::build_test_app();
    let id = common::register(&app, "ada@example.com").await;

    let (locked, _) = common::post_json(
        &app,
        &format!("/api/v1/users/{id}/lock"),
        &json!({ "reason": "abuse report" }),
    )
    .await;
    let (_, view) = common::get_json(&app, &format!("/api/v1/users/{id}")).await;
    let (unlocked, _) =
        common::post_json(&app, &format!("/api/v1/users/{id}/unlock"), &json!({})).await;

    assert_eq!(locked, StatusCode::OK);
    assert_eq!(view["status"], "suspended");
    assert_eq!(unlocked, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_keeps_history() {
    let app = common::build_test_app();
    let id = common::register(&app, "ada@example.com").await;

    let (deleted, _) = common::delete(&app, &format!("/api/v1/users/{id}")).await;
    let (gone, _) = common::get_json(&app, &format!("/api/v1/users/{id}")).await;
    let (status, history) = common::get_json(&app, &format!("/api/v1/users/{id}/history")).await;

    assert_eq!(deleted, StatusCode::OK);
    assert_eq!(gone, StatusCode::NOT_FOUND);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["events"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_users_pages() {
    let app = common::build_test_app();
    for n in 0..3 {
        common::register(&app, &format!("user{n}@example.com")).await;
    }

    let (status, json) = common::get_json(&app, "/api/v1/users?page=2&page_size=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 3);
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_user_by_email() {
    let app = common::build_test_app();
    let id = common::register(&app, "ada@example.com").await;

    let (status, json) = common::get_json(&app, "/api/v1/users/by-email/ada@example.com").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_id"], id);
}

#[tokio::test]
async fn test_commands_are_counted_through_the_metrics_port() {
    let metrics = Arc::new(RecordingMetrics::default());
    let app = common::build_test_app_with_metrics(Arc::clone(&metrics));

    common::register(&app, "ada@example.com").await;

    assert!(!metrics.counters().is_empty());
}

#[tokio::test]
async fn test_registration_is_published_to_the_user_listener() {
    // Arrange
    let metrics = Arc::new(RecordingMetrics::default());
    let app = common::build_test_app_with_metrics(Arc::clone(&metrics));

    // Act
    common::register(&app, "ada@example.com").await;

    // Assert
    let counters = metrics.counters();
    assert!(counters.contains(&"user_created"));
    assert!(counters.contains(&"event_handle_success"));
    assert_eq!(
        metrics.labels_of("event_handle_success"),
        Some(vec![("event_type", "user.created".to_owned())])
    );
}

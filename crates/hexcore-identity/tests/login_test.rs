mod common;

use hexcore_core::cache::Cache;
use hexcore_core::error::DomainError;
use hexcore_identity::application::command_handlers::{MAX_FAILED_LOGINS, failed_logins_key};
use hexcore_identity::domain::commands::{Login, UnlockUser};
use hexcore_identity::domain::queries::{GetUser, GetUserHistory};
use hexcore_identity::domain::value_objects::UserStatus;

use common::{PASSWORD, harness, register};

fn login(email: &str, password: &str) -> Login {
    Login {
        email: email.to_owned(),
        password: password.to_owned(),
        ip: "203.0.113.7".to_owned(),
        user_agent: "integration-test".to_owned(),
    }
}

#[tokio::test]
async fn test_login_with_correct_password_records_the_login() {
    // Arrange
    let h = harness();
    let id = register(&h, "ada@example.com").await.aggregate_id;

    // Act
    let result = h
        .dispatcher
        .dispatch(login("ada@example.com", PASSWORD))
        .await
        .unwrap();

    // Assert
    assert_eq!(result.user_id, id);
    assert_eq!(result.email, "ada@example.com");
    let view = h.dispatcher.dispatch(GetUser { user_id: id }).await.unwrap();
    assert_eq!(view.last_login_at, Some(result.logged_in_at));
    assert_eq!(view.version, 2);
}

#[tokio::test]
async fn test_login_with_unknown_email_is_unauthorized() {
    // Arrange
    let h = harness();

    // Act
    let result = h.dispatcher.dispatch(login("nobody@example.com", PASSWORD)).await;

    // Assert
    assert!(matches!(result, Err(DomainError::Unauthorized(_))));
}

#[tokio::test]
async fn test_login_with_wrong_password_counts_the_failure() {
    // Arrange
    let h = harness();
    let id = register(&h, "ada@example.com").await.aggregate_id;

    // Act
    let result = h.dispatcher.dispatch(login("ada@example.com", "Wrong#123")).await;

    // Assert
    match result {
        Err(DomainError::Unauthorized(message)) => {
            assert_eq!(message, "invalid email or password");
        }
        other => panic!("expected Unauthorized, got {other:?}"),
    }
    let failures = h.cache.get(&failed_logins_key(id)).await.unwrap();
    assert_eq!(failures.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_repeated_failures_lock_the_account() {
    // Arrange
    let h = harness();
    let id = register(&h, "ada@example.com").await.aggregate_id;

    // Act
    for _ in 0..MAX_FAILED_LOGINS {
        let _ = h.dispatcher.dispatch(login("ada@example.com", "Wrong#123")).await;
    }
    let with_correct_password = h.dispatcher.dispatch(login("ada@example.com", PASSWORD)).await;

    // Assert
    match with_correct_password {
        Err(DomainError::Unauthorized(message)) => assert_eq!(message, "account is suspended"),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
    let view = h.dispatcher.dispatch(GetUser { user_id: id }).await.unwrap();
    assert_eq!(view.status, UserStatus::Suspended);
    assert!(h.cache.get(&failed_logins_key(id)).await.unwrap().is_none());
    let history = h
        .dispatcher
        .dispatch(GetUserHistory { user_id: id })
        .await
        .unwrap();
    assert_eq!(history.events.last().unwrap().event_type, "user.locked");
}

#[tokio::test]
async fn test_unlocked_account_can_log_in_again() {
    // Arrange
    let h = harness();
    let id = register(&h, "ada@example.com").await.aggregate_id;
    for _ in 0..MAX_FAILED_LOGINS {
        let _ = h.dispatcher.dispatch(login("ada@example.com", "Wrong#123")).await;
    }

    // Act
    h.dispatcher.dispatch(UnlockUser { user_id: id }).await.unwrap();
    let result = h.dispatcher.dispatch(login("ada@example.com", PASSWORD)).await;

    // Assert
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_login_refreshes_a_cached_user_view() {
    // Arrange
    let h = harness();
    let id = register(&h, "ada@example.com").await.aggregate_id;
    let before = h.dispatcher.dispatch(GetUser { user_id: id }).await.unwrap();

    // Act
    h.dispatcher
        .dispatch(login("ada@example.com", PASSWORD))
        .await
        .unwrap();
    let after = h.dispatcher.dispatch(GetUser { user_id: id }).await.unwrap();

    // Assert
    assert!(before.last_login_at.is_none());
    assert!(after.last_login_at.is_some());
}

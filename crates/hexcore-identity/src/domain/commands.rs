//! Commands for the identity context.

use std::fmt;

use chrono::{DateTime, Utc};
use hexcore_core::aggregate::AggregateRoot;
use hexcore_core::error::DomainError;
use hexcore_core::event::DomainEvent;
use hexcore_core::request::{Message, Request, RequestKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::User;
use super::value_objects::{Email, Password, UserProfile, UserRole, UserStatus};

/// Cache key of the single-user view.
#[must_use]
pub fn user_cache_key(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

/// Outcome of a state-changing user command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCommandResult {
    /// The user the command changed.
    pub aggregate_id: Uuid,
    /// Version after the command.
    pub version: i64,
    /// Events the command recorded.
    pub event_ids: Vec<Uuid>,
}

impl UserCommandResult {
    /// Summarises the pending events of `user`. Call before saving.
    #[must_use]
    pub fn pending(user: &User) -> Self {
        Self {
            aggregate_id: user.aggregate_id(),
            version: user.version(),
            event_ids: user
                .pending_events()
                .iter()
                .map(|e| e.metadata().event_id)
                .collect(),
        }
    }
}

/// Registers a new user.
#[derive(Clone)]
pub struct RegisterUser {
    /// Email address, normalised on registration.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Display name.
    pub name: String,
    /// Biography.
    pub bio: String,
}

impl fmt::Debug for RegisterUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterUser")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Message for RegisterUser {
    fn validate(&self) -> Result<(), DomainError> {
        Email::parse(&self.email)?;
        Password::parse(&self.password)?;
        UserProfile::new(&self.name, &self.bio)?;
        Ok(())
    }
}

impl Request for RegisterUser {
    type Output = UserCommandResult;
    const KIND: RequestKind = RequestKind::Command;
}

/// Replaces a user's profile.
#[derive(Debug, Clone)]
pub struct UpdateProfile {
    /// The user identifier.
    pub user_id: Uuid,
    /// New display name.
    pub name: String,
    /// New biography.
    pub bio: String,
}

impl Message for UpdateProfile {
    fn validate(&self) -> Result<(), DomainError> {
        UserProfile::new(&self.name, &self.bio).map(|_| ())
    }

    fn invalidates(&self) -> Vec<String> {
        vec![user_cache_key(self.user_id)]
    }
}

impl Request for UpdateProfile {
    type Output = UserCommandResult;
    const KIND: RequestKind = RequestKind::Command;
}

/// Changes a user's password.
#[derive(Clone)]
pub struct ChangePassword {
    /// The user identifier.
    pub user_id: Uuid,
    /// Current plaintext password.
    pub current_password: String,
    /// New plaintext password.
    pub new_password: String,
}

impl fmt::Debug for ChangePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangePassword")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl Message for ChangePassword {
    fn validate(&self) -> Result<(), DomainError> {
        if self.current_password.is_empty() {
            return Err(DomainError::Validation(
                "current password must not be empty".into(),
            ));
        }
        Password::parse(&self.new_password).map(|_| ())
    }

    fn invalidates(&self) -> Vec<String> {
        vec![user_cache_key(self.user_id)]
    }
}

impl Request for ChangePassword {
    type Output = UserCommandResult;
    const KIND: RequestKind = RequestKind::Command;
}

/// Grants a role.
#[derive(Debug, Clone)]
pub struct AssignRole {
    /// The user identifier.
    pub user_id: Uuid,
    /// Role to grant.
    pub role: UserRole,
}

impl Message for AssignRole {
    fn invalidates(&self) -> Vec<String> {
        vec![user_cache_key(self.user_id)]
    }
}

impl Request for AssignRole {
    type Output = UserCommandResult;
    const KIND: RequestKind = RequestKind::Command;
}

/// Revokes a role.
#[derive(Debug, Clone)]
pub struct RevokeRole {
    /// The user identifier.
    pub user_id: Uuid,
    /// Role to revoke.
    pub role: UserRole,
}

impl Message for RevokeRole {
    fn invalidates(&self) -> Vec<String> {
        vec![user_cache_key(self.user_id)]
    }
}

impl Request for RevokeRole {
    type Output = UserCommandResult;
    const KIND: RequestKind = RequestKind::Command;
}

/// Moves a user to another status.
#[derive(Debug, Clone)]
pub struct ChangeStatus {
    /// The user identifier.
    pub user_id: Uuid,
    /// Target status.
    pub status: UserStatus,
}

impl Message for ChangeStatus {
    fn validate(&self) -> Result<(), DomainError> {
        if self.status == UserStatus::Deleted {
            return Err(DomainError::Validation(
                "use DeleteUser to delete a user".into(),
            ));
        }
        Ok(())
    }

    fn invalidates(&self) -> Vec<String> {
        vec![user_cache_key(self.user_id)]
    }
}

impl Request for ChangeStatus {
    type Output = UserCommandResult;
    const KIND: RequestKind = RequestKind::Command;
}

/// Suspends an active account.
#[derive(Debug, Clone)]
pub struct LockUser {
    /// The user identifier.
    pub user_id: Uuid,
    /// Why the account is locked.
    pub reason: String,
}

impl Message for LockUser {
    fn validate(&self) -> Result<(), DomainError> {
        if self.reason.trim().is_empty() {
            return Err(DomainError::Validation("lock reason must not be empty".into()));
        }
        Ok(())
    }

    fn invalidates(&self) -> Vec<String> {
        vec![user_cache_key(self.user_id)]
    }
}

impl Request for LockUser {
    type Output = UserCommandResult;
    const KIND: RequestKind = RequestKind::Command;
}

/// Reactivates a suspended account.
#[derive(Debug, Clone)]
pub struct UnlockUser {
    /// The user identifier.
    pub user_id: Uuid,
}

impl Message for UnlockUser {
    fn invalidates(&self) -> Vec<String> {
        vec![user_cache_key(self.user_id)]
    }
}

impl Request for UnlockUser {
    type Output = UserCommandResult;
    const KIND: RequestKind = RequestKind::Command;
}

/// Marks a user deleted and removes the projection. History is kept.
#[derive(Debug, Clone)]
pub struct DeleteUser {
    /// The user identifier.
    pub user_id: Uuid,
}

impl Message for DeleteUser {
    fn invalidates(&self) -> Vec<String> {
        vec![user_cache_key(self.user_id)]
    }
}

impl Request for DeleteUser {
    type Output = UserCommandResult;
    const KIND: RequestKind = RequestKind::Command;
}

/// Checks credentials and records the login.
#[derive(Clone)]
pub struct Login {
    /// Email address as typed.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Client address.
    pub ip: String,
    /// Client user agent.
    pub user_agent: String,
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("email", &self.email)
            .field("ip", &self.ip)
            .finish_non_exhaustive()
    }
}

impl Message for Login {
    fn validate(&self) -> Result<(), DomainError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(DomainError::Validation(
                "email and password are required".into(),
            ));
        }
        Ok(())
    }
}

impl Request for Login {
    type Output = LoginResult;
    const KIND: RequestKind = RequestKind::Command;
}

/// Identity of a user who just logged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResult {
    /// The user identifier.
    pub user_id: Uuid,
    /// Normalised email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Granted roles.
    pub roles: Vec<UserRole>,
    /// Time of this login.
    pub logged_in_at: DateTime<Utc>,
}

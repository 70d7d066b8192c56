//! Domain events for the identity context.

use hexcore_core::error::DomainError;
use hexcore_core::event::{DomainEvent, EventMetadata, encode_payload};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{UserRole, UserStatus};

/// Emitted when a user registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    /// The user identifier.
    pub user_id: Uuid,
    /// Normalised email address.
    pub email: String,
    /// Display name.
    pub name: String,
}

/// Emitted when the profile changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdated {
    /// The user identifier.
    pub user_id: Uuid,
    /// New display name.
    pub name: String,
    /// New biography.
    pub bio: String,
}

/// Emitted when the password changes. Carries no secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordChanged {
    /// The user identifier.
    pub user_id: Uuid,
}

/// Emitted on a status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChanged {
    /// The user identifier.
    pub user_id: Uuid,
    /// Status before the change.
    pub from: UserStatus,
    /// Status after the change.
    pub to: UserStatus,
}

/// Emitted when a role is granted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssigned {
    /// The user identifier.
    pub user_id: Uuid,
    /// The role granted.
    pub role: UserRole,
}

/// Emitted when a role is taken away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRevoked {
    /// The user identifier.
    pub user_id: Uuid,
    /// The role revoked.
    pub role: UserRole,
}

/// Emitted on a successful login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedIn {
    /// The user identifier.
    pub user_id: Uuid,
    /// Client address.
    pub ip: String,
    /// Client user agent.
    pub user_agent: String,
}

/// Emitted when an account is locked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLocked {
    /// The user identifier.
    pub user_id: Uuid,
    /// Why the account was locked.
    pub reason: String,
}

/// Emitted when a locked account is reopened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUnlocked {
    /// The user identifier.
    pub user_id: Uuid,
}

/// Event payload variants for the identity context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UserEventKind {
    /// A user has registered.
    UserCreated(UserCreated),
    /// A profile has been updated.
    ProfileUpdated(ProfileUpdated),
    /// A password has been changed.
    PasswordChanged(PasswordChanged),
    /// A status has changed.
    StatusChanged(StatusChanged),
    /// A role has been assigned.
    RoleAssigned(RoleAssigned),
    /// A role has been revoked.
    RoleRevoked(RoleRevoked),
    /// A user has logged in.
    LoggedIn(LoggedIn),
    /// An account has been locked.
    UserLocked(UserLocked),
    /// An account has been unlocked.
    UserUnlocked(UserUnlocked),
}

impl UserEventKind {
    /// Stored event type tag.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::UserCreated(_) => "user.created",
            Self::ProfileUpdated(_) => "user.profile_updated",
            Self::PasswordChanged(_) => "user.password_changed",
            Self::StatusChanged(_) => "user.status_changed",
            Self::RoleAssigned(_) => "user.role_assigned",
            Self::RoleRevoked(_) => "user.role_revoked",
            Self::LoggedIn(_) => "user.logged_in",
            Self::UserLocked(_) => "user.locked",
            Self::UserUnlocked(_) => "user.unlocked",
        }
    }
}

/// Domain event envelope for the identity context.
#[derive(Debug, Clone)]
pub struct UserEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: UserEventKind,
}

impl DomainEvent for UserEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        match &self.kind {
            UserEventKind::UserCreated(p) => encode_payload(p),
            UserEventKind::ProfileUpdated(p) => encode_payload(p),
            UserEventKind::PasswordChanged(p) => encode_payload(p),
            UserEventKind::StatusChanged(p) => encode_payload(p),
            UserEventKind::RoleAssigned(p) => encode_payload(p),
            UserEventKind::RoleRevoked(p) => encode_payload(p),
            UserEventKind::LoggedIn(p) => encode_payload(p),
            UserEventKind::UserLocked(p) => encode_payload(p),
            UserEventKind::UserUnlocked(p) => encode_payload(p),
        }
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

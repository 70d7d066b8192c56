//! The `User` aggregate root.

use chrono::{DateTime, Utc};
use hexcore_core::aggregate::{AggregateBase, AggregateRoot};
use hexcore_core::clock::Clock;
use hexcore_core::error::DomainError;
use hexcore_core::projection::UniqueKey;
use hexcore_core::repository::Projected;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    LoggedIn, PasswordChanged, ProfileUpdated, RoleAssigned, RoleRevoked, StatusChanged,
    UserCreated, UserEvent, UserEventKind, UserLocked, UserUnlocked,
};
use super::value_objects::{Email, PasswordHash, UserProfile, UserRole, UserStatus};

/// A registered user.
#[derive(Debug)]
pub struct User {
    base: AggregateBase<UserEvent>,
    email: Email,
    password: PasswordHash,
    profile: UserProfile,
    status: UserStatus,
    roles: Vec<UserRole>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

/// Stored current state of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Normalised email address.
    pub email: Email,
    /// Salted password digest.
    pub password: PasswordHash,
    /// Display name and biography.
    pub profile: UserProfile,
    /// Account status.
    pub status: UserStatus,
    /// Granted roles, in grant order.
    pub roles: Vec<UserRole>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
    /// Time of the last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Registers a new active user with the `user` role.
    #[must_use]
    pub fn register(
        user_id: Uuid,
        email: Email,
        password: PasswordHash,
        profile: UserProfile,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Self {
        let now = clock.now();
        let mut user = Self {
            base: AggregateBase::new(user_id),
            email,
            password,
            profile,
            status: UserStatus::Active,
            roles: vec![UserRole::User],
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        let kind = UserEventKind::UserCreated(UserCreated {
            user_id,
            email: user.email.to_string(),
            name: user.profile.name().to_owned(),
        });
        user.record(kind, correlation_id, clock);
        user
    }

    /// Replaces the profile.
    pub fn update_profile(&mut self, profile: UserProfile, correlation_id: Uuid, clock: &dyn Clock) {
        let kind = UserEventKind::ProfileUpdated(ProfileUpdated {
            user_id: self.id(),
            name: profile.name().to_owned(),
            bio: profile.bio().to_owned(),
        });
        self.profile = profile;
        self.record(kind, correlation_id, clock);
    }

    /// Replaces the password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Unauthorized` if `current` is wrong.
    pub fn change_password(
        &mut self,
        current: &str,
        new: PasswordHash,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !self.password.verify(current) {
            return Err(DomainError::Unauthorized(
                "current password is incorrect".into(),
            ));
        }
        self.password = new;
        let kind = UserEventKind::PasswordChanged(PasswordChanged { user_id: self.id() });
        self.record(kind, correlation_id, clock);
        Ok(())
    }

    /// Moves the account to `status`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvariantViolation` for a disallowed transition.
    pub fn change_status(
        &mut self,
        status: UserStatus,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let from = self.status;
        self.status = from.transition_to(status)?;
        let kind = UserEventKind::StatusChanged(StatusChanged {
            user_id: self.id(),
            from,
            to: status,
        });
        self.record(kind, correlation_id, clock);
        Ok(())
    }

    /// Grants `role`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvariantViolation` if the role is already held.
    pub fn assign_role(
        &mut self,
        role: UserRole,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.has_role(role) {
            return Err(DomainError::InvariantViolation(format!(
                "role {role} is already assigned"
            )));
        }
        self.roles.push(role);
        let kind = UserEventKind::RoleAssigned(RoleAssigned {
            user_id: self.id(),
            role,
        });
        self.record(kind, correlation_id, clock);
        Ok(())
    }

    /// Takes `role` away.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvariantViolation` if the role is not held or
    /// is the last one.
    pub fn revoke_role(
        &mut self,
        role: UserRole,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !self.has_role(role) {
            return Err(DomainError::InvariantViolation(format!(
                "role {role} is not assigned"
            )));
        }
        if self.roles.len() == 1 {
            return Err(DomainError::InvariantViolation(
                "cannot revoke the last role".into(),
            ));
        }
        self.roles.retain(|r| *r != role);
        let kind = UserEventKind::RoleRevoked(RoleRevoked {
            user_id: self.id(),
            role,
        });
        self.record(kind, correlation_id, clock);
        Ok(())
    }

    /// Suspends an active account.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvariantViolation` unless the account is active.
    pub fn lock(&mut self, reason: &str, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        if !self.status.is_active() {
            return Err(DomainError::InvariantViolation(format!(
                "cannot lock a {} account",
                self.status
            )));
        }
        self.status = UserStatus::Suspended;
        let kind = UserEventKind::UserLocked(UserLocked {
            user_id: self.id(),
            reason: reason.to_owned(),
        });
        self.record(kind, correlation_id, clock);
        Ok(())
    }

    /// Reactivates a suspended account.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvariantViolation` unless the account is suspended.
    pub fn unlock(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.status != UserStatus::Suspended {
            return Err(DomainError::InvariantViolation(format!(
                "cannot unlock a {} account",
                self.status
            )));
        }
        self.status = UserStatus::Active;
        let kind = UserEventKind::UserUnlocked(UserUnlocked { user_id: self.id() });
        self.record(kind, correlation_id, clock);
        Ok(())
    }

    /// Records a successful login.
    pub fn record_login(&mut self, ip: &str, user_agent: &str, correlation_id: Uuid, clock: &dyn Clock) {
        let kind = UserEventKind::LoggedIn(LoggedIn {
            user_id: self.id(),
            ip: ip.to_owned(),
            user_agent: user_agent.to_owned(),
        });
        self.record(kind, correlation_id, clock);
        self.last_login_at = Some(self.updated_at);
    }

    /// Whether `plaintext` is the current password.
    #[must_use]
    pub fn verify_password(&self, plaintext: &str) -> bool {
        self.password.verify(plaintext)
    }

    /// Whether the user holds `role`.
    #[must_use]
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }

    /// Whether any held role grants `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.roles.iter().any(|r| r.has_permission(permission))
    }

    /// The user identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.base.id()
    }

    /// Normalised email address.
    #[must_use]
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Display name and biography.
    #[must_use]
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Account status.
    #[must_use]
    pub fn status(&self) -> UserStatus {
        self.status
    }

    /// Granted roles.
    #[must_use]
    pub fn roles(&self) -> &[UserRole] {
        &self.roles
    }

    /// Registration time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last change.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Time of the last successful login.
    #[must_use]
    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    fn record(&mut self, kind: UserEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        let metadata = self
            .base
            .next_metadata(kind.event_type(), correlation_id, clock);
        self.updated_at = metadata.occurred_at;
        self.base.record(UserEvent { metadata, kind });
    }
}

impl AggregateRoot for User {
    type Event = UserEvent;

    fn aggregate_id(&self) -> Uuid {
        self.base.id()
    }

    fn version(&self) -> i64 {
        self.base.version()
    }

    fn pending_events(&self) -> &[UserEvent] {
        self.base.pending()
    }

    fn clear_pending_events(&mut self) {
        self.base.clear();
    }
}

impl Projected for User {
    const KIND: &'static str = "user";
    type Record = UserRecord;

    fn to_record(&self) -> UserRecord {
        UserRecord {
            email: self.email.clone(),
            password: self.password.clone(),
            profile: self.profile.clone(),
            status: self.status,
            roles: self.roles.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login_at: self.last_login_at,
        }
    }

    fn from_record(id: Uuid, version: i64, record: UserRecord) -> Result<Self, DomainError> {
        if record.roles.is_empty() {
            return Err(DomainError::Infrastructure(format!(
                "stored user {id} has no roles"
            )));
        }
        Ok(Self {
            base: AggregateBase::restored(id, version),
            email: record.email,
            password: record.password,
            profile: record.profile,
            status: record.status,
            roles: record.roles,
            created_at: record.created_at,
            updated_at: record.updated_at,
            last_login_at: record.last_login_at,
        })
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("email", self.email.as_str())]
    }
}

#[cfg(test)]
mod tests {
    use hexcore_core::event::DomainEvent;
    use hexcore_test_support::{FixedClock, fixed_now};

    use super::*;
    use crate::domain::value_objects::Password;

    fn registered() -> User {
        let password = Password::parse("S3cret!pw").unwrap();
        let mut user = User::register(
            Uuid::new_v4(),
            Email::parse("ada@example.com").unwrap(),
            PasswordHash::new(&password),
            UserProfile::new("Ada", "").unwrap(),
            Uuid::new_v4(),
            &FixedClock::default(),
        );
        user.clear_pending_events();
        user
    }

    #[test]
    fn test_register_records_user_created() {
        // Arrange
        let correlation_id = Uuid::new_v4();
        let password = Password::parse("S3cret!pw").unwrap();

        // Act
        let user = User::register(
            Uuid::new_v4(),
            Email::parse("ada@example.com").unwrap(),
            PasswordHash::new(&password),
            UserProfile::new("Ada", "").unwrap(),
            correlation_id,
            &FixedClock::default(),
        );

        // Assert
        assert_eq!(user.version(), 1);
        assert_eq!(user.status(), UserStatus::Active);
        assert_eq!(user.roles(), &[UserRole::User]);
        let event = &user.pending_events()[0];
        assert_eq!(event.event_type(), "user.created");
        assert_eq!(event.metadata().sequence_number, 1);
        assert_eq!(event.metadata().correlation_id, correlation_id);
        assert_eq!(event.metadata().occurred_at, fixed_now());
    }

    #[test]
    fn test_each_operation_records_one_event() {
        // Arrange
        let clock = FixedClock::default();
        let mut user = registered();
        let cid = Uuid::new_v4();

        // Act
        user.update_profile(UserProfile::new("Ada L.", "Analyst").unwrap(), cid, &clock);
        user.assign_role(UserRole::Admin, cid, &clock).unwrap();
        user.revoke_role(UserRole::User, cid, &clock).unwrap();
        user.lock("suspicious activity", cid, &clock).unwrap();
        user.unlock(cid, &clock).unwrap();
        user.record_login("127.0.0.1", "curl", cid, &clock);

        // Assert
        let types: Vec<&str> = user.pending_events().iter().map(DomainEvent::event_type).collect();
        assert_eq!(
            types,
            vec![
                "user.profile_updated",
                "user.role_assigned",
                "user.role_revoked",
                "user.locked",
                "user.unlocked",
                "user.logged_in",
            ]
        );
        assert_eq!(user.version(), 7);
        assert_eq!(user.persisted_version(), 1);
        assert_eq!(user.last_login_at(), Some(fixed_now()));
    }

    #[test]
    fn test_change_password_requires_current_password() {
        // Arrange
        let clock = FixedClock::default();
        let mut user = registered();
        let new = PasswordHash::new(&Password::parse("N3w!pass").unwrap());

        // Act
        let result = user.change_password("wrong", new, Uuid::new_v4(), &clock);

        // Assert
        assert!(matches!(result, Err(DomainError::Unauthorized(_))));
        assert!(user.pending_events().is_empty());
        assert!(user.verify_password("S3cret!pw"));
    }

    #[test]
    fn test_change_password_replaces_hash() {
        let clock = FixedClock::default();
        let mut user = registered();
        let new = PasswordHash::new(&Password::parse("N3w!pass").unwrap());

        user.change_password("S3cret!pw", new, Uuid::new_v4(), &clock).unwrap();

        assert!(user.verify_password("N3w!pass"));
        assert!(!user.verify_password("S3cret!pw"));
    }

    #[test]
    fn test_assigning_held_role_is_rejected() {
        let clock = FixedClock::default();
        let mut user = registered();

        let result = user.assign_role(UserRole::User, Uuid::new_v4(), &clock);

        match result.unwrap_err() {
            DomainError::InvariantViolation(msg) => assert_eq!(msg, "role user is already assigned"),
            other => panic!("expected InvariantViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_revoking_last_role_is_rejected() {
        let clock = FixedClock::default();
        let mut user = registered();

        let result = user.revoke_role(UserRole::User, Uuid::new_v4(), &clock);

        match result.unwrap_err() {
            DomainError::InvariantViolation(msg) => assert_eq!(msg, "cannot revoke the last role"),
            other => panic!("expected InvariantViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_revoking_unheld_role_is_rejected() {
        let clock = FixedClock::default();
        let mut user = registered();
        user.assign_role(UserRole::Admin, Uuid::new_v4(), &clock).unwrap();

        let result = user.revoke_role(UserRole::Moderator, Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn test_same_status_change_is_rejected() {
        let clock = FixedClock::default();
        let mut user = registered();

        let result = user.change_status(UserStatus::Active, Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
        assert_eq!(user.version(), 1);
    }

    #[test]
    fn test_lock_requires_active_account() {
        let clock = FixedClock::default();
        let mut user = registered();
        user.change_status(UserStatus::Inactive, Uuid::new_v4(), &clock).unwrap();

        let result = user.lock("too many attempts", Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn test_record_round_trip_keeps_state() {
        // Arrange
        let clock = FixedClock::default();
        let mut user = registered();
        user.assign_role(UserRole::Moderator, Uuid::new_v4(), &clock).unwrap();

        // Act
        let record = user.to_record();
        let restored = User::from_record(user.id(), user.version(), record).unwrap();

        // Assert
        assert_eq!(restored.version(), 2);
        assert!(restored.pending_events().is_empty());
        assert!(restored.has_permission("content.moderate"));
        assert_eq!(restored.email().as_str(), "ada@example.com");
        assert_eq!(restored.unique_keys(), vec![UniqueKey::new("email", "ada@example.com")]);
    }
}

//! Queries and read models for the identity context.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hexcore_core::aggregate::AggregateRoot;
use hexcore_core::cache::CachePolicy;
use hexcore_core::error::DomainError;
use hexcore_core::event::StoredEvent;
use hexcore_core::event_store::AggregateHistory;
use hexcore_core::request::{Message, Request, RequestKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::User;
use super::commands::user_cache_key;
use super::value_objects::{UserRole, UserStatus};

/// How long a single-user view stays cached.
pub const USER_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default page size for [`ListUsers`].
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page size for [`ListUsers`].
pub const MAX_PAGE_SIZE: u32 = 100;

/// Read-only view of a user. Never exposes the password digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    /// The user identifier.
    pub user_id: Uuid,
    /// Normalised email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Biography.
    pub bio: String,
    /// Account status.
    pub status: UserStatus,
    /// Granted roles.
    pub roles: Vec<UserRole>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
    /// Time of the last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Current version (event count).
    pub version: i64,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id(),
            email: user.email().to_string(),
            name: user.profile().name().to_owned(),
            bio: user.profile().bio().to_owned(),
            status: user.status(),
            roles: user.roles().to_vec(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
            last_login_at: user.last_login_at(),
            version: user.version(),
        }
    }
}

/// One page of users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPage {
    /// Users on this page, ordered by id.
    pub users: Vec<UserView>,
    /// One-based page number.
    pub page: u32,
    /// Requested page size after clamping.
    pub page_size: u32,
    /// Users across all pages.
    pub total: u64,
    /// Number of pages.
    pub total_pages: u64,
}

/// Full event history of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserHistoryView {
    /// The user identifier.
    pub user_id: Uuid,
    /// Version after the last event.
    pub version: i64,
    /// Time of the first event.
    pub created_at: DateTime<Utc>,
    /// Time of the last event.
    pub updated_at: DateTime<Utc>,
    /// Every event, oldest first.
    pub events: Vec<StoredEvent>,
}

impl From<AggregateHistory> for UserHistoryView {
    fn from(history: AggregateHistory) -> Self {
        Self {
            user_id: history.aggregate_id,
            version: history.version,
            created_at: history.created_at,
            updated_at: history.updated_at,
            events: history.events,
        }
    }
}

/// Fetches one user by id. Cached for an hour under `user:{id}`.
#[derive(Debug, Clone)]
pub struct GetUser {
    /// The user identifier.
    pub user_id: Uuid,
}

impl Message for GetUser {
    fn cache_policy(&self) -> Option<CachePolicy> {
        Some(CachePolicy::new(user_cache_key(self.user_id), USER_CACHE_TTL))
    }
}

impl Request for GetUser {
    type Output = UserView;
    const KIND: RequestKind = RequestKind::Query;
}

/// Fetches one user by email address.
#[derive(Debug, Clone)]
pub struct GetUserByEmail {
    /// Email address as typed.
    pub email: String,
}

impl Message for GetUserByEmail {
    fn validate(&self) -> Result<(), DomainError> {
        if self.email.trim().is_empty() {
            return Err(DomainError::Validation("email must not be empty".into()));
        }
        Ok(())
    }
}

impl Request for GetUserByEmail {
    type Output = UserView;
    const KIND: RequestKind = RequestKind::Query;
}

/// Lists users a page at a time.
///
/// A page of 0 is treated as 1, a size of 0 as the default, and sizes above
/// the maximum are clamped.
#[derive(Debug, Clone, Default)]
pub struct ListUsers {
    /// One-based page number.
    pub page: u32,
    /// Users per page.
    pub page_size: u32,
}

impl ListUsers {
    /// Page and size after applying the defaults and limits.
    #[must_use]
    pub fn normalized(&self) -> (u32, u32) {
        let page = self.page.max(1);
        let page_size = match self.page_size {
            0 => DEFAULT_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        (page, page_size)
    }
}

impl Message for ListUsers {}

impl Request for ListUsers {
    type Output = UserPage;
    const KIND: RequestKind = RequestKind::Query;
}

/// Fetches a user's full event history.
#[derive(Debug, Clone)]
pub struct GetUserHistory {
    /// The user identifier.
    pub user_id: Uuid,
}

impl Message for GetUserHistory {}

impl Request for GetUserHistory {
    type Output = UserHistoryView;
    const KIND: RequestKind = RequestKind::Query;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_users_normalization() {
        assert_eq!(ListUsers { page: 0, page_size: 0 }.normalized(), (1, 10));
        assert_eq!(ListUsers { page: 3, page_size: 500 }.normalized(), (3, 100));
        assert_eq!(ListUsers { page: 2, page_size: 25 }.normalized(), (2, 25));
    }

    #[test]
    fn test_get_user_is_cached_for_an_hour() {
        let user_id = Uuid::new_v4();

        let policy = GetUser { user_id }.cache_policy().unwrap();

        assert_eq!(policy.key, format!("user:{user_id}"));
        assert_eq!(policy.ttl, Some(Duration::from_secs(3600)));
    }
}

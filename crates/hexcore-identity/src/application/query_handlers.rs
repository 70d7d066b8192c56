//! Query handlers for the identity context.
//!
//! Queries read the current-state projection and never replay events.

use async_trait::async_trait;
use hexcore_core::error::DomainError;
use hexcore_core::repository::AggregateRepository;
use hexcore_core::request::Handler;
use hexcore_core::transaction::{Database, RequestContext};

use crate::domain::aggregates::User;
use crate::domain::queries::{
    GetUser, GetUserByEmail, GetUserHistory, ListUsers, UserHistoryView, UserPage, UserView,
};
use crate::domain::value_objects::Email;

/// Answers user queries.
pub struct UserQueryService<D: Database> {
    repository: AggregateRepository<D, User>,
}

impl<D: Database> UserQueryService<D> {
    /// Creates the service.
    #[must_use]
    pub fn new(repository: AggregateRepository<D, User>) -> Self {
        Self { repository }
    }
}

impl<D: Database> Clone for UserQueryService<D> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

#[async_trait]
impl<D: Database> Handler<GetUser, D> for UserQueryService<D> {
    async fn handle(
        &self,
        _ctx: &mut RequestContext<D>,
        request: &GetUser,
    ) -> Result<UserView, DomainError> {
        let user = self.repository.find_by_id(request.user_id).await?;
        Ok(UserView::from(&user))
    }
}

#[async_trait]
impl<D: Database> Handler<GetUserByEmail, D> for UserQueryService<D> {
    async fn handle(
        &self,
        _ctx: &mut RequestContext<D>,
        request: &GetUserByEmail,
    ) -> Result<UserView, DomainError> {
        let email = Email::parse(&request.email)?;
        self.repository
            .find_by_key("email", email.as_str())
            .await?
            .map(|user| UserView::from(&user))
            .ok_or_else(|| DomainError::NotFound(format!("user with email {email}")))
    }
}

#[async_trait]
impl<D: Database> Handler<ListUsers, D> for UserQueryService<D> {
    async fn handle(
        &self,
        _ctx: &mut RequestContext<D>,
        request: &ListUsers,
    ) -> Result<UserPage, DomainError> {
        let (page, page_size) = request.normalized();
        let offset = u64::from(page - 1) * u64::from(page_size);
        let (users, total) = self.repository.list(offset, u64::from(page_size)).await?;
        Ok(UserPage {
            users: users.iter().map(UserView::from).collect(),
            page,
            page_size,
            total,
            total_pages: total.div_ceil(u64::from(page_size)),
        })
    }
}

#[async_trait]
impl<D: Database> Handler<GetUserHistory, D> for UserQueryService<D> {
    async fn handle(
        &self,
        _ctx: &mut RequestContext<D>,
        request: &GetUserHistory,
    ) -> Result<UserHistoryView, DomainError> {
        let history = self.repository.history(request.user_id).await?;
        Ok(UserHistoryView::from(history))
    }
}

//! Command handlers for the identity context.
//!
//! Each handler loads the user from its projection, runs one domain
//! operation and stores the result inside a unit of work. The unit of work
//! joins the transaction opened by the pipeline when there is one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hexcore_core::cache::Cache;
use hexcore_core::clock::Clock;
use hexcore_core::error::DomainError;
use hexcore_core::repository::AggregateRepository;
use hexcore_core::request::Handler;
use hexcore_core::transaction::{Database, RequestContext};
use hexcore_core::unit_of_work::{UnitOfWork, catch_fault};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::User;
use crate::domain::commands::{
    AssignRole, ChangePassword, ChangeStatus, DeleteUser, LockUser, Login, LoginResult,
    RegisterUser, RevokeRole, UnlockUser, UpdateProfile, UserCommandResult, user_cache_key,
};
use crate::domain::value_objects::{Email, Password, PasswordHash, UserProfile, UserStatus};

/// Failed logins that lock an account.
pub const MAX_FAILED_LOGINS: i64 = 5;

/// How long failed logins are remembered.
pub const FAILED_LOGIN_WINDOW: Duration = Duration::from_secs(3600);

/// Cache key counting failed logins for a user.
#[must_use]
pub fn failed_logins_key(user_id: Uuid) -> String {
    format!("login_failures:{user_id}")
}

/// Handles every state-changing user command except [`Login`].
pub struct UserCommandService<D: Database> {
    repository: AggregateRepository<D, User>,
    unit_of_work: UnitOfWork<D>,
    clock: Arc<dyn Clock>,
}

impl<D: Database> UserCommandService<D> {
    /// Creates the service.
    #[must_use]
    pub fn new(
        repository: AggregateRepository<D, User>,
        unit_of_work: UnitOfWork<D>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            unit_of_work,
            clock,
        }
    }

    /// Loads a user, applies `change` and stores it in one unit of work.
    async fn change<F>(
        &self,
        ctx: &mut RequestContext<D>,
        user_id: Uuid,
        change: F,
    ) -> Result<UserCommandResult, DomainError>
    where
        F: FnOnce(&mut User, Uuid, &dyn Clock) -> Result<(), DomainError> + Send,
    {
        let mut scope = self.unit_of_work.begin(ctx).await?;
        let outcome = catch_fault(self.apply(scope.context(), user_id, change)).await;
        scope.finish(outcome).await
    }

    async fn apply<F>(
        &self,
        ctx: &mut RequestContext<D>,
        user_id: Uuid,
        change: F,
    ) -> Result<UserCommandResult, DomainError>
    where
        F: FnOnce(&mut User, Uuid, &dyn Clock) -> Result<(), DomainError> + Send,
    {
        let mut user = self.repository.find_by_id(user_id).await?;
        change(&mut user, ctx.correlation_id(), self.clock.as_ref())?;
        let result = UserCommandResult::pending(&user);
        self.repository.update(ctx, &mut user).await?;
        Ok(result)
    }

    async fn register(
        &self,
        ctx: &mut RequestContext<D>,
        user: &mut User,
    ) -> Result<(), DomainError> {
        let taken = self
            .repository
            .find_by_key("email", user.email().as_str())
            .await?;
        if taken.is_some() {
            return Err(DomainError::Conflict(format!(
                "email {} is already registered",
                user.email()
            )));
        }
        self.repository.save(ctx, user).await
    }

    async fn delete(
        &self,
        ctx: &mut RequestContext<D>,
        user_id: Uuid,
    ) -> Result<UserCommandResult, DomainError> {
        let mut user = self.repository.find_by_id(user_id).await?;
        user.change_status(UserStatus::Deleted, ctx.correlation_id(), self.clock.as_ref())?;
        let result = UserCommandResult::pending(&user);
        self.repository.update(ctx, &mut user).await?;
        self.repository.delete(ctx, user_id).await?;
        Ok(result)
    }
}

impl<D: Database> Clone for UserCommandService<D> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            unit_of_work: self.unit_of_work.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

#[async_trait]
impl<D: Database> Handler<RegisterUser, D> for UserCommandService<D> {
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &RegisterUser,
    ) -> Result<UserCommandResult, DomainError> {
        let email = Email::parse(&request.email)?;
        let password = Password::parse(&request.password)?;
        let profile = UserProfile::new(&request.name, &request.bio)?;

        let mut user = User::register(
            Uuid::new_v4(),
            email,
            PasswordHash::new(&password),
            profile,
            ctx.correlation_id(),
            self.clock.as_ref(),
        );
        let result = UserCommandResult::pending(&user);

        let mut scope = self.unit_of_work.begin(ctx).await?;
        let outcome = catch_fault(self.register(scope.context(), &mut user)).await;
        scope.finish(outcome).await?;

        info!(user_id = %result.aggregate_id, "user registered");
        Ok(result)
    }

    fn requires_transaction(&self) -> bool {
        true
    }
}

#[async_trait]
impl<D: Database> Handler<UpdateProfile, D> for UserCommandService<D> {
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &UpdateProfile,
    ) -> Result<UserCommandResult, DomainError> {
        let profile = UserProfile::new(&request.name, &request.bio)?;
        self.change(ctx, request.user_id, move |user, cid, clock| {
            user.update_profile(profile, cid, clock);
            Ok(())
        })
        .await
    }

    fn requires_transaction(&self) -> bool {
        true
    }
}

#[async_trait]
impl<D: Database> Handler<ChangePassword, D> for UserCommandService<D> {
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &ChangePassword,
    ) -> Result<UserCommandResult, DomainError> {
        let new = PasswordHash::new(&Password::parse(&request.new_password)?);
        let current = request.current_password.clone();
        let result = self
            .change(ctx, request.user_id, move |user, cid, clock| {
                user.change_password(&current, new, cid, clock)
            })
            .await?;
        info!(user_id = %request.user_id, "password changed");
        Ok(result)
    }

    fn requires_transaction(&self) -> bool {
        true
    }
}

#[async_trait]
impl<D: Database> Handler<AssignRole, D> for UserCommandService<D> {
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &AssignRole,
    ) -> Result<UserCommandResult, DomainError> {
        let role = request.role;
        self.change(ctx, request.user_id, move |user, cid, clock| {
            user.assign_role(role, cid, clock)
        })
        .await
    }

    fn requires_transaction(&self) -> bool {
        true
    }
}

#[async_trait]
impl<D: Database> Handler<RevokeRole, D> for UserCommandService<D> {
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &RevokeRole,
    ) -> Result<UserCommandResult, DomainError> {
        let role = request.role;
        self.change(ctx, request.user_id, move |user, cid, clock| {
            user.revoke_role(role, cid, clock)
        })
        .await
    }

    fn requires_transaction(&self) -> bool {
        true
    }
}

#[async_trait]
impl<D: Database> Handler<ChangeStatus, D> for UserCommandService<D> {
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &ChangeStatus,
    ) -> Result<UserCommandResult, DomainError> {
        let status = request.status;
        self.change(ctx, request.user_id, move |user, cid, clock| {
            user.change_status(status, cid, clock)
        })
        .await
    }

    fn requires_transaction(&self) -> bool {
        true
    }
}

#[async_trait]
impl<D: Database> Handler<LockUser, D> for UserCommandService<D> {
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &LockUser,
    ) -> Result<UserCommandResult, DomainError> {
        let reason = request.reason.clone();
        self.change(ctx, request.user_id, move |user, cid, clock| {
            user.lock(&reason, cid, clock)
        })
        .await
    }

    fn requires_transaction(&self) -> bool {
        true
    }
}

#[async_trait]
impl<D: Database> Handler<UnlockUser, D> for UserCommandService<D> {
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &UnlockUser,
    ) -> Result<UserCommandResult, DomainError> {
        self.change(ctx, request.user_id, |user, cid, clock| user.unlock(cid, clock))
            .await
    }

    fn requires_transaction(&self) -> bool {
        true
    }
}

#[async_trait]
impl<D: Database> Handler<DeleteUser, D> for UserCommandService<D> {
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &DeleteUser,
    ) -> Result<UserCommandResult, DomainError> {
        let mut scope = self.unit_of_work.begin(ctx).await?;
        let outcome = catch_fault(self.delete(scope.context(), request.user_id)).await;
        let result = scope.finish(outcome).await?;
        info!(user_id = %request.user_id, "user deleted");
        Ok(result)
    }

    fn requires_transaction(&self) -> bool {
        true
    }
}

/// Handles [`Login`].
///
/// Runs outside the pipeline transaction: a failed login must still be
/// counted, and the lock that follows too many failures must be committed
/// even though the login itself fails.
pub struct LoginService<D: Database> {
    repository: AggregateRepository<D, User>,
    unit_of_work: UnitOfWork<D>,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
}

fn invalid_credentials() -> DomainError {
    DomainError::Unauthorized("invalid email or password".into())
}

impl<D: Database> LoginService<D> {
    /// Creates the service.
    #[must_use]
    pub fn new(
        repository: AggregateRepository<D, User>,
        unit_of_work: UnitOfWork<D>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            unit_of_work,
            cache,
            clock,
        }
    }

    /// Counts a failed login and locks the account once the limit is hit.
    async fn record_failure(
        &self,
        ctx: &mut RequestContext<D>,
        mut user: User,
    ) -> Result<(), DomainError> {
        let key = failed_logins_key(user.id());
        let failures = self
            .cache
            .increment(&key, 1, Some(FAILED_LOGIN_WINDOW))
            .await?;
        warn!(user_id = %user.id(), failures, "failed login attempt");
        if failures < MAX_FAILED_LOGINS {
            return Ok(());
        }

        user.lock(
            "too many failed login attempts",
            ctx.correlation_id(),
            self.clock.as_ref(),
        )?;
        let user_id = user.id();
        let repository = self.repository.clone();
        self.unit_of_work
            .with_transaction(ctx, move |ctx| {
                Box::pin(async move { repository.update(ctx, &mut user).await })
            })
            .await?;
        warn!(%user_id, failures, "account locked after repeated failed logins");
        self.forget(&key).await;
        self.forget(&user_cache_key(user_id)).await;
        Ok(())
    }

    async fn forget(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            warn!(key, error = %e, "could not clear cache entry");
        }
    }
}

impl<D: Database> Clone for LoginService<D> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            unit_of_work: self.unit_of_work.clone(),
            cache: Arc::clone(&self.cache),
            clock: Arc::clone(&self.clock),
        }
    }
}

#[async_trait]
impl<D: Database> Handler<Login, D> for LoginService<D> {
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &Login,
    ) -> Result<LoginResult, DomainError> {
        let Ok(email) = Email::parse(&request.email) else {
            return Err(invalid_credentials());
        };
        let Some(mut user) = self.repository.find_by_key("email", email.as_str()).await? else {
            return Err(invalid_credentials());
        };
        if !user.status().is_active() {
            return Err(DomainError::Unauthorized(format!(
                "account is {}",
                user.status()
            )));
        }

        if !user.verify_password(&request.password) {
            if let Err(e) = self.record_failure(ctx, user).await {
                error!(error = %e, "could not record failed login");
            }
            return Err(invalid_credentials());
        }

        user.record_login(
            &request.ip,
            &request.user_agent,
            ctx.correlation_id(),
            self.clock.as_ref(),
        );
        let repository = self.repository.clone();
        let user = self
            .unit_of_work
            .with_transaction(ctx, move |ctx| {
                Box::pin(async move {
                    repository.update(ctx, &mut user).await?;
                    Ok(user)
                })
            })
            .await?;
        self.forget(&failed_logins_key(user.id())).await;
        self.forget(&user_cache_key(user.id())).await;

        info!(user_id = %user.id(), ip = %request.ip, "user logged in");
        Ok(LoginResult {
            user_id: user.id(),
            email: user.email().to_string(),
            name: user.profile().name().to_owned(),
            roles: user.roles().to_vec(),
            logged_in_at: user.last_login_at().unwrap_or_else(|| user.updated_at()),
        })
    }
}

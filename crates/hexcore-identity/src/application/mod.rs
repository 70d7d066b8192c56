//! Application layer for the identity context.

pub mod command_handlers;
pub mod event_listener;
pub mod query_handlers;

use std::sync::Arc;

use hexcore_core::cache::Cache;
use hexcore_core::clock::Clock;
use hexcore_core::error::DomainError;
use hexcore_core::repository::AggregateRepository;
use hexcore_core::transaction::Database;
use hexcore_core::unit_of_work::UnitOfWork;
use hexcore_dispatch::DispatcherBuilder;

use self::command_handlers::{LoginService, UserCommandService};
use self::query_handlers::UserQueryService;
use crate::domain::aggregates::User;
use crate::domain::commands::{
    AssignRole, ChangePassword, ChangeStatus, DeleteUser, LockUser, Login, RegisterUser,
    RevokeRole, UnlockUser, UpdateProfile,
};
use crate::domain::queries::{GetUser, GetUserByEmail, GetUserHistory, ListUsers};

/// The identity handlers, ready to be registered on a dispatcher.
pub struct IdentityModule<D: Database> {
    commands: UserCommandService<D>,
    login: LoginService<D>,
    queries: UserQueryService<D>,
}

impl<D: Database> IdentityModule<D> {
    /// Wires the handlers over one repository and unit of work.
    #[must_use]
    pub fn new(
        repository: AggregateRepository<D, User>,
        unit_of_work: UnitOfWork<D>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            commands: UserCommandService::new(
                repository.clone(),
                unit_of_work.clone(),
                Arc::clone(&clock),
            ),
            login: LoginService::new(repository.clone(), unit_of_work, cache, clock),
            queries: UserQueryService::new(repository),
        }
    }

    /// Registers every identity command and query.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateHandler` if one of them is already registered.
    pub fn register(
        self,
        builder: DispatcherBuilder<D>,
    ) -> Result<DispatcherBuilder<D>, DomainError> {
        let Self {
            commands,
            login,
            queries,
        } = self;
        builder
            .register::<RegisterUser, _>(commands.clone())?
            .register::<UpdateProfile, _>(commands.clone())?
            .register::<ChangePassword, _>(commands.clone())?
            .register::<AssignRole, _>(commands.clone())?
            .register::<RevokeRole, _>(commands.clone())?
            .register::<ChangeStatus, _>(commands.clone())?
            .register::<LockUser, _>(commands.clone())?
            .register::<UnlockUser, _>(commands.clone())?
            .register::<DeleteUser, _>(commands)?
            .register::<Login, _>(login)?
            .register::<GetUser, _>(queries.clone())?
            .register::<GetUserByEmail, _>(queries.clone())?
            .register::<ListUsers, _>(queries.clone())?
            .register::<GetUserHistory, _>(queries)
    }
}

//! Routes for the identity bounded context.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use hexcore_core::transaction::Database;
use hexcore_identity::domain::commands::{
    AssignRole, ChangePassword, ChangeStatus, DeleteUser, LockUser, RegisterUser, RevokeRole,
    UnlockUser, UpdateProfile, UserCommandResult,
};
use hexcore_identity::domain::queries::{
    GetUser, GetUserByEmail, GetUserHistory, ListUsers, UserHistoryView, UserPage, UserView,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::dispatch;
use crate::error::ApiError;
use crate::extractors::CorrelationId;
use crate::state::AppState;

/// Body of `POST /api/v1/users`.
#[derive(Deserialize)]
pub struct RegisterUserRequest {
    /// Account email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Display name.
    pub name: String,
    /// Optional biography.
    #[serde(default)]
    pub bio: String,
}

/// Body of `PUT /api/v1/users/{id}/profile`.
#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    /// Display name.
    pub name: String,
    /// Biography.
    #[serde(default)]
    pub bio: String,
}

/// Body of `PUT /api/v1/users/{id}/password`.
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    /// The password being replaced.
    pub current_password: String,
    /// The new password.
    pub new_password: String,
}

/// Body of `POST /api/v1/users/{id}/roles`.
#[derive(Deserialize)]
pub struct AssignRoleRequest {
    /// Role name: `user`, `admin` or `moderator`.
    pub role: String,
}

/// Body of `PUT /api/v1/users/{id}/status`.
#[derive(Deserialize)]
pub struct ChangeStatusRequest {
    /// Status name.
    pub status: String,
}

/// Body of `POST /api/v1/users/{id}/lock`.
#[derive(Deserialize)]
pub struct LockUserRequest {
    /// Why the account is being locked.
    pub reason: String,
}

/// Query string of `GET /api/v1/users`.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersParams {
    /// One-based page number.
    pub page: Option<u32>,
    /// Users per page.
    pub page_size: Option<u32>,
}

/// POST /api/v1/users
#[instrument(skip_all, fields(correlation_id = %correlation.0))]
async fn register_user<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Json(body): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserCommandResult>), ApiError> {
    let command = RegisterUser {
        email: body.email,
        password: body.password,
        name: body.name,
        bio: body.bio,
    };
    let result = dispatch(&state, correlation, command).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/v1/users
#[instrument(skip_all, fields(correlation_id = %correlation.0))]
async fn list_users<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<UserPage>, ApiError> {
    let query = ListUsers {
        page: params.page.unwrap_or_default(),
        page_size: params.page_size.unwrap_or_default(),
    };
    Ok(Json(dispatch(&state, correlation, query).await?))
}

/// GET /api/v1/users/{id}
#[instrument(skip_all, fields(correlation_id = %correlation.0, user_id = %user_id))]
async fn get_user<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserView>, ApiError> {
    Ok(Json(dispatch(&state, correlation, GetUser { user_id }).await?))
}

/// GET /api/v1/users/by-email/{email}
#[instrument(skip_all, fields(correlation_id = %correlation.0))]
async fn get_user_by_email<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path(email): Path<String>,
) -> Result<Json<UserView>, ApiError> {
    Ok(Json(dispatch(&state, correlation, GetUserByEmail { email }).await?))
}

/// GET /api/v1/users/{id}/history
#[instrument(skip_all, fields(correlation_id = %correlation.0, user_id = %user_id))]
async fn get_user_history<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserHistoryView>, ApiError> {
    Ok(Json(dispatch(&state, correlation, GetUserHistory { user_id }).await?))
}

/// PUT /api/v1/users/{id}/profile
#[instrument(skip_all, fields(correlation_id = %correlation.0, user_id = %user_id))]
async fn update_profile<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserCommandResult>, ApiError> {
    let command = UpdateProfile {
        user_id,
        name: body.name,
        bio: body.bio,
    };
    Ok(Json(dispatch(&state, correlation, command).await?))
}

/// PUT /api/v1/users/{id}/password
#[instrument(skip_all, fields(correlation_id = %correlation.0, user_id = %user_id))]
async fn change_password<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path(user_id): Path<Uuid>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<UserCommandResult>, ApiError> {
    let command = ChangePassword {
        user_id,
        current_password: body.current_password,
        new_password: body.new_password,
    };
    Ok(Json(dispatch(&state, correlation, command).await?))
}

/// POST /api/v1/users/{id}/roles
#[instrument(skip_all, fields(correlation_id = %correlation.0, user_id = %user_id))]
async fn assign_role<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path(user_id): Path<Uuid>,
    Json(body): Json<AssignRoleRequest>,
) -> Result<Json<UserCommandResult>, ApiError> {
    let command = AssignRole {
        user_id,
        role: body.role.parse()?,
    };
    Ok(Json(dispatch(&state, correlation, command).await?))
}

/// DELETE /api/v1/users/{id}/roles/{role}
#[instrument(skip_all, fields(correlation_id = %correlation.0, user_id = %user_id))]
async fn revoke_role<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path((user_id, role)): Path<(Uuid, String)>,
) -> Result<Json<UserCommandResult>, ApiError> {
    let command = RevokeRole {
        user_id,
        role: role.parse()?,
    };
    Ok(Json(dispatch(&state, correlation, command).await?))
}

/// PUT /api/v1/users/{id}/status
#[instrument(skip_all, fields(correlation_id = %correlation.0, user_id = %user_id))]
async fn change_status<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path(user_id): Path<Uuid>,
    Json(body): Json<ChangeStatusRequest>,
) -> Result<Json<UserCommandResult>, ApiError> {
    let command = ChangeStatus {
        user_id,
        status: body.status.parse()?,
    };
    Ok(Json(dispatch(&state, correlation, command).await?))
}

/// POST /api/v1/users/{id}/lock
#[instrument(skip_all, fields(correlation_id = %correlation.0, user_id = %user_id))]
async fn lock_user<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path(user_id): Path<Uuid>,
    Json(body): Json<LockUserRequest>,
) -> Result<Json<UserCommandResult>, ApiError> {
    let command = LockUser {
        user_id,
        reason: body.reason,
    };
    Ok(Json(dispatch(&state, correlation, command).await?))
}

/// POST /api/v1/users/{id}/unlock
#[instrument(skip_all, fields(correlation_id = %correlation.0, user_id = %user_id))]
async fn unlock_user<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserCommandResult>, ApiError> {
    Ok(Json(dispatch(&state, correlation, UnlockUser { user_id }).await?))
}

/// DELETE /api/v1/users/{id}
#[instrument(skip_all, fields(correlation_id = %correlation.0, user_id = %user_id))]
async fn delete_user<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserCommandResult>, ApiError> {
    Ok(Json(dispatch(&state, correlation, DeleteUser { user_id }).await?))
}

/// Returns the router for the identity context.
pub fn router<D: Database>() -> Router<AppState<D>> {
    Router::new()
        .route("/api/v1/users", post(register_user::<D>).get(list_users::<D>))
        .route(
            "/api/v1/users/{id}",
            get(get_user::<D>).delete(delete_user::<D>),
        )
        .route("/api/v1/users/by-email/{email}", get(get_user_by_email::<D>))
        .route("/api/v1/users/{id}/history", get(get_user_history::<D>))
        .route("/api/v1/users/{id}/profile", put(update_profile::<D>))
        .route("/api/v1/users/{id}/password", put(change_password::<D>))
        .route("/api/v1/users/{id}/roles", post(assign_role::<D>))
        .route(
            "/api/v1/users/{id}/roles/{role}",
            axum::routing::delete(revoke_role::<D>),
        )
        .route("/api/v1/users/{id}/status", put(change_status::<D>))
        .route("/api/v1/users/{id}/lock", post(lock_user::<D>))
        .route("/api/v1/users/{id}/unlock", post(unlock_user::<D>))
}

//! Authentication routes.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use hexcore_core::transaction::Database;
use hexcore_identity::domain::commands::{Login, LoginResult};
use serde::Deserialize;
use tracing::instrument;

use super::dispatch;
use crate::error::ApiError;
use crate::extractors::{ClientIp, CorrelationId, UserAgent};
use crate::state::AppState;

/// Body of `POST /api/v1/auth/login`.
#[derive(Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// POST /api/v1/auth/login
#[instrument(skip_all, fields(correlation_id = %correlation.0, ip = %ip.0))]
async fn login<D: Database>(
    State(state): State<AppState<D>>,
    correlation: CorrelationId,
    ip: ClientIp,
    user_agent: UserAgent,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResult>, ApiError> {
    let command = Login {
        email: body.email,
        password: body.password,
        ip: ip.0,
        user_agent: user_agent.0,
    };
    let result = dispatch(&state, correlation, command).await?;
    Ok(Json(result))
}

/// Returns the authentication router.
pub fn router<D: Database>() -> Router<AppState<D>> {
    Router::new().route("/api/v1/auth/login", post(login::<D>))
}

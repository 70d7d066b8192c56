//! HTTP routes.

pub mod auth;
pub mod health;
pub mod users;

use axum::Router;
use hexcore_core::request::Request;
use hexcore_core::transaction::{Database, RequestContext};

use crate::error::ApiError;
use crate::extractors::CorrelationId;
use crate::state::AppState;

/// The full application router.
pub fn app<D: Database>(state: AppState<D>) -> Router {
    health::router::<D>()
        .merge(users::router::<D>())
        .merge(auth::router::<D>())
        .with_state(state)
}

/// Dispatches `request` under the caller's correlation id.
async fn dispatch<D: Database, R: Request>(
    state: &AppState<D>,
    correlation: CorrelationId,
    request: R,
) -> Result<R::Output, ApiError> {
    let mut ctx = RequestContext::with_correlation_id(correlation.0);
    Ok(state.dispatcher.dispatch_in(&mut ctx, &request).await?)
}

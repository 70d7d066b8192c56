//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hexcore_core::error::DomainError;
use hexcore_dispatch::config::ConfigError;
use serde::Serialize;
use thiserror::Error;

/// Startup errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The pipeline file could not be loaded.
    #[error(transparent)]
    Pipeline(#[from] ConfigError),

    /// Backend connection, migration or handler registration failed.
    #[error("startup failed: {0}")]
    Startup(#[from] DomainError),

    /// The Prometheus exporter could not be built or installed.
    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// The status code this error is reported with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::AggregateNotFound(_) | DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::ConcurrencyConflict { .. } | DomainError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DomainError::Infrastructure(_)
            | DomainError::HandlerNotFound(_)
            | DomainError::DuplicateHandler(_)
            | DomainError::InvalidTransactionState { .. }
            | DomainError::RollbackFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "request failed");
        }

        let body = ErrorBody {
            error: self.0.code(),
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use uuid::Uuid;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn test_not_found_variants_map_to_404() {
        assert_eq!(
            status_of(DomainError::AggregateNotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::NotFound("user".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_conflicts_map_to_409() {
        assert_eq!(
            status_of(DomainError::ConcurrencyConflict {
                aggregate_id: Uuid::new_v4(),
                expected: 1,
                actual: 2,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::Conflict("email taken".into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_validation_maps_to_400() {
        assert_eq!(
            status_of(DomainError::Validation("bad input".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_invariant_violation_maps_to_422() {
        assert_eq!(
            status_of(DomainError::InvariantViolation("last role".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_unauthorized_maps_to_401() {
        assert_eq!(
            status_of(DomainError::Unauthorized("nope".into())),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_timeout_maps_to_504() {
        assert_eq!(
            status_of(DomainError::Timeout(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_infrastructure_maps_to_500() {
        assert_eq!(
            status_of(DomainError::Infrastructure("db down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_handler_maps_to_500() {
        assert_eq!(
            status_of(DomainError::HandlerNotFound("GetUser")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

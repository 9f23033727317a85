//! Startup errors and the HTTP mapping of domain failures.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use postwall_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Failures that stop the server from starting or keep it from serving.
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable is missing or does not parse.
    #[error("configuration error: {0}")]
    Config(String),

    /// Could not reach PostgreSQL.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migrations failed to apply.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Could not connect to the message broker or join the consumer group.
    #[error("broker error: {0}")]
    Broker(String),

    /// A command or query was registered twice while wiring dispatchers.
    #[error("wiring error: {0}")]
    Wiring(#[from] DomainError),

    /// Binding the listener or serving failed.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable, machine-readable code such as `validation_error`.
    pub error: &'static str,
    /// The domain error rendered for humans.
    pub message: String,
}

/// A `DomainError` on its way out of a route handler.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code and error code for the wrapped failure.
    ///
    /// Client-correctable failures are 4xx; misconfiguration is 500 and
    /// logged as an alert.
    fn classify(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::AggregateNotFound(_) => (StatusCode::NOT_FOUND, "aggregate_not_found"),
            DomainError::ConcurrencyConflict { .. } => {
                (StatusCode::CONFLICT, "concurrency_conflict")
            }
            DomainError::Transport(_) => (StatusCode::SERVICE_UNAVAILABLE, "transport_error"),
            DomainError::Routing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "routing_error"),
            DomainError::Deserialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "deserialization_error")
            }
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        match &self.0 {
            DomainError::Routing(_) | DomainError::Deserialization(_) => {
                error!(alert = true, error = %self.0, code, "request failed on misconfiguration");
            }
            _ if status.is_server_error() => error!(error = %self.0, code, "request failed"),
            _ => warn!(error = %self.0, code, "request rejected"),
        }

        let body = ErrorBody {
            error: code,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn classify(err: DomainError) -> (StatusCode, &'static str) {
        ApiError(err).classify()
    }

    #[test]
    fn test_client_correctable_failures_are_4xx() {
        assert_eq!(
            classify(DomainError::Validation("message is empty".into())),
            (StatusCode::BAD_REQUEST, "validation_error")
        );
        assert_eq!(
            classify(DomainError::AggregateNotFound(Uuid::new_v4())),
            (StatusCode::NOT_FOUND, "aggregate_not_found")
        );
        assert_eq!(
            classify(DomainError::ConcurrencyConflict {
                aggregate_id: Uuid::new_v4(),
                expected: 1,
                actual: 2,
            }),
            (StatusCode::CONFLICT, "concurrency_conflict")
        );
    }

    #[test]
    fn test_transport_failure_is_503() {
        assert_eq!(
            classify(DomainError::Transport("broker closed".into())),
            (StatusCode::SERVICE_UNAVAILABLE, "transport_error")
        );
    }

    #[test]
    fn test_systemic_failures_are_500_with_distinct_codes() {
        assert_eq!(
            classify(DomainError::Routing("no handler for LikePost".into())),
            (StatusCode::INTERNAL_SERVER_ERROR, "routing_error")
        );
        assert_eq!(
            classify(DomainError::Deserialization("unknown type".into())),
            (StatusCode::INTERNAL_SERVER_ERROR, "deserialization_error")
        );
        assert_eq!(
            classify(DomainError::Infrastructure("db down".into())),
            (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
        );
    }

    #[tokio::test]
    async fn test_response_body_carries_code_and_message() {
        // Arrange
        let response = ApiError(DomainError::Validation("message is empty".into())).into_response();

        // Act
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
        assert!(json["message"].as_str().unwrap().contains("message is empty"));
    }
}

//! Route for rebuilding the read model.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use postwall_post_cmd::domain::commands::RestoreReadDb;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for POST /restore-read-db.
#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    /// Number of stored events sent to the broker again.
    pub republished: usize,
}

/// POST /restore-read-db
#[instrument(skip(state))]
async fn restore_read_db(State(state): State<AppState>) -> Result<Json<RestoreResponse>, ApiError> {
    let command = RestoreReadDb {
        correlation_id: Uuid::new_v4(),
    };

    info!(correlation_id = %command.correlation_id, "handling restore_read_db command");

    let republished = state.commands.dispatch(command).await?.len();

    Ok(Json(RestoreResponse { republished }))
}

/// Returns the router for read-model recovery.
pub fn router() -> Router<AppState> {
    Router::new().route("/restore-read-db", post(restore_read_db))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use postwall_core::messaging::EventProducer;
    use postwall_core::repository::EventRepository;
    use postwall_test_support::{
        FailingEventRepository, FixedClock, InMemoryEventRepository, InMemoryPostRepository,
        RecordingEventProducer,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_with(
        event_repository: Arc<dyn EventRepository>,
        producer: Arc<dyn EventProducer>,
    ) -> Router {
        let state = AppState::wire(
            event_repository,
            producer,
            "post-events",
            Arc::new(FixedClock::reference()),
            Arc::new(InMemoryPostRepository::new()),
        )
        .unwrap();
        router().with_state(state)
    }

    async fn post_restore(app: Router) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/restore-read-db")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_restore_with_empty_store_republishes_nothing() {
        // Arrange
        let producer = Arc::new(RecordingEventProducer::new());
        let app = app_with(Arc::new(InMemoryEventRepository::new()), producer.clone());

        // Act
        let (status, json) = post_restore(app).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["republished"], 0);
        assert!(producer.produced().is_empty());
    }

    #[tokio::test]
    async fn test_restore_returns_500_when_store_fails() {
        let app = app_with(
            Arc::new(FailingEventRepository),
            Arc::new(RecordingEventProducer::new()),
        );

        let (status, json) = post_restore(app).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "infrastructure_error");
    }
}

//! Integration tests for the health endpoint and routing fallbacks.

mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_health_returns_200_with_status_ok() {
    let (system, _) = common::TestSystem::start();

    let (status, json) = system.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    system.stop().await;
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (system, _) = common::TestSystem::start();

    let (status, _) = system.get("/api/v1/nonexistent").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    system.stop().await;
}

//! End-to-end test against PostgreSQL stores.
//!
//! Needs a live database (`DATABASE_URL`); run with `cargo test -- --ignored`.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use postwall_event_store::pg_event_repository::PgEventRepository;
use postwall_read_store::pg_comment_repository::PgCommentRepository;
use postwall_read_store::pg_post_repository::PgPostRepository;
use serde_json::{Value, json};
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_post_round_trip_through_postgres(pool: PgPool) {
    // Arrange
    let system = common::TestSystem::start_with(
        Arc::new(PgEventRepository::new(pool.clone())),
        Arc::new(PgPostRepository::new(pool.clone())),
        Arc::new(PgCommentRepository::new(pool)),
    );

    // Act
    let (created, body) = system
        .send(
            "POST",
            "/api/v1/posts",
            &json!({ "author": "alice", "message": "hi" }),
        )
        .await;
    let post_id = body["post_id"].as_str().unwrap().to_owned();
    system
        .send("PUT", &format!("/api/v1/posts/{post_id}/like"), &Value::Null)
        .await;
    system
        .send(
            "PUT",
            &format!("/api/v1/posts/{post_id}/comments"),
            &json!({ "comment": "nice", "username": "bob" }),
        )
        .await;
    system
        .send("POST", "/api/v1/restore-read-db", &Value::Null)
        .await;
    system.settle().await;
    let (status, found) = system
        .get(&format!("/api/v1/post-lookup/by-id/{post_id}"))
        .await;

    // Assert
    assert_eq!(created, StatusCode::CREATED);
    assert_eq!(status, StatusCode::OK);
    let post = &found["posts"][0];
    assert_eq!(post["likes"], 1);
    assert_eq!(post["version"], 2);
    assert_eq!(post["comments"][0]["username"], "bob");
    system.stop().await;
}

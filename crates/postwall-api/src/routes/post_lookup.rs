//! Routes for read-model lookups.
//!
//! Every lookup answers 204 No Content when nothing matches.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use postwall_post_query::domain::entities::PostEntity;
use postwall_post_query::domain::queries::{
    FindAllPosts, FindPostById, FindPostsByAuthor, FindPostsWithComments, FindPostsWithLikes,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for a non-empty lookup.
#[derive(Debug, Serialize)]
pub struct PostLookupResponse {
    /// Matching posts with their comments.
    pub posts: Vec<PostEntity>,
    /// Summary of the result.
    pub message: String,
}

fn lookup_response(posts: Vec<PostEntity>) -> Response {
    if posts.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    let count = posts.len();
    let message = if count == 1 {
        "Successfully returned 1 post".to_owned()
    } else {
        format!("Successfully returned {count} posts")
    };
    Json(PostLookupResponse { posts, message }).into_response()
}

/// GET /post-lookup
#[instrument(skip(state))]
async fn all_posts(State(state): State<AppState>) -> Result<Response, ApiError> {
    let posts = state.queries.dispatch(FindAllPosts).await?;
    Ok(lookup_response(posts))
}

/// GET /post-lookup/by-id/{post_id}
#[instrument(skip(state))]
async fn post_by_id(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let posts = state.queries.dispatch(FindPostById { post_id }).await?;
    Ok(lookup_response(posts))
}

/// GET /post-lookup/by-author/{author}
#[instrument(skip(state))]
async fn posts_by_author(
    State(state): State<AppState>,
    Path(author): Path<String>,
) -> Result<Response, ApiError> {
    let posts = state.queries.dispatch(FindPostsByAuthor { author }).await?;
    Ok(lookup_response(posts))
}

/// GET /post-lookup/with-comments
#[instrument(skip(state))]
async fn posts_with_comments(State(state): State<AppState>) -> Result<Response, ApiError> {
    let posts = state.queries.dispatch(FindPostsWithComments).await?;
    Ok(lookup_response(posts))
}

/// GET /post-lookup/with-likes/{number_of_likes}
#[instrument(skip(state))]
async fn posts_with_likes(
    State(state): State<AppState>,
    Path(number_of_likes): Path<i32>,
) -> Result<Response, ApiError> {
    let posts = state
        .queries
        .dispatch(FindPostsWithLikes { number_of_likes })
        .await?;
    Ok(lookup_response(posts))
}

/// Returns the router for post lookups.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post-lookup", get(all_posts))
        .route("/post-lookup/by-id/{post_id}", get(post_by_id))
        .route("/post-lookup/by-author/{author}", get(posts_by_author))
        .route("/post-lookup/with-comments", get(posts_with_comments))
        .route("/post-lookup/with-likes/{number_of_likes}", get(posts_with_likes))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use postwall_post_query::domain::repositories::PostRepository;
    use postwall_test_support::{
        FixedClock, InMemoryEventRepository, InMemoryPostRepository, RecordingEventProducer,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn make_post(author: &str, likes: i32) -> PostEntity {
        PostEntity {
            post_id: Uuid::new_v4(),
            author: author.to_owned(),
            date_posted: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            message: "hi".to_owned(),
            likes,
            version: 0,
            comments: Vec::new(),
        }
    }

    fn app_with(posts: InMemoryPostRepository) -> Router {
        let state = AppState::wire(
            Arc::new(InMemoryEventRepository::new()),
            Arc::new(RecordingEventProducer::new()),
            "post-events",
            Arc::new(FixedClock::reference()),
            Arc::new(posts),
        )
        .unwrap();
        router().with_state(state)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_by_id_returns_204_when_absent() {
        let app = app_with(InMemoryPostRepository::new());

        let (status, json) = get(app, &format!("/post-lookup/by-id/{}", Uuid::new_v4())).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(json.is_null());
    }

    #[tokio::test]
    async fn test_by_id_returns_the_post() {
        // Arrange
        let posts = InMemoryPostRepository::new();
        let post = make_post("alice", 0);
        posts.create(&post).await.unwrap();
        let app = app_with(posts);

        // Act
        let (status, json) = get(app, &format!("/post-lookup/by-id/{}", post.post_id)).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["posts"][0]["post_id"], post.post_id.to_string());
        assert_eq!(json["message"], "Successfully returned 1 post");
    }

    #[tokio::test]
    async fn test_by_author_matches_substring() {
        // Arrange
        let posts = InMemoryPostRepository::new();
        posts.create(&make_post("alice", 0)).await.unwrap();
        posts.create(&make_post("bob", 0)).await.unwrap();
        let app = app_with(posts);

        // Act
        let (status, json) = get(app, "/post-lookup/by-author/lic").await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        let found = json["posts"].as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["author"], "alice");
    }

    #[tokio::test]
    async fn test_with_likes_filters_by_threshold() {
        // Arrange
        let posts = InMemoryPostRepository::new();
        posts.create(&make_post("alice", 3)).await.unwrap();
        posts.create(&make_post("bob", 1)).await.unwrap();
        let app = app_with(posts);

        // Act
        let (status, json) = get(app, "/post-lookup/with-likes/2").await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["posts"].as_array().unwrap().len(), 1);
        assert_eq!(json["posts"][0]["likes"], 3);
    }

    #[tokio::test]
    async fn test_with_negative_likes_returns_400() {
        let app = app_with(InMemoryPostRepository::new());

        let (status, json) = get(app, "/post-lookup/with-likes/-1").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_with_comments_returns_204_when_no_post_has_comments() {
        let posts = InMemoryPostRepository::new();
        posts.create(&make_post("alice", 0)).await.unwrap();
        let app = app_with(posts);

        let (status, _) = get(app, "/post-lookup/with-comments").await;

        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_all_posts_lists_everything() {
        let posts = InMemoryPostRepository::new();
        posts.create(&make_post("alice", 0)).await.unwrap();
        posts.create(&make_post("bob", 0)).await.unwrap();
        let app = app_with(posts);

        let (status, json) = get(app, "/post-lookup").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Successfully returned 2 posts");
    }
}

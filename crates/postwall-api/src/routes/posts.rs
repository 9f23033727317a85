//! Routes for post commands.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post, put};
use axum::{Json, Router};
use postwall_core::event::DomainEvent;
use postwall_core::repository::StoredEvent;
use postwall_post_cmd::domain::commands;
use postwall_post_common::events::{PostEvent, PostEventKind};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /posts.
#[derive(Debug, Deserialize)]
pub struct NewPostRequest {
    /// Who is posting.
    pub author: String,
    /// The post's text.
    pub message: String,
}

/// Request body for PUT /posts/{post_id}/message.
#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    /// The new text.
    pub message: String,
}

/// Request body for adding or editing a comment.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    /// The comment text.
    pub comment: String,
    /// Who is commenting.
    pub username: String,
}

/// Request body for deletions that must be made by the owner.
#[derive(Debug, Deserialize)]
pub struct OwnerRequest {
    /// Who is deleting.
    pub username: String,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

/// Response body for POST /posts.
#[derive(Debug, Serialize)]
pub struct NewPostResponse {
    /// Id assigned to the new post.
    pub post_id: Uuid,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

/// Response body for PUT /posts/{post_id}/comments.
#[derive(Debug, Serialize)]
pub struct AddCommentResponse {
    /// Id assigned to the new comment.
    pub comment_id: Option<Uuid>,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

fn event_ids(stored_events: &[StoredEvent]) -> Vec<Uuid> {
    stored_events.iter().map(|e| e.event_id).collect()
}

/// POST /posts
#[instrument(skip(state, request), fields(author = %request.author))]
async fn new_post(
    State(state): State<AppState>,
    Json(request): Json<NewPostRequest>,
) -> Result<(StatusCode, Json<NewPostResponse>), ApiError> {
    let command = commands::NewPost {
        correlation_id: Uuid::new_v4(),
        post_id: Uuid::new_v4(),
        author: request.author,
        message: request.message,
    };
    let post_id = command.post_id;

    info!(correlation_id = %command.correlation_id, %post_id, "handling new_post command");

    let stored_events = state.commands.dispatch(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(NewPostResponse {
            post_id,
            event_ids: event_ids(&stored_events),
        }),
    ))
}

/// PUT /posts/{post_id}/message
#[instrument(skip(state, request))]
async fn edit_message(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(request): Json<EditMessageRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::EditMessage {
        correlation_id: Uuid::new_v4(),
        post_id,
        message: request.message,
    };

    info!(correlation_id = %command.correlation_id, "handling edit_message command");

    let stored_events = state.commands.dispatch(command).await?;

    Ok(Json(CommandResponse {
        event_ids: event_ids(&stored_events),
    }))
}

/// PUT /posts/{post_id}/like
#[instrument(skip(state))]
async fn like_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::LikePost {
        correlation_id: Uuid::new_v4(),
        post_id,
    };

    info!(correlation_id = %command.correlation_id, "handling like_post command");

    let stored_events = state.commands.dispatch(command).await?;

    Ok(Json(CommandResponse {
        event_ids: event_ids(&stored_events),
    }))
}

/// PUT /posts/{post_id}/comments
#[instrument(skip(state, request), fields(username = %request.username))]
async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<AddCommentResponse>, ApiError> {
    let command = commands::AddComment {
        correlation_id: Uuid::new_v4(),
        post_id,
        comment: request.comment,
        username: request.username,
    };

    info!(correlation_id = %command.correlation_id, "handling add_comment command");

    let stored_events = state.commands.dispatch(command).await?;

    let comment_id = stored_events
        .iter()
        .filter_map(|stored| PostEvent::from_stored(stored).ok())
        .find_map(|event| match event.kind {
            PostEventKind::CommentAdded(added) => Some(added.comment_id),
            _ => None,
        });

    Ok(Json(AddCommentResponse {
        comment_id,
        event_ids: event_ids(&stored_events),
    }))
}

/// PUT /posts/{post_id}/comments/{comment_id}
#[instrument(skip(state, request), fields(username = %request.username))]
async fn edit_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::EditComment {
        correlation_id: Uuid::new_v4(),
        post_id,
        comment_id,
        comment: request.comment,
        username: request.username,
    };

    info!(correlation_id = %command.correlation_id, "handling edit_comment command");

    let stored_events = state.commands.dispatch(command).await?;

    Ok(Json(CommandResponse {
        event_ids: event_ids(&stored_events),
    }))
}

/// DELETE /posts/{post_id}/comments/{comment_id}
#[instrument(skip(state, request), fields(username = %request.username))]
async fn remove_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<OwnerRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::RemoveComment {
        correlation_id: Uuid::new_v4(),
        post_id,
        comment_id,
        username: request.username,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_comment command");

    let stored_events = state.commands.dispatch(command).await?;

    Ok(Json(CommandResponse {
        event_ids: event_ids(&stored_events),
    }))
}

/// DELETE /posts/{post_id}
#[instrument(skip(state, request), fields(username = %request.username))]
async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(request): Json<OwnerRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::DeletePost {
        correlation_id: Uuid::new_v4(),
        post_id,
        username: request.username,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_post command");

    let stored_events = state.commands.dispatch(command).await?;

    Ok(Json(CommandResponse {
        event_ids: event_ids(&stored_events),
    }))
}

/// Returns the router for post commands.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(new_post))
        .route("/posts/{post_id}", delete(delete_post))
        .route("/posts/{post_id}/message", put(edit_message))
        .route("/posts/{post_id}/like", put(like_post))
        .route("/posts/{post_id}/comments", put(add_comment))
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            put(edit_comment).delete(remove_comment),
        )
}

//! Projects post events into the read model.
//!
//! Each row remembers the version of the last event applied to it. An event
//! is applied only when it is the direct successor of that version, so a
//! redelivered event (version at or below the row's) is skipped and a
//! counter such as `likes` is never bumped twice. An event that arrives ahead
//! of a missing predecessor is skipped too; republishing the stream fills the
//! gap.
//!
//! Removal leaves a tombstone in the read model, so replaying a removed
//! post's history never brings the row back.

use std::sync::Arc;

use postwall_core::error::DomainError;
use postwall_core::event::DomainEvent;
use postwall_core::repository::StoredEvent;
use postwall_post_common::events::{PostEvent, PostEventKind};
use tracing::{debug, instrument, warn};

use crate::domain::entities::{CommentEntity, PostEntity};
use crate::domain::repositories::{CommentRepository, PostRepository};

/// Outcome of projecting one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// The read model changed.
    Applied,
    /// The event had already been applied.
    Duplicate,
    /// The event's predecessor has not been applied yet.
    OutOfOrder,
    /// The post no longer exists in the read model.
    MissingPost,
}

/// Applies post events to the post and comment repositories.
#[derive(Clone)]
pub struct PostProjector {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
}

impl std::fmt::Debug for PostProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProjector").finish_non_exhaustive()
    }
}

impl PostProjector {
    /// Creates a projector writing to the given repositories.
    #[must_use]
    pub fn new(posts: Arc<dyn PostRepository>, comments: Arc<dyn CommentRepository>) -> Self {
        Self { posts, comments }
    }

    /// Decodes a stored record and projects it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` if the record is not a post
    /// event, or a repository error.
    pub async fn handle(&self, stored: &StoredEvent) -> Result<Projection, DomainError> {
        let event = PostEvent::from_stored(stored)?;
        self.project(&event).await
    }

    /// Applies one event to the read model.
    ///
    /// # Errors
    ///
    /// Returns the repository's error; the event can be retried.
    #[instrument(skip(self, event), fields(
        post_id = %event.metadata.aggregate_id,
        version = event.metadata.version,
        event_type = event.event_type(),
    ))]
    pub async fn project(&self, event: &PostEvent) -> Result<Projection, DomainError> {
        let meta = &event.metadata;

        if let PostEventKind::PostCreated(payload) = &event.kind {
            let created = self
                .posts
                .create(&PostEntity {
                    post_id: meta.aggregate_id,
                    author: payload.author.clone(),
                    date_posted: payload.date_posted,
                    message: payload.message.clone(),
                    likes: 0,
                    version: meta.version,
                    comments: Vec::new(),
                })
                .await?;
            return Ok(if created {
                Projection::Applied
            } else {
                Projection::Duplicate
            });
        }

        let Some(mut post) = self.posts.get_by_id(meta.aggregate_id).await? else {
            debug!("post not in read model; skipping");
            return Ok(Projection::MissingPost);
        };
        if meta.version <= post.version {
            debug!(row_version = post.version, "already projected");
            return Ok(Projection::Duplicate);
        }
        if meta.version != post.version + 1 {
            warn!(row_version = post.version, "event arrived ahead of its predecessor");
            return Ok(Projection::OutOfOrder);
        }

        match &event.kind {
            PostEventKind::PostCreated(_) => return Ok(Projection::Duplicate),
            PostEventKind::MessageUpdated(payload) => {
                post.message.clone_from(&payload.message);
            }
            PostEventKind::PostLiked(_) => {
                post.likes = post.likes.saturating_add(1);
            }
            PostEventKind::CommentAdded(payload) => {
                self.comments
                    .create(&CommentEntity {
                        comment_id: payload.comment_id,
                        post_id: meta.aggregate_id,
                        username: payload.username.clone(),
                        comment_date: payload.comment_date,
                        comment: payload.comment.clone(),
                        edited: false,
                    })
                    .await?;
            }
            PostEventKind::CommentUpdated(payload) => {
                if let Some(mut comment) = self.comments.get_by_id(payload.comment_id).await? {
                    comment.comment.clone_from(&payload.comment);
                    comment.comment_date = payload.edit_date;
                    comment.edited = true;
                    self.comments.update(&comment).await?;
                }
            }
            PostEventKind::CommentRemoved(payload) => {
                self.comments.delete(payload.comment_id).await?;
            }
            PostEventKind::PostRemoved(_) => {
                self.comments.delete_by_post(meta.aggregate_id).await?;
                self.posts.remove(meta.aggregate_id, meta.version).await?;
                return Ok(Projection::Applied);
            }
        }

        post.version = meta.version;
        self.posts.update(&post).await?;
        Ok(Projection::Applied)
    }
}

//! Read-model entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A post as the read side sees it, with its comments attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEntity {
    /// The post's aggregate id.
    pub post_id: Uuid,
    /// Who wrote the post.
    pub author: String,
    /// When the post was created.
    pub date_posted: DateTime<Utc>,
    /// Current text.
    pub message: String,
    /// Number of likes.
    pub likes: i32,
    /// Version of the last event projected into this row.
    pub version: i64,
    /// Comments on the post, oldest first.
    pub comments: Vec<CommentEntity>,
}

/// A comment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntity {
    /// Comment identifier.
    pub comment_id: Uuid,
    /// Post the comment belongs to.
    pub post_id: Uuid,
    /// Who wrote the comment.
    pub username: String,
    /// When the comment was written or last edited.
    pub comment_date: DateTime<Utc>,
    /// Current text.
    pub comment: String,
    /// Whether the comment has been edited.
    pub edited: bool,
}

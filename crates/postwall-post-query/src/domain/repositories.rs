//! Read-model repository ports.
//!
//! Inserts are idempotent: creating a row whose id already exists is a no-op,
//! which lets projections survive redelivered events. A removed post leaves a
//! tombstone behind, so creating it again is a no-op as well.

use async_trait::async_trait;
use postwall_core::error::DomainError;
use uuid::Uuid;

use super::entities::{CommentEntity, PostEntity};

/// Storage for post rows. Every read returns posts with their comments.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Inserts a post row. Returns `false` if the row already existed or the
    /// post was removed, in which case nothing is written. The entity's
    /// comments are ignored.
    async fn create(&self, post: &PostEntity) -> Result<bool, DomainError>;

    /// Fetches one post.
    async fn get_by_id(&self, post_id: Uuid) -> Result<Option<PostEntity>, DomainError>;

    /// Overwrites the scalar columns of an existing post row.
    async fn update(&self, post: &PostEntity) -> Result<(), DomainError>;

    /// Deletes a post row with its comments and records a tombstone at
    /// `version`. Removing a missing row still records the tombstone.
    async fn remove(&self, post_id: Uuid, version: i64) -> Result<(), DomainError>;

    /// Lists every post, oldest first.
    async fn list_all(&self) -> Result<Vec<PostEntity>, DomainError>;

    /// Lists posts whose author contains `author`.
    async fn list_by_author(&self, author: &str) -> Result<Vec<PostEntity>, DomainError>;

    /// Lists posts with at least one comment.
    async fn list_with_comments(&self) -> Result<Vec<PostEntity>, DomainError>;

    /// Lists posts with at least `number_of_likes` likes.
    async fn list_with_likes(&self, number_of_likes: i32) -> Result<Vec<PostEntity>, DomainError>;
}

/// Storage for comment rows.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Inserts a comment row. Returns `false` if the row already existed.
    async fn create(&self, comment: &CommentEntity) -> Result<bool, DomainError>;

    /// Fetches one comment.
    async fn get_by_id(&self, comment_id: Uuid) -> Result<Option<CommentEntity>, DomainError>;

    /// Overwrites an existing comment row.
    async fn update(&self, comment: &CommentEntity) -> Result<(), DomainError>;

    /// Deletes a comment row. Deleting a missing row is not an error.
    async fn delete(&self, comment_id: Uuid) -> Result<(), DomainError>;

    /// Deletes every comment of a post.
    async fn delete_by_post(&self, post_id: Uuid) -> Result<(), DomainError>;
}

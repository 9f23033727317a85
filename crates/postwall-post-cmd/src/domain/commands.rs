//! Commands accepted by the post command side.

use postwall_core::command::Command;
use uuid::Uuid;

/// Command to create a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Id of the new post.
    pub post_id: Uuid,
    /// Who is posting.
    pub author: String,
    /// The post's text.
    pub message: String,
}

/// Command to replace a post's text.
#[derive(Debug, Clone)]
pub struct EditMessage {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The post to edit.
    pub post_id: Uuid,
    /// The new text.
    pub message: String,
}

/// Command to like a post.
#[derive(Debug, Clone)]
pub struct LikePost {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The post to like.
    pub post_id: Uuid,
}

/// Command to comment on a post.
#[derive(Debug, Clone)]
pub struct AddComment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The post to comment on.
    pub post_id: Uuid,
    /// The comment text.
    pub comment: String,
    /// Who is commenting.
    pub username: String,
}

/// Command to edit one's own comment.
#[derive(Debug, Clone)]
pub struct EditComment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The post the comment is on.
    pub post_id: Uuid,
    /// The comment to edit.
    pub comment_id: Uuid,
    /// The new text.
    pub comment: String,
    /// Who is editing; must own the comment.
    pub username: String,
}

/// Command to remove one's own comment.
#[derive(Debug, Clone)]
pub struct RemoveComment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The post the comment is on.
    pub post_id: Uuid,
    /// The comment to remove.
    pub comment_id: Uuid,
    /// Who is removing; must own the comment.
    pub username: String,
}

/// Command to delete a post.
#[derive(Debug, Clone)]
pub struct DeletePost {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The post to delete.
    pub post_id: Uuid,
    /// Who is deleting; must be the author.
    pub username: String,
}

/// Command to republish the whole event history so the read model can be
/// rebuilt.
#[derive(Debug, Clone)]
pub struct RestoreReadDb {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

macro_rules! impl_command {
    ($($command:ident),+ $(,)?) => {
        $(
            impl Command for $command {
                fn command_type(&self) -> &'static str {
                    stringify!($command)
                }

                fn correlation_id(&self) -> Uuid {
                    self.correlation_id
                }
            }
        )+
    };
}

impl_command!(
    NewPost,
    EditMessage,
    LikePost,
    AddComment,
    EditComment,
    RemoveComment,
    DeletePost,
    RestoreReadDb,
);

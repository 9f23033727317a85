//! Command handlers for posts.
//!
//! Each handler loads the post, runs one aggregate method, and saves the
//! raised events. A concurrency conflict on save is retried once against a
//! freshly loaded post before it is returned to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use postwall_core::clock::Clock;
use postwall_core::command::{Command, CommandDispatcherBuilder, CommandHandler};
use postwall_core::error::DomainError;
use postwall_core::handler::EventSourcingHandler;
use postwall_core::repository::StoredEvent;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::Post;
use crate::domain::commands::{
    AddComment, DeletePost, EditComment, EditMessage, LikePost, NewPost, RemoveComment,
    RestoreReadDb,
};

const CONFLICT_RETRIES: u32 = 1;

/// Whether the command needs an existing post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    New,
    Existing,
}

/// Handles every post command.
#[derive(Clone)]
pub struct PostCommandHandler {
    posts: EventSourcingHandler<Post>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PostCommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostCommandHandler")
            .field("posts", &self.posts)
            .finish_non_exhaustive()
    }
}

impl PostCommandHandler {
    /// Creates a handler that stamps events with `clock`.
    #[must_use]
    pub fn new(posts: EventSourcingHandler<Post>, clock: Arc<dyn Clock>) -> Self {
        Self { posts, clock }
    }

    /// Loads the post, applies `action`, and saves. Retries once on a
    /// concurrency conflict.
    async fn execute<F>(
        &self,
        post_id: Uuid,
        target: Target,
        action: F,
    ) -> Result<Vec<StoredEvent>, DomainError>
    where
        F: Fn(&mut Post, &dyn Clock) -> Result<(), DomainError> + Send + Sync,
    {
        let mut retries = 0;
        loop {
            let mut post = match target {
                Target::New => self.posts.get_by_id(post_id).await?,
                Target::Existing => self.posts.get_existing(post_id).await?,
            };
            action(&mut post, self.clock.as_ref())?;

            match self.posts.save(&mut post).await {
                Err(DomainError::ConcurrencyConflict {
                    expected, actual, ..
                }) if retries < CONFLICT_RETRIES => {
                    retries += 1;
                    warn!(%post_id, expected, actual, "concurrency conflict; reloading and retrying");
                }
                outcome => return outcome,
            }
        }
    }
}

fn log_command<C: Command>(command: &C) {
    info!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        "handling command"
    );
}

#[async_trait]
impl CommandHandler<NewPost> for PostCommandHandler {
    #[instrument(skip(self, command), fields(post_id = %command.post_id))]
    async fn handle(&self, command: NewPost) -> Result<Vec<StoredEvent>, DomainError> {
        log_command(&command);
        self.execute(command.post_id, Target::New, |post, clock| {
            post.create(&command.author, &command.message, command.correlation_id, clock)
        })
        .await
    }
}

#[async_trait]
impl CommandHandler<EditMessage> for PostCommandHandler {
    #[instrument(skip(self, command), fields(post_id = %command.post_id))]
    async fn handle(&self, command: EditMessage) -> Result<Vec<StoredEvent>, DomainError> {
        log_command(&command);
        self.execute(command.post_id, Target::Existing, |post, clock| {
            post.edit_message(&command.message, command.correlation_id, clock)
        })
        .await
    }
}

#[async_trait]
impl CommandHandler<LikePost> for PostCommandHandler {
    #[instrument(skip(self, command), fields(post_id = %command.post_id))]
    async fn handle(&self, command: LikePost) -> Result<Vec<StoredEvent>, DomainError> {
        log_command(&command);
        self.execute(command.post_id, Target::Existing, |post, clock| {
            post.like(command.correlation_id, clock)
        })
        .await
    }
}

#[async_trait]
impl CommandHandler<AddComment> for PostCommandHandler {
    #[instrument(skip(self, command), fields(post_id = %command.post_id))]
    async fn handle(&self, command: AddComment) -> Result<Vec<StoredEvent>, DomainError> {
        log_command(&command);
        let comment_id = Uuid::new_v4();
        self.execute(command.post_id, Target::Existing, |post, clock| {
            post.add_comment(
                comment_id,
                &command.comment,
                &command.username,
                command.correlation_id,
                clock,
            )
        })
        .await
    }
}

#[async_trait]
impl CommandHandler<EditComment> for PostCommandHandler {
    #[instrument(skip(self, command), fields(post_id = %command.post_id, comment_id = %command.comment_id))]
    async fn handle(&self, command: EditComment) -> Result<Vec<StoredEvent>, DomainError> {
        log_command(&command);
        self.execute(command.post_id, Target::Existing, |post, clock| {
            post.edit_comment(
                command.comment_id,
                &command.comment,
                &command.username,
                command.correlation_id,
                clock,
            )
        })
        .await
    }
}

#[async_trait]
impl CommandHandler<RemoveComment> for PostCommandHandler {
    #[instrument(skip(self, command), fields(post_id = %command.post_id, comment_id = %command.comment_id))]
    async fn handle(&self, command: RemoveComment) -> Result<Vec<StoredEvent>, DomainError> {
        log_command(&command);
        self.execute(command.post_id, Target::Existing, |post, clock| {
            post.remove_comment(
                command.comment_id,
                &command.username,
                command.correlation_id,
                clock,
            )
        })
        .await
    }
}

#[async_trait]
impl CommandHandler<DeletePost> for PostCommandHandler {
    #[instrument(skip(self, command), fields(post_id = %command.post_id))]
    async fn handle(&self, command: DeletePost) -> Result<Vec<StoredEvent>, DomainError> {
        log_command(&command);
        self.execute(command.post_id, Target::Existing, |post, clock| {
            post.delete(&command.username, command.correlation_id, clock)
        })
        .await
    }
}

#[async_trait]
impl CommandHandler<RestoreReadDb> for PostCommandHandler {
    #[instrument(skip(self, command))]
    async fn handle(&self, command: RestoreReadDb) -> Result<Vec<StoredEvent>, DomainError> {
        log_command(&command);
        self.posts.republish().await
    }
}

/// Registers `handler` for every post command.
///
/// # Errors
///
/// Returns `DomainError::Routing` if any post command already has a handler.
pub fn register_post_command_handlers(
    builder: &mut CommandDispatcherBuilder,
    handler: &Arc<PostCommandHandler>,
) -> Result<(), DomainError> {
    builder
        .register::<NewPost, _>(Arc::clone(handler))?
        .register::<EditMessage, _>(Arc::clone(handler))?
        .register::<LikePost, _>(Arc::clone(handler))?
        .register::<AddComment, _>(Arc::clone(handler))?
        .register::<EditComment, _>(Arc::clone(handler))?
        .register::<RemoveComment, _>(Arc::clone(handler))?
        .register::<DeletePost, _>(Arc::clone(handler))?
        .register::<RestoreReadDb, _>(Arc::clone(handler))?;
    Ok(())
}

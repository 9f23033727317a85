//! The post aggregate.

use std::collections::HashMap;

use postwall_core::aggregate::AggregateRoot;
use postwall_core::clock::Clock;
use postwall_core::error::DomainError;
use postwall_core::event::EventMetadata;
use postwall_core::repository::NO_VERSION;
use postwall_post_common::POST_AGGREGATE_TYPE;
use postwall_post_common::events::{
    CommentAdded, CommentRemoved, CommentUpdated, MessageUpdated, PostCreated, PostEvent,
    PostEventKind, PostLiked, PostRemoved,
};
use uuid::Uuid;

/// Lifecycle of a post. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    /// No history yet.
    NotCreated,
    /// Accepts edits, likes and comments.
    Active,
    /// Deleted by its author.
    Removed,
}

/// A comment as the write side tracks it: enough to check ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostComment {
    /// Current text.
    pub comment: String,
    /// Who wrote it.
    pub username: String,
}

/// The aggregate root for a post and its comments.
#[derive(Debug)]
pub struct Post {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Version of the last persisted event applied.
    pub(crate) version: i64,
    pub(crate) status: PostStatus,
    pub(crate) author: String,
    pub(crate) message: String,
    pub(crate) likes: u32,
    pub(crate) comments: HashMap<Uuid, PostComment>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<PostEvent>,
}

fn same_user(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

impl Post {
    /// Returns the lifecycle state.
    #[must_use]
    pub fn status(&self) -> PostStatus {
        self.status
    }

    /// Returns the author.
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Returns the current text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the number of likes.
    #[must_use]
    pub fn likes(&self) -> u32 {
        self.likes
    }

    /// Returns the live comments by id.
    #[must_use]
    pub fn comments(&self) -> &HashMap<Uuid, PostComment> {
        &self.comments
    }

    fn ensure_active(&self, action: &str) -> Result<(), DomainError> {
        match self.status {
            PostStatus::Active => Ok(()),
            PostStatus::NotCreated => Err(DomainError::AggregateNotFound(self.id)),
            PostStatus::Removed => Err(DomainError::Validation(format!(
                "cannot {action} on removed post {}",
                self.id
            ))),
        }
    }

    fn ensure_comment_owner(
        &self,
        comment_id: Uuid,
        username: &str,
        action: &str,
    ) -> Result<(), DomainError> {
        let Some(existing) = self.comments.get(&comment_id) else {
            return Err(DomainError::Validation(format!(
                "comment {comment_id} does not exist on post {}",
                self.id
            )));
        };
        if !same_user(&existing.username, username) {
            return Err(DomainError::Validation(format!(
                "only the comment's author may {action} it"
            )));
        }
        Ok(())
    }

    fn raise_event(&mut self, kind: PostEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        let event = PostEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.type_name().to_owned(),
                aggregate_id: self.id,
                version: self.next_version(),
                correlation_id,
                causation_id: correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };
        self.raise(event);
    }

    /// Creates the post, producing a `PostCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the post already exists or the
    /// author or message is blank.
    pub fn create(
        &mut self,
        author: &str,
        message: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status != PostStatus::NotCreated {
            return Err(DomainError::Validation(format!(
                "post {} already exists",
                self.id
            )));
        }
        require_text("author", author)?;
        require_text("message", message)?;

        self.raise_event(
            PostEventKind::PostCreated(PostCreated {
                author: author.to_owned(),
                message: message.to_owned(),
                date_posted: clock.now(),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Replaces the post's text, producing a `MessageUpdated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the post is removed or the
    /// message is blank.
    pub fn edit_message(
        &mut self,
        message: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active("edit the message")?;
        require_text("message", message)?;

        self.raise_event(
            PostEventKind::MessageUpdated(MessageUpdated {
                message: message.to_owned(),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Likes the post, producing a `PostLiked` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the post is removed.
    pub fn like(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_active("like")?;

        self.raise_event(PostEventKind::PostLiked(PostLiked {}), correlation_id, clock);
        Ok(())
    }

    /// Adds a comment under the given id, producing a `CommentAdded` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the post is removed, the comment
    /// or username is blank, or the id is already taken.
    pub fn add_comment(
        &mut self,
        comment_id: Uuid,
        comment: &str,
        username: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active("add a comment")?;
        require_text("comment", comment)?;
        require_text("username", username)?;
        if self.comments.contains_key(&comment_id) {
            return Err(DomainError::Validation(format!(
                "comment {comment_id} already exists"
            )));
        }

        self.raise_event(
            PostEventKind::CommentAdded(CommentAdded {
                comment_id,
                comment: comment.to_owned(),
                username: username.to_owned(),
                comment_date: clock.now(),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Replaces a comment's text, producing a `CommentUpdated` event. Only
    /// the comment's author may edit it; names compare case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the post is removed, the comment
    /// is unknown or owned by someone else, or the new text is blank.
    pub fn edit_comment(
        &mut self,
        comment_id: Uuid,
        comment: &str,
        username: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active("edit a comment")?;
        self.ensure_comment_owner(comment_id, username, "edit")?;
        require_text("comment", comment)?;

        self.raise_event(
            PostEventKind::CommentUpdated(CommentUpdated {
                comment_id,
                comment: comment.to_owned(),
                username: username.to_owned(),
                edit_date: clock.now(),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Removes a comment, producing a `CommentRemoved` event. Only the
    /// comment's author may remove it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the post is removed or the
    /// comment is unknown or owned by someone else.
    pub fn remove_comment(
        &mut self,
        comment_id: Uuid,
        username: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active("remove a comment")?;
        self.ensure_comment_owner(comment_id, username, "remove")?;

        self.raise_event(
            PostEventKind::CommentRemoved(CommentRemoved { comment_id }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Deletes the post, producing a `PostRemoved` event. Only the author
    /// may delete it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the post is already removed or
    /// `username` is not the author.
    pub fn delete(
        &mut self,
        username: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active("delete")?;
        if !same_user(&self.author, username) {
            return Err(DomainError::Validation(
                "only the post's author may delete it".to_owned(),
            ));
        }

        self.raise_event(PostEventKind::PostRemoved(PostRemoved {}), correlation_id, clock);
        Ok(())
    }
}

impl AggregateRoot for Post {
    type Event = PostEvent;

    fn empty(id: Uuid) -> Self {
        Self {
            id,
            version: NO_VERSION,
            status: PostStatus::NotCreated,
            author: String::new(),
            message: String::new(),
            likes: 0,
            comments: HashMap::new(),
            uncommitted_events: Vec::new(),
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn aggregate_type(&self) -> &'static str {
        POST_AGGREGATE_TYPE
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            PostEventKind::PostCreated(payload) => {
                self.status = PostStatus::Active;
                self.author.clone_from(&payload.author);
                self.message.clone_from(&payload.message);
                self.likes = 0;
            }
            PostEventKind::MessageUpdated(payload) => {
                self.message.clone_from(&payload.message);
            }
            PostEventKind::PostLiked(_) => {
                self.likes = self.likes.saturating_add(1);
            }
            PostEventKind::CommentAdded(payload) => {
                self.comments.insert(
                    payload.comment_id,
                    PostComment {
                        comment: payload.comment.clone(),
                        username: payload.username.clone(),
                    },
                );
            }
            PostEventKind::CommentUpdated(payload) => {
                self.comments.insert(
                    payload.comment_id,
                    PostComment {
                        comment: payload.comment.clone(),
                        username: payload.username.clone(),
                    },
                );
            }
            PostEventKind::CommentRemoved(payload) => {
                self.comments.remove(&payload.comment_id);
            }
            PostEventKind::PostRemoved(_) => {
                self.status = PostStatus::Removed;
            }
        }
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn push_uncommitted(&mut self, event: Self::Event) {
        self.uncommitted_events.push(event);
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use postwall_core::event::DomainEvent;
    use postwall_test_support::FixedClock;

    fn active_post(clock: &FixedClock) -> Post {
        let mut post = Post::empty(Uuid::new_v4());
        post.create("alice", "hi", Uuid::new_v4(), clock).unwrap();
        post.mark_committed();
        post
    }

    #[test]
    fn test_create_produces_post_created_event() {
        // Arrange
        let post_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let fixed_now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let clock = FixedClock(fixed_now);
        let mut post = Post::empty(post_id);

        // Act
        post.create("alice", "hi", correlation_id, &clock).unwrap();

        // Assert
        let events = post.uncommitted_events();
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.event_type(), "PostCreated");

        let meta = event.metadata();
        assert_eq!(meta.aggregate_id, post_id);
        assert_eq!(meta.version, 0);
        assert_eq!(meta.correlation_id, correlation_id);
        assert_eq!(meta.causation_id, correlation_id);
        assert_eq!(meta.occurred_at, fixed_now);

        match &event.kind {
            PostEventKind::PostCreated(payload) => {
                assert_eq!(payload.author, "alice");
                assert_eq!(payload.message, "hi");
                assert_eq!(payload.date_posted, fixed_now);
            }
            other => panic!("expected PostCreated, got {other:?}"),
        }
        assert_eq!(post.status(), PostStatus::Active);
    }

    #[test]
    fn test_create_twice_is_rejected() {
        let clock = FixedClock::reference();
        let mut post = active_post(&clock);

        let result = post.create("alice", "again", Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(post.uncommitted_events().is_empty());
    }

    #[test]
    fn test_blank_message_is_rejected_without_event() {
        let clock = FixedClock::reference();
        let mut post = Post::empty(Uuid::new_v4());

        let result = post.create("alice", "   ", Uuid::new_v4(), &clock);

        match result {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("message")),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(post.uncommitted_events().is_empty());
        assert_eq!(post.status(), PostStatus::NotCreated);
    }

    #[test]
    fn test_like_on_missing_post_is_not_found() {
        let clock = FixedClock::reference();
        let mut post = Post::empty(Uuid::new_v4());

        let result = post.like(Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
    }

    #[test]
    fn test_like_at_counter_limit_saturates() {
        let clock = FixedClock::reference();
        let mut post = active_post(&clock);
        post.likes = u32::MAX;

        post.like(Uuid::new_v4(), &clock).unwrap();

        assert_eq!(post.likes(), u32::MAX);
        assert_eq!(post.uncommitted_events().len(), 1);
    }

    #[test]
    fn test_likes_accumulate_with_consecutive_versions() {
        // Arrange
        let clock = FixedClock::reference();
        let mut post = active_post(&clock);

        // Act
        post.like(Uuid::new_v4(), &clock).unwrap();
        post.like(Uuid::new_v4(), &clock).unwrap();

        // Assert
        assert_eq!(post.likes(), 2);
        let versions: Vec<i64> = post
            .uncommitted_events()
            .iter()
            .map(|e| e.metadata().version)
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn test_edit_message_replaces_text() {
        let clock = FixedClock::reference();
        let mut post = active_post(&clock);

        post.edit_message("edited", Uuid::new_v4(), &clock).unwrap();

        assert_eq!(post.message(), "edited");
    }

    #[test]
    fn test_other_user_cannot_edit_comment() {
        // Arrange
        let clock = FixedClock::reference();
        let mut post = active_post(&clock);
        let comment_id = Uuid::new_v4();
        post.add_comment(comment_id, "nice", "bob", Uuid::new_v4(), &clock)
            .unwrap();
        post.mark_committed();

        // Act
        let result = post.edit_comment(comment_id, "hacked", "carol", Uuid::new_v4(), &clock);

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(post.uncommitted_events().is_empty());
        assert_eq!(post.comments()[&comment_id].comment, "nice");
    }

    #[test]
    fn test_comment_owner_matches_case_insensitively() {
        let clock = FixedClock::reference();
        let mut post = active_post(&clock);
        let comment_id = Uuid::new_v4();
        post.add_comment(comment_id, "nice", "Bob", Uuid::new_v4(), &clock)
            .unwrap();

        post.edit_comment(comment_id, "nicer", "BOB", Uuid::new_v4(), &clock)
            .unwrap();
        post.remove_comment(comment_id, "bob", Uuid::new_v4(), &clock)
            .unwrap();

        assert!(post.comments().is_empty());
    }

    #[test]
    fn test_edit_unknown_comment_is_rejected() {
        let clock = FixedClock::reference();
        let mut post = active_post(&clock);

        let result = post.edit_comment(Uuid::new_v4(), "text", "bob", Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_non_author_cannot_delete_and_post_stays_active() {
        // Arrange
        let clock = FixedClock::reference();
        let mut post = active_post(&clock);

        // Act
        let result = post.delete("mallory", Uuid::new_v4(), &clock);

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(post.status(), PostStatus::Active);
        assert!(post.like(Uuid::new_v4(), &clock).is_ok());
    }

    #[test]
    fn test_removed_post_rejects_every_mutation() {
        // Arrange
        let clock = FixedClock::reference();
        let mut post = active_post(&clock);
        let comment_id = Uuid::new_v4();
        post.add_comment(comment_id, "nice", "bob", Uuid::new_v4(), &clock)
            .unwrap();
        post.delete("ALICE", Uuid::new_v4(), &clock).unwrap();
        post.mark_committed();

        // Act
        let results = [
            post.edit_message("x", Uuid::new_v4(), &clock),
            post.like(Uuid::new_v4(), &clock),
            post.add_comment(Uuid::new_v4(), "x", "bob", Uuid::new_v4(), &clock),
            post.edit_comment(comment_id, "x", "bob", Uuid::new_v4(), &clock),
            post.remove_comment(comment_id, "bob", Uuid::new_v4(), &clock),
            post.delete("alice", Uuid::new_v4(), &clock),
        ];

        // Assert
        assert!(
            results
                .iter()
                .all(|r| matches!(r, Err(DomainError::Validation(_))))
        );
        assert!(post.uncommitted_events().is_empty());
        assert_eq!(post.status(), PostStatus::Removed);
    }

    #[test]
    fn test_replay_reproduces_live_state() {
        // Arrange
        let clock = FixedClock::reference();
        let post_id = Uuid::new_v4();
        let comment_id = Uuid::new_v4();
        let mut live = Post::empty(post_id);
        live.create("alice", "hi", Uuid::new_v4(), &clock).unwrap();
        live.like(Uuid::new_v4(), &clock).unwrap();
        live.edit_message("hello", Uuid::new_v4(), &clock).unwrap();
        live.add_comment(comment_id, "nice", "bob", Uuid::new_v4(), &clock)
            .unwrap();
        live.edit_comment(comment_id, "very nice", "bob", Uuid::new_v4(), &clock)
            .unwrap();
        live.add_comment(Uuid::new_v4(), "meh", "carol", Uuid::new_v4(), &clock)
            .unwrap();
        let history = live.uncommitted_events().to_vec();
        live.mark_committed();

        // Act
        let mut replayed = Post::empty(post_id);
        replayed.replay(&history).unwrap();

        // Assert
        assert_eq!(replayed.version(), live.version());
        assert_eq!(replayed.version(), 5);
        assert_eq!(replayed.status(), live.status());
        assert_eq!(replayed.author(), live.author());
        assert_eq!(replayed.message(), live.message());
        assert_eq!(replayed.likes(), live.likes());
        assert_eq!(replayed.comments(), live.comments());
    }
}

//! Domain events for posts.

use chrono::{DateTime, Utc};
use postwall_core::error::DomainError;
use postwall_core::event::{DomainEvent, EventMetadata};
use postwall_core::repository::StoredEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminator of [`PostCreated`].
pub const POST_CREATED: &str = "PostCreated";
/// Discriminator of [`MessageUpdated`].
pub const MESSAGE_UPDATED: &str = "MessageUpdated";
/// Discriminator of [`PostLiked`].
pub const POST_LIKED: &str = "PostLiked";
/// Discriminator of [`CommentAdded`].
pub const COMMENT_ADDED: &str = "CommentAdded";
/// Discriminator of [`CommentUpdated`].
pub const COMMENT_UPDATED: &str = "CommentUpdated";
/// Discriminator of [`CommentRemoved`].
pub const COMMENT_REMOVED: &str = "CommentRemoved";
/// Discriminator of [`PostRemoved`].
pub const POST_REMOVED: &str = "PostRemoved";

/// Emitted when a post is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCreated {
    /// Who wrote the post.
    pub author: String,
    /// The post's text.
    pub message: String,
    /// When the post was created.
    pub date_posted: DateTime<Utc>,
}

/// Emitted when the post's text is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpdated {
    /// The new text.
    pub message: String,
}

/// Emitted once per like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLiked {}

/// Emitted when a comment is added to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAdded {
    /// The new comment's identifier.
    pub comment_id: Uuid,
    /// The comment text.
    pub comment: String,
    /// Who wrote the comment.
    pub username: String,
    /// When the comment was written.
    pub comment_date: DateTime<Utc>,
}

/// Emitted when a comment's text is replaced by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentUpdated {
    /// The edited comment.
    pub comment_id: Uuid,
    /// The new comment text.
    pub comment: String,
    /// Who edited the comment.
    pub username: String,
    /// When the edit happened.
    pub edit_date: DateTime<Utc>,
}

/// Emitted when a comment is removed by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRemoved {
    /// The removed comment.
    pub comment_id: Uuid,
}

/// Emitted when the post is deleted. Terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRemoved {}

/// Event payload variants for posts. The serialized form carries a `type`
/// field naming the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PostEventKind {
    /// A post has been created.
    PostCreated(PostCreated),
    /// The post's text has changed.
    MessageUpdated(MessageUpdated),
    /// The post has been liked.
    PostLiked(PostLiked),
    /// A comment has been added.
    CommentAdded(CommentAdded),
    /// A comment has been edited.
    CommentUpdated(CommentUpdated),
    /// A comment has been removed.
    CommentRemoved(CommentRemoved),
    /// The post has been deleted.
    PostRemoved(PostRemoved),
}

impl PostEventKind {
    /// Returns the discriminator written to the `type` field.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PostCreated(_) => POST_CREATED,
            Self::MessageUpdated(_) => MESSAGE_UPDATED,
            Self::PostLiked(_) => POST_LIKED,
            Self::CommentAdded(_) => COMMENT_ADDED,
            Self::CommentUpdated(_) => COMMENT_UPDATED,
            Self::CommentRemoved(_) => COMMENT_REMOVED,
            Self::PostRemoved(_) => POST_REMOVED,
        }
    }
}

/// Domain event envelope for posts.
#[derive(Debug, Clone, PartialEq)]
pub struct PostEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: PostEventKind,
}

impl DomainEvent for PostEvent {
    fn event_type(&self) -> &'static str {
        self.kind.type_name()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("PostEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        let kind: PostEventKind = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            DomainError::Deserialization(format!(
                "event {} ({}) could not be decoded: {e}",
                stored.event_id, stored.event_type
            ))
        })?;
        if kind.type_name() != stored.event_type {
            return Err(DomainError::Deserialization(format!(
                "event {} is recorded as {} but its payload is {}",
                stored.event_id,
                stored.event_type,
                kind.type_name()
            )));
        }
        Ok(Self {
            metadata: EventMetadata::from_stored(stored),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored(event_type: &str, payload: serde_json::Value) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: Uuid::new_v4(),
            aggregate_type: crate::POST_AGGREGATE_TYPE.to_owned(),
            event_type: event_type.to_owned(),
            payload,
            version: 0,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_payload_carries_type_discriminator() {
        let kind = PostEventKind::PostLiked(PostLiked {});

        let value = serde_json::to_value(&kind).unwrap();

        assert_eq!(value, serde_json::json!({ "type": "PostLiked" }));
    }

    #[test]
    fn test_from_stored_resolves_variant_from_discriminator() {
        // Arrange
        let comment_id = Uuid::new_v4();
        let record = stored(
            COMMENT_ADDED,
            serde_json::json!({
                "type": "CommentAdded",
                "comment_id": comment_id,
                "comment": "nice",
                "username": "bob",
                "comment_date": "2026-01-15T10:00:00Z",
            }),
        );

        // Act
        let event = PostEvent::from_stored(&record).unwrap();

        // Assert
        assert_eq!(event.event_type(), COMMENT_ADDED);
        assert_eq!(event.metadata().event_id, record.event_id);
        match event.kind {
            PostEventKind::CommentAdded(payload) => {
                assert_eq!(payload.comment_id, comment_id);
                assert_eq!(payload.username, "bob");
            }
            other => panic!("expected CommentAdded, got {other:?}"),
        }
    }

    #[test]
    fn test_from_stored_rejects_unknown_discriminator() {
        let record = stored("PostShared", serde_json::json!({ "type": "PostShared" }));

        let result = PostEvent::from_stored(&record);

        assert!(matches!(result, Err(DomainError::Deserialization(_))));
    }

    #[test]
    fn test_from_stored_rejects_payload_that_disagrees_with_event_type() {
        let record = stored(POST_REMOVED, serde_json::json!({ "type": "PostLiked" }));

        let result = PostEvent::from_stored(&record);

        match result {
            Err(DomainError::Deserialization(msg)) => assert!(msg.contains("PostRemoved")),
            other => panic!("expected Deserialization, got {other:?}"),
        }
    }

    #[test]
    fn test_to_stored_round_trips_through_from_stored() {
        // Arrange
        let event = PostEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: MESSAGE_UPDATED.to_owned(),
                aggregate_id: Uuid::new_v4(),
                version: 3,
                correlation_id: Uuid::new_v4(),
                causation_id: Uuid::new_v4(),
                occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            },
            kind: PostEventKind::MessageUpdated(MessageUpdated {
                message: "edited".to_owned(),
            }),
        };

        // Act
        let record = event.to_stored(crate::POST_AGGREGATE_TYPE);
        let decoded = PostEvent::from_stored(&record).unwrap();

        // Assert
        assert_eq!(record.event_type, MESSAGE_UPDATED);
        assert_eq!(record.aggregate_type, "post");
        assert_eq!(decoded, event);
    }
}

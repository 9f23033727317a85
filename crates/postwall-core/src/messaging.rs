//! Message broker ports.
//!
//! Committed events travel to the read side as JSON-encoded [`StoredEvent`]
//! records. The partition key is the aggregate id, so every event of one
//! aggregate lands on the same partition and is consumed in version order.
//! Delivery is at-least-once; consumers must be idempotent.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::repository::StoredEvent;

/// Publishes committed events to a broker topic.
#[async_trait]
pub trait EventProducer: Send + Sync {
    /// Publishes one event, keyed by its aggregate id.
    async fn produce(&self, topic: &str, event: &StoredEvent) -> Result<(), DomainError>;
}

/// A message pulled from a topic partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedMessage {
    /// Topic the message was read from.
    pub topic: String,
    /// Partition within the topic.
    pub partition: usize,
    /// Offset of the message within its partition.
    pub offset: u64,
    /// Partition key (the aggregate id).
    pub key: String,
    /// Encoded event.
    pub payload: String,
}

/// A consumer-group subscription with manual offset commit.
///
/// Messages past the group's committed offset are redelivered to the next
/// subscription if they are never committed.
#[async_trait]
pub trait EventSubscription: Send {
    /// Waits for the next message. Returns `Ok(None)` once the broker is
    /// closed. Dropping the returned future cancels the poll.
    async fn poll(&mut self) -> Result<Option<ConsumedMessage>, DomainError>;

    /// Marks `message` and everything before it on its partition as
    /// processed for this consumer group.
    async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), DomainError>;

    /// Parks an unprocessable message on the topic's dead-letter topic.
    async fn dead_letter(
        &mut self,
        message: &ConsumedMessage,
        reason: &str,
    ) -> Result<(), DomainError>;
}

/// Returns the partition key for an event.
#[must_use]
pub fn partition_key(event: &StoredEvent) -> String {
    event.aggregate_id.to_string()
}

/// Returns the dead-letter topic paired with `topic`.
#[must_use]
pub fn dead_letter_topic(topic: &str) -> String {
    format!("{topic}.dead-letter")
}

/// Encodes an event for the wire.
///
/// # Errors
///
/// Returns `DomainError::Transport` if the event cannot be serialized.
pub fn encode_event(event: &StoredEvent) -> Result<String, DomainError> {
    serde_json::to_string(event)
        .map_err(|e| DomainError::Transport(format!("event serialization failed: {e}")))
}

/// Decodes an event envelope from the wire. The payload's own `type`
/// discriminator is resolved later by the consuming context.
///
/// # Errors
///
/// Returns `DomainError::Deserialization` if the message is malformed.
pub fn decode_event(payload: &str) -> Result<StoredEvent, DomainError> {
    serde_json::from_str(payload)
        .map_err(|e| DomainError::Deserialization(format!("malformed event message: {e}")))
}

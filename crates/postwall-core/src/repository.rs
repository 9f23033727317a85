//! Event repository abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Version of an aggregate that has never been persisted.
pub const NO_VERSION: i64 = -1;

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique event identifier (surrogate storage id).
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Aggregate type tag, e.g. `"post"`.
    pub aggregate_type: String,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload, including its `type` discriminator.
    pub payload: serde_json::Value,
    /// 0-based version within the aggregate stream.
    pub version: i64,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

/// Append-only event store.
///
/// For a given aggregate id the stored versions form a gapless, strictly
/// increasing sequence starting at 0. Stored events are never updated or
/// deleted.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Load all events for a given aggregate, ordered by version ascending.
    /// An aggregate with no history yields an empty list.
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError>;

    /// Append new events to an aggregate stream with optimistic concurrency.
    ///
    /// `expected_version` is the last version the caller observed
    /// (`NO_VERSION` for a new stream). The store assigns versions
    /// `expected_version + 1, expected_version + 2, …` in order and returns
    /// the committed records. The whole batch is rejected with
    /// `DomainError::ConcurrencyConflict` if the stream's current version
    /// differs from `expected_version`.
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Lists every aggregate id that has at least one stored event, in order
    /// of first appearance.
    async fn list_aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError>;
}

/// Returns `events` re-versioned to follow `expected_version`.
#[must_use]
pub fn assign_versions(expected_version: i64, events: &[StoredEvent]) -> Vec<StoredEvent> {
    events
        .iter()
        .zip(expected_version + 1..)
        .map(|(event, version)| StoredEvent {
            version,
            ..event.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_stored_event(version: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: Uuid::new_v4(),
            aggregate_type: "post".to_owned(),
            event_type: "PostLiked".to_owned(),
            payload: serde_json::json!({ "type": "PostLiked" }),
            version,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_assign_versions_starts_after_expected_version() {
        // Arrange
        let events = vec![make_stored_event(7), make_stored_event(7)];

        // Act
        let assigned = assign_versions(NO_VERSION, &events);

        // Assert
        assert_eq!(assigned[0].version, 0);
        assert_eq!(assigned[1].version, 1);
        assert_eq!(assigned[0].event_id, events[0].event_id);
    }

    #[test]
    fn test_assign_versions_continues_existing_stream() {
        let assigned = assign_versions(4, &[make_stored_event(0)]);

        assert_eq!(assigned[0].version, 5);
    }
}

//! Event-sourcing handler.
//!
//! Loads aggregates by replaying their history, persists newly raised events
//! with optimistic concurrency, publishes them to the broker, and republishes
//! full history when the read side has to be rebuilt.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::messaging::EventProducer;
use crate::repository::{EventRepository, NO_VERSION, StoredEvent};

/// Load/save/republish orchestration for one aggregate type.
pub struct EventSourcingHandler<A> {
    repository: Arc<dyn EventRepository>,
    producer: Arc<dyn EventProducer>,
    topic: String,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> Clone for EventSourcingHandler<A> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            producer: Arc::clone(&self.producer),
            topic: self.topic.clone(),
            _aggregate: PhantomData,
        }
    }
}

impl<A> std::fmt::Debug for EventSourcingHandler<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSourcingHandler")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

/// Decodes stored records into the aggregate's event type.
fn decode_history<A: AggregateRoot>(stored: &[StoredEvent]) -> Result<Vec<A::Event>, DomainError> {
    stored.iter().map(A::Event::from_stored).collect()
}

impl<A: AggregateRoot> EventSourcingHandler<A> {
    /// Creates a handler that publishes to `topic`.
    #[must_use]
    pub fn new(
        repository: Arc<dyn EventRepository>,
        producer: Arc<dyn EventProducer>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            producer,
            topic: topic.into(),
            _aggregate: PhantomData,
        }
    }

    /// Returns the topic events are published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Rebuilds an aggregate by replaying its full history. An id without
    /// history yields an empty aggregate at version `NO_VERSION`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` if a stored event cannot be
    /// decoded, or the repository's error if loading fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, aggregate_id: Uuid) -> Result<A, DomainError> {
        let stored = self.repository.load_events(aggregate_id).await?;
        let events = decode_history::<A>(&stored)?;
        let mut aggregate = A::empty(aggregate_id);
        aggregate.replay(&events)?;
        Ok(aggregate)
    }

    /// Like [`get_by_id`](Self::get_by_id), but the aggregate must exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the id has no history.
    pub async fn get_existing(&self, aggregate_id: Uuid) -> Result<A, DomainError> {
        let aggregate = self.get_by_id(aggregate_id).await?;
        if aggregate.version() == NO_VERSION {
            return Err(DomainError::AggregateNotFound(aggregate_id));
        }
        Ok(aggregate)
    }

    /// Appends the aggregate's uncommitted events using its version as the
    /// expected version, marks them committed, then publishes them in order.
    ///
    /// A publish failure after the append does not fail the save: history
    /// is already durable and `republish` repairs the read side.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if another writer appended
    /// first; the aggregate is left untouched so the caller can reload and
    /// retry.
    #[instrument(skip(self, aggregate), fields(aggregate_id = %aggregate.aggregate_id(), expected_version = aggregate.version()))]
    pub async fn save(&self, aggregate: &mut A) -> Result<Vec<StoredEvent>, DomainError> {
        if aggregate.uncommitted_events().is_empty() {
            return Ok(Vec::new());
        }

        let aggregate_type = aggregate.aggregate_type();
        let pending: Vec<StoredEvent> = aggregate
            .uncommitted_events()
            .iter()
            .map(|event| event.to_stored(aggregate_type))
            .collect();

        let committed = self
            .repository
            .append_events(aggregate.aggregate_id(), aggregate.version(), &pending)
            .await?;
        aggregate.mark_committed();

        info!(
            event_count = committed.len(),
            version = aggregate.version(),
            "events committed"
        );

        self.publish(&committed).await;
        Ok(committed)
    }

    /// Publishes committed events, stopping at the first failure so the
    /// topic never carries a later version without the earlier one.
    async fn publish(&self, committed: &[StoredEvent]) {
        for event in committed {
            if let Err(err) = self.producer.produce(&self.topic, event).await {
                error!(
                    alert = true,
                    aggregate_id = %event.aggregate_id,
                    version = event.version,
                    event_type = %event.event_type,
                    error = %err,
                    "publish failed after commit; republish to repair the read model"
                );
                return;
            }
        }
    }

    /// Republishes the full history of every aggregate, in version order per
    /// aggregate. Consumers must treat the resent events idempotently.
    ///
    /// # Errors
    ///
    /// Returns the first load, decode or publish error. Republishing again
    /// after a failure is safe.
    #[instrument(skip(self), fields(topic = %self.topic))]
    pub async fn republish(&self) -> Result<Vec<StoredEvent>, DomainError> {
        let aggregate_ids = self.repository.list_aggregate_ids().await?;
        let mut republished = Vec::new();

        for aggregate_id in aggregate_ids {
            let stored = self.repository.load_events(aggregate_id).await?;
            let events = decode_history::<A>(&stored)?;
            A::empty(aggregate_id).replay(&events)?;

            for event in &stored {
                self.producer.produce(&self.topic, event).await?;
            }
            republished.extend(stored);
        }

        info!(event_count = republished.len(), "event history republished");
        Ok(republished)
    }
}

//! Aggregate root abstraction.

use uuid::Uuid;

use crate::error::DomainError;
use crate::event::DomainEvent;

/// Trait for aggregate roots that reconstitute from event history.
///
/// State is changed only by applying events. Command methods validate first
/// and then `raise` the resulting event, so a rejected operation never leaves
/// an event behind. `apply` must be an exhaustive match over the aggregate's
/// event variants.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Creates an empty, never-persisted aggregate with version `NO_VERSION`.
    fn empty(id: Uuid) -> Self
    where
        Self: Sized;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the aggregate type tag stored alongside each event.
    fn aggregate_type(&self) -> &'static str;

    /// Returns the version of the last persisted event applied, or
    /// `NO_VERSION` when nothing has been persisted.
    fn version(&self) -> i64;

    /// Records the version of the last persisted event applied.
    fn set_version(&mut self, version: i64);

    /// Apply an event to mutate internal state.
    fn apply(&mut self, event: &Self::Event);

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Adds an event to the uncommitted list.
    fn push_uncommitted(&mut self, event: Self::Event);

    /// Clears uncommitted events.
    fn clear_uncommitted_events(&mut self);

    /// Returns the version the next raised event will carry.
    fn next_version(&self) -> i64 {
        let pending = i64::try_from(self.uncommitted_events().len()).unwrap_or(i64::MAX);
        self.version() + pending + 1
    }

    /// Applies a new event to in-memory state and records it as uncommitted.
    fn raise(&mut self, event: Self::Event) {
        self.apply(&event);
        self.push_uncommitted(event);
    }

    /// Applies previously persisted events in order without recording them.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if an event belongs to another
    /// aggregate or does not directly follow the current version.
    fn replay(&mut self, events: &[Self::Event]) -> Result<(), DomainError> {
        for event in events {
            let meta = event.metadata();
            if meta.aggregate_id != self.aggregate_id() {
                return Err(DomainError::Infrastructure(format!(
                    "event {} belongs to aggregate {}, not {}",
                    meta.event_id,
                    meta.aggregate_id,
                    self.aggregate_id()
                )));
            }
            let expected = self.version() + 1;
            if meta.version != expected {
                return Err(DomainError::Infrastructure(format!(
                    "event history for aggregate {} is out of order: expected version {expected}, found {}",
                    self.aggregate_id(),
                    meta.version
                )));
            }
            self.apply(event);
            self.set_version(meta.version);
        }
        Ok(())
    }

    /// Clears the uncommitted list after a successful save and advances the
    /// version to the last committed event.
    fn mark_committed(&mut self) {
        if let Some(last) = self.uncommitted_events().last() {
            let version = last.metadata().version;
            self.set_version(version);
        }
        self.clear_uncommitted_events();
    }
}

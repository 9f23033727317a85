//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    /// An aggregate was required to exist but has no event history.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The version the writer loaded.
        expected: i64,
        /// The version found in the store.
        actual: i64,
    },

    /// A business rule rejected the request before any event was raised.
    #[error("validation error: {0}")]
    Validation(String),

    /// No handler is registered for a command, query or event type, or a
    /// handler was registered twice.
    #[error("routing error: {0}")]
    Routing(String),

    /// A stored or published event could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Publishing to or consuming from the message broker failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` when the caller may reasonably retry the operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_conflict_and_transport_are_retryable() {
        let conflict = DomainError::ConcurrencyConflict {
            aggregate_id: Uuid::new_v4(),
            expected: 0,
            actual: 1,
        };
        assert!(conflict.is_retryable());
        assert!(DomainError::Transport("broker down".into()).is_retryable());
    }

    #[test]
    fn test_validation_and_routing_are_not_retryable() {
        assert!(!DomainError::Validation("empty message".into()).is_retryable());
        assert!(!DomainError::Routing("unrouted".into()).is_retryable());
        assert!(!DomainError::Deserialization("unknown type".into()).is_retryable());
        assert!(!DomainError::AggregateNotFound(Uuid::new_v4()).is_retryable());
    }
}

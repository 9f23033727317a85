//! Test producers: `EventProducer` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use postwall_core::error::DomainError;
use postwall_core::messaging::EventProducer;
use postwall_core::repository::StoredEvent;

/// A producer that records every `(topic, event)` it is handed.
#[derive(Debug, Default)]
pub struct RecordingEventProducer {
    produced: Mutex<Vec<(String, StoredEvent)>>,
}

impl RecordingEventProducer {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything produced, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn produced(&self) -> Vec<(String, StoredEvent)> {
        self.produced.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventProducer for RecordingEventProducer {
    async fn produce(&self, topic: &str, event: &StoredEvent) -> Result<(), DomainError> {
        self.produced
            .lock()
            .unwrap()
            .push((topic.to_owned(), event.clone()));
        Ok(())
    }
}

/// A producer whose broker is always unreachable.
#[derive(Debug)]
pub struct FailingEventProducer;

#[async_trait]
impl EventProducer for FailingEventProducer {
    async fn produce(&self, _topic: &str, _event: &StoredEvent) -> Result<(), DomainError> {
        Err(DomainError::Transport("broker unreachable".into()))
    }
}

use async_trait::async_trait;
use postwall_core::error::DomainError;
use postwall_core::messaging::{EventProducer, encode_event, partition_key};
use postwall_core::repository::StoredEvent;
use tracing::instrument;

use crate::broker::InMemoryBroker;

/// Publishes committed events to an [`InMemoryBroker`], keyed by aggregate id.
#[derive(Debug, Clone)]
pub struct BrokerEventProducer {
    broker: InMemoryBroker,
}

impl BrokerEventProducer {
    /// Creates a producer writing to `broker`.
    #[must_use]
    pub fn new(broker: InMemoryBroker) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl EventProducer for BrokerEventProducer {
    #[instrument(skip(self, event), fields(
        aggregate_id = %event.aggregate_id,
        version = event.version,
        event_type = %event.event_type,
    ))]
    async fn produce(&self, topic: &str, event: &StoredEvent) -> Result<(), DomainError> {
        let payload = encode_event(event)?;
        self.broker.publish(topic, &partition_key(event), payload)?;
        Ok(())
    }
}

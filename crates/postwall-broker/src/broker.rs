//! In-process broker: topics split into partitions, consumer groups with
//! committed offsets, and dead-letter topics.
//!
//! Everything lives in memory and is lost with the process. The API server
//! uses the Redis Streams transport; this broker backs tests and local runs
//! where durability does not matter.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use postwall_core::error::DomainError;
use postwall_core::messaging::{ConsumedMessage, EventSubscription, dead_letter_topic};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Notify;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Record {
    key: String,
    payload: String,
}

#[derive(Debug)]
struct Topic {
    partitions: Vec<Vec<Record>>,
    /// Next offset to deliver, per consumer group and partition.
    committed: HashMap<String, Vec<u64>>,
}

impl Topic {
    fn new(partitions: usize) -> Self {
        Self {
            partitions: vec![Vec::new(); partitions],
            committed: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    topics: HashMap<String, Topic>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    partitions: usize,
    state: Mutex<State>,
    published: Notify,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn offset_of(index: usize) -> u64 {
    u64::try_from(index).unwrap_or(u64::MAX)
}

fn index_of(offset: u64) -> usize {
    usize::try_from(offset).unwrap_or(usize::MAX)
}

/// Maps a key onto one of `partitions` partitions. Every transport uses this,
/// so a key lands on the same partition whichever broker carries it.
pub(crate) fn partition_of(key: &str, partitions: usize) -> usize {
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0_u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let hash = u64::from_be_bytes(prefix);
    // The remainder is below the partition count, which is a usize.
    usize::try_from(hash % offset_of(partitions.max(1))).unwrap_or(0)
}

/// A message parked on a dead-letter topic, with where it came from and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Topic the message was consumed from.
    pub source_topic: String,
    /// Partition it was consumed from.
    pub partition: usize,
    /// Offset within that partition.
    pub offset: u64,
    /// Why it could not be processed.
    pub reason: String,
    /// The original payload, untouched.
    pub payload: String,
}

/// Handle to an in-process broker. Clones share the same topics.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    /// Creates a broker whose topics all have `partitions` partitions.
    #[must_use]
    pub fn new(partitions: NonZeroUsize) -> Self {
        Self {
            shared: Arc::new(Shared {
                partitions: partitions.get(),
                state: Mutex::new(State::default()),
                published: Notify::new(),
            }),
        }
    }

    /// Returns the partition a key maps to. Stable for the broker's lifetime.
    #[must_use]
    pub fn partition_for(&self, key: &str) -> usize {
        partition_of(key, self.shared.partitions)
    }

    /// Appends a message to its key's partition and wakes waiting consumers.
    /// Returns the partition and offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Transport` once the broker is closed.
    pub fn publish(&self, topic: &str, key: &str, payload: String) -> Result<(usize, u64), DomainError> {
        let partition = self.partition_for(key);
        let offset = {
            let mut state = self.shared.state();
            if state.closed {
                return Err(DomainError::Transport(format!(
                    "broker closed; cannot publish to {topic}"
                )));
            }
            let partitions = self.shared.partitions;
            let log = &mut state
                .topics
                .entry(topic.to_owned())
                .or_insert_with(|| Topic::new(partitions))
                .partitions[partition];
            log.push(Record {
                key: key.to_owned(),
                payload,
            });
            offset_of(log.len() - 1)
        };
        self.shared.published.notify_waiters();
        debug!(topic, partition, offset, "message published");
        Ok((partition, offset))
    }

    /// Opens a subscription for `group`, starting at the group's committed
    /// offsets.
    #[must_use]
    pub fn subscribe(&self, topic: &str, group: &str) -> BrokerSubscription {
        let mut state = self.shared.state();
        let partitions = self.shared.partitions;
        let positions = state
            .topics
            .entry(topic.to_owned())
            .or_insert_with(|| Topic::new(partitions))
            .committed
            .entry(group.to_owned())
            .or_insert_with(|| vec![0; partitions])
            .clone();
        BrokerSubscription {
            broker: self.clone(),
            topic: topic.to_owned(),
            group: group.to_owned(),
            positions,
            next_partition: 0,
        }
    }

    /// Closes the broker. Pending and future polls return `None`; publishing
    /// fails.
    pub fn close(&self) {
        self.shared.state().closed = true;
        self.shared.published.notify_waiters();
    }

    /// Returns every message on `topic`, partition by partition.
    #[must_use]
    pub fn messages(&self, topic: &str) -> Vec<ConsumedMessage> {
        let state = self.shared.state();
        let Some(entry) = state.topics.get(topic) else {
            return Vec::new();
        };
        entry
            .partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, log)| {
                log.iter().enumerate().map(move |(index, record)| ConsumedMessage {
                    topic: topic.to_owned(),
                    partition,
                    offset: offset_of(index),
                    key: record.key.clone(),
                    payload: record.payload.clone(),
                })
            })
            .collect()
    }

    /// Returns the dead letters recorded for `topic`.
    #[must_use]
    pub fn dead_letters(&self, topic: &str) -> Vec<DeadLetter> {
        self.messages(&dead_letter_topic(topic))
            .into_iter()
            .filter_map(|message| serde_json::from_str(&message.payload).ok())
            .collect()
    }

    /// Returns the next offset `group` will be handed on each partition of
    /// `topic` by a fresh subscription.
    #[must_use]
    pub fn committed_offsets(&self, topic: &str, group: &str) -> Vec<u64> {
        self.shared
            .state()
            .topics
            .get(topic)
            .and_then(|entry| entry.committed.get(group).cloned())
            .unwrap_or_else(|| vec![0; self.shared.partitions])
    }
}

/// A consumer-group subscription to one topic.
///
/// Partitions are served round-robin; within a partition messages arrive in
/// offset order.
#[derive(Debug)]
pub struct BrokerSubscription {
    broker: InMemoryBroker,
    topic: String,
    group: String,
    positions: Vec<u64>,
    next_partition: usize,
}

impl BrokerSubscription {
    fn take_next(&mut self, state: &State) -> Option<ConsumedMessage> {
        let entry = state.topics.get(&self.topic)?;
        let count = self.positions.len();
        for step in 0..count {
            let partition = (self.next_partition + step) % count;
            let position = self.positions[partition];
            if let Some(record) = entry.partitions[partition].get(index_of(position)) {
                self.positions[partition] = position + 1;
                self.next_partition = (partition + 1) % count;
                return Some(ConsumedMessage {
                    topic: self.topic.clone(),
                    partition,
                    offset: position,
                    key: record.key.clone(),
                    payload: record.payload.clone(),
                });
            }
        }
        None
    }
}

#[async_trait]
impl EventSubscription for BrokerSubscription {
    async fn poll(&mut self) -> Result<Option<ConsumedMessage>, DomainError> {
        let shared = Arc::clone(&self.broker.shared);
        loop {
            let published = shared.published.notified();
            tokio::pin!(published);
            published.as_mut().enable();
            {
                let state = shared.state();
                if state.closed {
                    return Ok(None);
                }
                if let Some(message) = self.take_next(&state) {
                    return Ok(Some(message));
                }
            }
            published.await;
        }
    }

    async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), DomainError> {
        let mut state = self.broker.shared.state();
        let partitions = self.broker.shared.partitions;
        let Some(entry) = state.topics.get_mut(&message.topic) else {
            return Err(DomainError::Transport(format!(
                "unknown topic {}",
                message.topic
            )));
        };
        let committed = entry
            .committed
            .entry(self.group.clone())
            .or_insert_with(|| vec![0; partitions]);
        let Some(slot) = committed.get_mut(message.partition) else {
            return Err(DomainError::Transport(format!(
                "partition {} out of range",
                message.partition
            )));
        };
        *slot = (*slot).max(message.offset + 1);
        Ok(())
    }

    async fn dead_letter(
        &mut self,
        message: &ConsumedMessage,
        reason: &str,
    ) -> Result<(), DomainError> {
        let letter = DeadLetter {
            source_topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            reason: reason.to_owned(),
            payload: message.payload.clone(),
        };
        let payload = serde_json::to_string(&letter)
            .map_err(|e| DomainError::Transport(format!("dead letter serialization failed: {e}")))?;
        warn!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            reason,
            "message dead-lettered"
        );
        self.broker
            .publish(&dead_letter_topic(&message.topic), &message.key, payload)?;
        Ok(())
    }
}

//! Redis Streams transport for the broker ports.
//!
//! Each topic partition is one stream named `<topic>:<partition>`, and the
//! partition is picked from the message key exactly as the in-process broker
//! does. Consumer groups are Redis consumer groups. A delivered entry stays in
//! the group's pending list until it is committed with `XACK`, so entries
//! survive a crash between delivery and commit. A subscription first replays
//! its own pending entries and then reads new ones, which means a restarted
//! consumer must reuse its consumer name to pick up where it stopped.

use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use postwall_core::error::DomainError;
use postwall_core::messaging::{
    ConsumedMessage, EventProducer, EventSubscription, dead_letter_topic, encode_event,
    partition_key,
};
use postwall_core::repository::StoredEvent;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadReply};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::broker::{DeadLetter, partition_of};

const KEY_FIELD: &str = "key";
const PAYLOAD_FIELD: &str = "payload";
const READ_BATCH: usize = 64;

/// Failures talking to Redis.
#[derive(Debug, Error)]
pub enum RedisStreamsError {
    /// Could not open a connection.
    #[error("redis connection failed: {0}")]
    Connection(#[source] redis::RedisError),

    /// A command was rejected or the connection dropped mid-command.
    #[error("redis command {command} failed: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: redis::RedisError,
    },

    /// Creating the consumer group failed for a reason other than it
    /// already existing.
    #[error("consumer group {group} on {stream} could not be created: {source}")]
    ConsumerGroup {
        stream: String,
        group: String,
        #[source]
        source: redis::RedisError,
    },

    /// A dead letter could not be encoded.
    #[error("dead letter serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RedisStreamsError> for DomainError {
    fn from(err: RedisStreamsError) -> Self {
        DomainError::Transport(err.to_string())
    }
}

fn command(command: &'static str) -> impl FnOnce(redis::RedisError) -> RedisStreamsError {
    move |source| RedisStreamsError::Command { command, source }
}

/// Name of the stream holding one partition of `topic`.
#[must_use]
pub fn stream_key(topic: &str, partition: usize) -> String {
    format!("{topic}:{partition}")
}

async fn connect(url: &str) -> Result<MultiplexedConnection, RedisStreamsError> {
    let client = redis::Client::open(url).map_err(RedisStreamsError::Connection)?;
    client
        .get_multiplexed_tokio_connection()
        .await
        .map_err(RedisStreamsError::Connection)
}

async fn append(
    connection: &mut MultiplexedConnection,
    stream: &str,
    key: &str,
    payload: &str,
) -> Result<String, RedisStreamsError> {
    redis::cmd("XADD")
        .arg(stream)
        .arg("*")
        .arg(KEY_FIELD)
        .arg(key)
        .arg(PAYLOAD_FIELD)
        .arg(payload)
        .query_async::<_, String>(connection)
        .await
        .map_err(command("XADD"))
}

/// Publishes committed events to Redis Streams, keyed by aggregate id.
#[derive(Clone)]
pub struct RedisStreamsProducer {
    connection: MultiplexedConnection,
    partitions: usize,
}

impl std::fmt::Debug for RedisStreamsProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamsProducer")
            .field("partitions", &self.partitions)
            .finish_non_exhaustive()
    }
}

impl RedisStreamsProducer {
    /// Connects to the Redis server at `url`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Transport` if the server cannot be reached.
    pub async fn connect(url: &str, partitions: NonZeroUsize) -> Result<Self, DomainError> {
        Ok(Self {
            connection: connect(url).await?,
            partitions: partitions.get(),
        })
    }
}

#[async_trait]
impl EventProducer for RedisStreamsProducer {
    #[instrument(skip(self, event), fields(
        aggregate_id = %event.aggregate_id,
        version = event.version,
        event_type = %event.event_type,
    ))]
    async fn produce(&self, topic: &str, event: &StoredEvent) -> Result<(), DomainError> {
        let payload = encode_event(event)?;
        let key = partition_key(event);
        let stream = stream_key(topic, partition_of(&key, self.partitions));
        let mut connection = self.connection.clone();
        let id = append(&mut connection, &stream, &key, &payload).await?;
        debug!(stream, id, "message published");
        Ok(())
    }
}

/// Removes and returns the entry ids recorded at or below `offset`.
fn take_through(unacked: &mut BTreeMap<u64, String>, offset: u64) -> Vec<String> {
    let later = unacked.split_off(&offset.saturating_add(1));
    std::mem::replace(unacked, later).into_values().collect()
}

/// Reads the key and payload fields of a stream entry. Missing fields come
/// back empty, so the entry fails to decode downstream and gets
/// dead-lettered instead of wedging its partition.
fn entry_fields(entry: &StreamId) -> (String, String) {
    let key = entry.get::<String>(KEY_FIELD).unwrap_or_default();
    let payload = entry.get::<String>(PAYLOAD_FIELD).unwrap_or_default();
    if payload.is_empty() {
        warn!(id = %entry.id, "stream entry has no payload");
    }
    (key, payload)
}

/// A consumer-group subscription to the partition streams of one topic.
///
/// Offsets handed out in [`ConsumedMessage`] are local to the subscription;
/// they map back to stream entry ids for acknowledgement.
pub struct RedisStreamsSubscription {
    connection: MultiplexedConnection,
    topic: String,
    group: String,
    consumer: String,
    streams: Vec<String>,
    /// Where each partition's pending-list replay resumes; `None` once it is
    /// drained.
    pending_cursor: Vec<Option<String>>,
    buffer: VecDeque<ConsumedMessage>,
    unacked: Vec<BTreeMap<u64, String>>,
    next_offset: Vec<u64>,
    block: Duration,
}

impl std::fmt::Debug for RedisStreamsSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamsSubscription")
            .field("topic", &self.topic)
            .field("group", &self.group)
            .field("consumer", &self.consumer)
            .finish_non_exhaustive()
    }
}

impl RedisStreamsSubscription {
    /// Joins `group` as `consumer` on every partition stream of `topic`,
    /// creating the streams and the group when missing. A new group starts
    /// from the beginning of each stream.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Transport` if the server cannot be reached or the
    /// group cannot be created.
    pub async fn connect(
        url: &str,
        topic: &str,
        group: &str,
        consumer: &str,
        partitions: NonZeroUsize,
    ) -> Result<Self, DomainError> {
        let mut connection = connect(url).await?;
        let streams: Vec<String> = (0..partitions.get())
            .map(|partition| stream_key(topic, partition))
            .collect();

        for stream in &streams {
            let created: Result<String, redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(stream)
                .arg(group)
                .arg("0")
                .arg("MKSTREAM")
                .query_async(&mut connection)
                .await;
            match created {
                Ok(_) => info!(stream, group, "consumer group created"),
                Err(err) if err.code() == Some("BUSYGROUP") => {}
                Err(source) => {
                    return Err(RedisStreamsError::ConsumerGroup {
                        stream: stream.clone(),
                        group: group.to_owned(),
                        source,
                    }
                    .into());
                }
            }
        }

        let count = streams.len();
        Ok(Self {
            connection,
            topic: topic.to_owned(),
            group: group.to_owned(),
            consumer: consumer.to_owned(),
            streams,
            pending_cursor: vec![Some("0".to_owned()); count],
            buffer: VecDeque::new(),
            unacked: vec![BTreeMap::new(); count],
            next_offset: vec![0; count],
            block: Duration::from_secs(1),
        })
    }

    /// Sets how long one read waits on the server for new entries.
    #[must_use]
    pub fn with_block(mut self, block: Duration) -> Self {
        self.block = block;
        self
    }

    fn buffer_entry(&mut self, partition: usize, entry: &StreamId) {
        let (key, payload) = entry_fields(entry);
        let offset = self.next_offset[partition];
        self.next_offset[partition] += 1;
        self.unacked[partition].insert(offset, entry.id.clone());
        self.buffer.push_back(ConsumedMessage {
            topic: self.topic.clone(),
            partition,
            offset,
            key,
            payload,
        });
    }

    /// Replays entries delivered to this consumer earlier but never
    /// acknowledged.
    async fn read_pending(&mut self) -> Result<(), RedisStreamsError> {
        for partition in 0..self.streams.len() {
            let Some(cursor) = self.pending_cursor[partition].clone() else {
                continue;
            };
            let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
                .arg("GROUP")
                .arg(&self.group)
                .arg(&self.consumer)
                .arg("COUNT")
                .arg(READ_BATCH)
                .arg("STREAMS")
                .arg(&self.streams[partition])
                .arg(&cursor)
                .query_async(&mut self.connection)
                .await
                .map_err(command("XREADGROUP"))?;

            let entries: Vec<StreamId> = reply
                .into_iter()
                .flat_map(|reply| reply.keys)
                .flat_map(|key| key.ids)
                .collect();
            match entries.last() {
                Some(last) => {
                    debug!(
                        stream = %self.streams[partition],
                        count = entries.len(),
                        "replaying pending entries"
                    );
                    self.pending_cursor[partition] = Some(last.id.clone());
                }
                None => self.pending_cursor[partition] = None,
            }
            for entry in &entries {
                self.buffer_entry(partition, entry);
            }
        }
        Ok(())
    }

    /// Waits up to the block timeout for entries no consumer of the group
    /// has seen yet.
    async fn read_new(&mut self) -> Result<(), RedisStreamsError> {
        let block_ms = u64::try_from(self.block.as_millis()).unwrap_or(u64::MAX);
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(READ_BATCH)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.streams);
        for _ in &self.streams {
            cmd.arg(">");
        }
        let reply: Option<StreamReadReply> = cmd
            .query_async(&mut self.connection)
            .await
            .map_err(command("XREADGROUP"))?;

        for stream in reply.into_iter().flat_map(|reply| reply.keys) {
            let Some(partition) = self.streams.iter().position(|s| *s == stream.key) else {
                warn!(stream = %stream.key, "entries from an unexpected stream");
                continue;
            };
            for entry in &stream.ids {
                self.buffer_entry(partition, entry);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventSubscription for RedisStreamsSubscription {
    async fn poll(&mut self) -> Result<Option<ConsumedMessage>, DomainError> {
        loop {
            if let Some(message) = self.buffer.pop_front() {
                return Ok(Some(message));
            }
            if self.pending_cursor.iter().any(Option::is_some) {
                self.read_pending().await?;
            } else {
                self.read_new().await?;
            }
        }
    }

    async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), DomainError> {
        let Some(unacked) = self.unacked.get_mut(message.partition) else {
            return Err(DomainError::Transport(format!(
                "partition {} out of range",
                message.partition
            )));
        };
        let ids = take_through(unacked, message.offset);
        if ids.is_empty() {
            return Ok(());
        }
        let acked: i64 = redis::cmd("XACK")
            .arg(&self.streams[message.partition])
            .arg(&self.group)
            .arg(&ids)
            .query_async(&mut self.connection)
            .await
            .map_err(command("XACK"))?;
        debug!(partition = message.partition, acked, "entries acknowledged");
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
        let payload = serde_json::to_string(&letter).map_err(RedisStreamsError::from)?;
        warn!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            reason,
            "message dead-lettered"
        );
        append(
            &mut self.connection,
            &dead_letter_topic(&message.topic),
            &message.key,
            &payload,
        )
        .await?;
        Ok(())
    }
}

//! Postwall Broker: partitioned, at-least-once message transports.
//!
//! Topics are split into a fixed number of partitions. A message's partition
//! is derived from its key, so messages sharing a key keep their publish
//! order. Consumer groups track what they have processed per partition;
//! anything delivered but not committed is redelivered.
//!
//! [`InMemoryBroker`] keeps everything in process. The Redis Streams
//! transport persists topics and consumer-group progress in Redis.

mod broker;
mod producer;
mod redis_streams;

pub use broker::{BrokerSubscription, DeadLetter, InMemoryBroker};
pub use producer::BrokerEventProducer;
pub use redis_streams::{
    RedisStreamsError, RedisStreamsProducer, RedisStreamsSubscription, stream_key,
};

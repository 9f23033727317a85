//! Tests for the Redis Streams transport against a live server.
//!
//! Run with `REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.

use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::Utc;
use postwall_broker::{DeadLetter, RedisStreamsProducer, RedisStreamsSubscription};
use postwall_core::messaging::{
    EventProducer, EventSubscription, dead_letter_topic, decode_event,
};
use postwall_core::repository::StoredEvent;
use uuid::Uuid;

const PARTITIONS: usize = 3;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned())
}

fn partitions() -> NonZeroUsize {
    NonZeroUsize::new(PARTITIONS).unwrap()
}

fn unique_topic() -> String {
    format!("test-events-{}", Uuid::new_v4())
}

fn stored(aggregate_id: Uuid, version: i64) -> StoredEvent {
    StoredEvent {
        event_id: Uuid::new_v4(),
        aggregate_id,
        aggregate_type: "post".to_owned(),
        event_type: "PostLiked".to_owned(),
        payload: serde_json::json!({ "type": "PostLiked" }),
        version,
        correlation_id: Uuid::new_v4(),
        causation_id: Uuid::new_v4(),
        occurred_at: Utc::now(),
    }
}

async fn subscribe(topic: &str, consumer: &str) -> RedisStreamsSubscription {
    RedisStreamsSubscription::connect(&redis_url(), topic, "readers", consumer, partitions())
        .await
        .unwrap()
        .with_block(Duration::from_millis(100))
}

async fn next(subscription: &mut RedisStreamsSubscription) -> postwall_core::messaging::ConsumedMessage {
    tokio::time::timeout(Duration::from_secs(5), subscription.poll())
        .await
        .expect("no message within 5s")
        .unwrap()
        .unwrap()
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_events_of_one_aggregate_arrive_in_version_order() {
    // Arrange
    let topic = unique_topic();
    let mut subscription = subscribe(&topic, "c1").await;
    let producer = RedisStreamsProducer::connect(&redis_url(), partitions())
        .await
        .unwrap();
    let aggregate_id = Uuid::new_v4();
    for version in 0..4 {
        producer
            .produce(&topic, &stored(aggregate_id, version))
            .await
            .unwrap();
    }

    // Act
    let mut versions = Vec::new();
    for _ in 0..4 {
        let message = next(&mut subscription).await;
        assert_eq!(message.key, aggregate_id.to_string());
        versions.push(decode_event(&message.payload).unwrap().version);
        subscription.commit(&message).await.unwrap();
    }

    // Assert
    assert_eq!(versions, vec![0, 1, 2, 3]);
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_uncommitted_entry_is_redelivered_after_restart() {
    // Arrange
    let topic = unique_topic();
    let producer = RedisStreamsProducer::connect(&redis_url(), partitions())
        .await
        .unwrap();
    let aggregate_id = Uuid::new_v4();
    producer.produce(&topic, &stored(aggregate_id, 0)).await.unwrap();
    producer.produce(&topic, &stored(aggregate_id, 1)).await.unwrap();

    let mut first = subscribe(&topic, "c1").await;
    let committed = next(&mut first).await;
    first.commit(&committed).await.unwrap();
    let _in_flight = next(&mut first).await;
    drop(first);

    // Act
    let mut restarted = subscribe(&topic, "c1").await;
    let redelivered = next(&mut restarted).await;

    // Assert
    assert_eq!(decode_event(&redelivered.payload).unwrap().version, 1);
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_dead_letter_lands_on_its_own_stream() {
    // Arrange
    let topic = unique_topic();
    let mut subscription = subscribe(&topic, "c1").await;
    let producer = RedisStreamsProducer::connect(&redis_url(), partitions())
        .await
        .unwrap();
    producer.produce(&topic, &stored(Uuid::new_v4(), 0)).await.unwrap();
    let message = next(&mut subscription).await;

    // Act
    subscription
        .dead_letter(&message, "unknown event type")
        .await
        .unwrap();
    subscription.commit(&message).await.unwrap();

    // Assert
    let client = redis::Client::open(redis_url()).unwrap();
    let mut connection = client.get_multiplexed_tokio_connection().await.unwrap();
    let reply: redis::streams::StreamRangeReply = redis::cmd("XRANGE")
        .arg(dead_letter_topic(&topic))
        .arg("-")
        .arg("+")
        .query_async(&mut connection)
        .await
        .unwrap();
    assert_eq!(reply.ids.len(), 1);
    let payload: String = reply.ids[0].get("payload").unwrap();
    let letter: DeadLetter = serde_json::from_str(&payload).unwrap();
    assert_eq!(letter.source_topic, topic);
    assert_eq!(letter.reason, "unknown event type");
    assert_eq!(letter.payload, message.payload);
}

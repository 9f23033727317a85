//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use postwall_broker::{BrokerEventProducer, InMemoryBroker};
use postwall_core::error::DomainError;
use postwall_core::repository::EventRepository;
use postwall_post_query::application::consumer::{EventConsumer, RetryPolicy};
use postwall_post_query::application::projector::PostProjector;
use postwall_post_query::domain::repositories::{CommentRepository, PostRepository};
use postwall_test_support::{FixedClock, InMemoryEventRepository, InMemoryPostRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use postwall_api::state::AppState;

pub const TOPIC: &str = "post-events";
pub const GROUP: &str = "post-query";

/// The whole system wired in-process: command side, broker, consumer and
/// read model, behind the same router `main.rs` serves.
pub struct TestSystem {
    pub router: Router,
    pub broker: InMemoryBroker,
    shutdown: watch::Sender<bool>,
    consumer: JoinHandle<Result<(), DomainError>>,
}

impl TestSystem {
    /// Starts a system on in-memory stores.
    pub fn start() -> (Self, InMemoryPostRepository) {
        let posts = InMemoryPostRepository::new();
        let system = Self::start_with(
            Arc::new(InMemoryEventRepository::new()),
            Arc::new(posts.clone()),
            Arc::new(posts.comments()),
        );
        (system, posts)
    }

    /// Starts a system on the given stores.
    pub fn start_with(
        events: Arc<dyn EventRepository>,
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
    ) -> Self {
        let broker = InMemoryBroker::new(NonZeroUsize::new(4).unwrap());
        let state = AppState::wire(
            events,
            Arc::new(BrokerEventProducer::new(broker.clone())),
            TOPIC,
            Arc::new(FixedClock::reference()),
            Arc::clone(&posts),
        )
        .unwrap();

        let (shutdown, rx) = watch::channel(false);
        let consumer = EventConsumer::new(
            Box::new(broker.subscribe(TOPIC, GROUP)),
            PostProjector::new(posts, comments),
        )
        .with_retry_policy(RetryPolicy {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        });

        Self {
            router: postwall_api::app(state),
            consumer: tokio::spawn(consumer.run(rx)),
            broker,
            shutdown,
        }
    }

    /// Waits until the consumer has committed every published message.
    pub async fn settle(&self) {
        for _ in 0..400 {
            let published = self.broker.messages(TOPIC).len() as u64;
            let committed: u64 = self.broker.committed_offsets(TOPIC, GROUP).iter().sum();
            if committed == published {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("consumer never caught up with the topic");
    }

    /// Stops the consumer and waits for it to exit.
    pub async fn stop(self) {
        self.shutdown.send(true).unwrap();
        self.consumer.await.unwrap().unwrap();
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: &serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        send_json(self.router.clone(), method, uri, body).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        get_json(self.router.clone(), uri).await
    }
}

fn parse_body(bytes: &[u8]) -> serde_json::Value {
    if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap()
    }
}

/// Send a request with a JSON body and return the response.
pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, parse_body(&body_bytes))
}

/// Send a GET request and return the response. An empty body reads as null.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, parse_body(&body_bytes))
}

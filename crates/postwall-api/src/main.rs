//! Postwall API server entry point.

use std::sync::Arc;

use postwall_api::config::AppConfig;
use postwall_api::error::AppError;
use postwall_api::state::AppState;
use postwall_broker::{RedisStreamsProducer, RedisStreamsSubscription};
use postwall_core::clock::SystemClock;
use postwall_event_store::pg_event_repository::PgEventRepository;
use postwall_post_query::application::consumer::EventConsumer;
use postwall_post_query::application::projector::PostProjector;
use postwall_read_store::pg_comment_repository::PgCommentRepository;
use postwall_read_store::pg_post_repository::PgPostRepository;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("Starting Postwall API server");

    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let producer = RedisStreamsProducer::connect(&config.redis_url, config.broker_partitions)
        .await
        .map_err(|e| AppError::Broker(e.to_string()))?;
    let subscription = RedisStreamsSubscription::connect(
        &config.redis_url,
        &config.event_topic,
        &config.consumer_group,
        &config.consumer_name,
        config.broker_partitions,
    )
    .await
    .map_err(|e| AppError::Broker(e.to_string()))?;
    let posts = PgPostRepository::new(pool.clone());
    let comments = PgCommentRepository::new(pool.clone());

    let app_state = AppState::wire(
        Arc::new(PgEventRepository::new(pool)),
        Arc::new(producer),
        &config.event_topic,
        Arc::new(SystemClock),
        Arc::new(posts.clone()),
    )?;

    // The consumer owns the read side; it stops when the flag flips.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = EventConsumer::new(
        Box::new(subscription),
        PostProjector::new(Arc::new(posts), Arc::new(comments)),
    );
    let consumer_task = tokio::spawn(consumer.run(shutdown_rx));

    let addr = config.listen_addr()?;
    info!(%addr, topic = %config.event_topic, consumer = %config.consumer_name, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, postwall_api::app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Receiver may already be gone if the consumer exited on its own.
    let _ = shutdown_tx.send(true);
    match consumer_task.await {
        Ok(Ok(())) => info!("consumer drained"),
        Ok(Err(err)) => error!(alert = true, error = %err, "consumer failed"),
        Err(err) => error!(alert = true, error = %err, "consumer task panicked"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for ctrl-c; shutting down");
    }
    info!("shutdown requested");
}

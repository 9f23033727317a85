//! Event consumer: pulls post events off the broker and feeds the projector.
//!
//! An offset is committed only after its event has been projected, so a
//! crash between the two redelivers the event and the projector skips it.
//! Messages that cannot be decoded are parked on the dead-letter topic and
//! committed so they never block the partition.

use std::time::Duration;

use postwall_core::error::DomainError;
use postwall_core::messaging::{ConsumedMessage, EventSubscription, decode_event};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use super::projector::{PostProjector, Projection};

/// Backoff between retries of transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// First delay.
    pub base_delay: Duration,
    /// Upper bound; delays double until they reach it.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// What happened to one consumed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handled {
    Committed,
    ShutdownRequested,
}

/// Drives one subscription until shutdown.
pub struct EventConsumer {
    subscription: Box<dyn EventSubscription>,
    projector: PostProjector,
    retry: RetryPolicy,
}

impl std::fmt::Debug for EventConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventConsumer")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Sleeps for `delay` unless shutdown is signalled first. Returns `true` on
/// shutdown. A dropped sender counts as shutdown.
async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => false,
        _ = shutdown.changed() => true,
    }
}

impl EventConsumer {
    /// Creates a consumer with the default retry policy.
    #[must_use]
    pub fn new(subscription: Box<dyn EventSubscription>, projector: PostProjector) -> Self {
        Self {
            subscription,
            projector,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Consumes until `shutdown` flips to `true`, its sender is dropped, or
    /// the broker closes. A message being projected when shutdown arrives is
    /// finished and committed first.
    ///
    /// # Errors
    ///
    /// Returns an error only if the dead-letter topic cannot be written;
    /// everything else is retried.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        info!("event consumer started");
        let mut delay = self.retry.base_delay;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let polled = tokio::select! {
                polled = self.subscription.poll() => polled,
                _ = shutdown.changed() => break,
            };

            match polled {
                Ok(Some(message)) => {
                    delay = self.retry.base_delay;
                    if self.handle(&message, &mut shutdown).await? == Handled::ShutdownRequested {
                        break;
                    }
                }
                Ok(None) => {
                    info!("subscription closed");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, delay_ms = delay.as_millis(), "poll failed; backing off");
                    if pause(delay, &mut shutdown).await {
                        break;
                    }
                    delay = (delay * 2).min(self.retry.max_delay);
                }
            }
        }

        info!("event consumer stopped");
        Ok(())
    }

    #[instrument(skip(self, message, shutdown), fields(
        topic = %message.topic,
        partition = message.partition,
        offset = message.offset,
    ))]
    async fn handle(
        &mut self,
        message: &ConsumedMessage,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Handled, DomainError> {
        let decoded = decode_event(&message.payload);
        let mut delay = self.retry.base_delay;

        loop {
            let outcome = match &decoded {
                Ok(stored) => self.projector.handle(stored).await,
                Err(err) => Err(err.clone()),
            };

            match outcome {
                Ok(projection) => {
                    if projection == Projection::OutOfOrder {
                        warn!("event skipped until its predecessor is projected");
                    }
                    break;
                }
                Err(DomainError::Deserialization(reason)) => {
                    error!(alert = true, reason = %reason, "undecodable event; dead-lettering");
                    self.subscription.dead_letter(message, &reason).await?;
                    break;
                }
                Err(err) => {
                    warn!(error = %err, delay_ms = delay.as_millis(), "projection failed; retrying");
                    if pause(delay, shutdown).await {
                        return Ok(Handled::ShutdownRequested);
                    }
                    delay = (delay * 2).min(self.retry.max_delay);
                }
            }
        }

        if let Err(err) = self.subscription.commit(message).await {
            warn!(error = %err, "offset commit failed; message will be redelivered");
        }
        Ok(Handled::Committed)
    }
}

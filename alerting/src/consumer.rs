//! The notification queue consumer.
//!
//! Drains one durable queue per task: `notifications` and
//! `email-notifications` carry [`NotificationMessage`] payloads dispatched
//! by channel type; `alerts` carries [`AlertMessage`] payloads that are
//! logged and acknowledged (downstream alert storage is an external
//! collaborator).
//!
//! Failure handling is bounded: a failed payload is nack-requeued up to
//! [`MAX_DELIVERY_ATTEMPTS`] times (counted per payload fingerprint in a
//! consumer-side ledger), then published to `{queue}.dead-letter` and
//! acknowledged, so a poison message can never wedge its queue.

use crate::channels::{StubSmsChannel, StubWebhookChannel};
use shopstream_core::channel::{ChannelError, NotificationChannel};
use shopstream_core::message::{
    AlertMessage, DEFAULT_QUEUE_PRIORITY, NotificationMessage, NotificationType, queues,
};
use shopstream_core::queue::{Delivery, MessageQueue, QueueError};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;

/// Delivery attempts before a payload is dead-lettered.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Errors that abort a queue consumer.
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// The consumer could not be registered.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The delivery stream ended without a shutdown signal.
    #[error("delivery stream for '{0}' closed unexpectedly")]
    QueueClosed(String),
}

/// Why one payload failed to process; drives requeue-or-dead-letter.
#[derive(Error, Debug)]
pub enum HandleError {
    /// The payload is not valid JSON for its queue's message type.
    #[error("undecodable payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The channel transport errored.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The channel declined the notification without an error.
    #[error("notification not delivered via {0}")]
    Undelivered(&'static str),
}

/// Consumer over the durable notification queues.
///
/// One `run` task per queue; the ledger of failed delivery attempts is
/// shared so a payload bounced between runs of the same consumer keeps
/// its count.
pub struct NotificationConsumer {
    queue: Arc<dyn MessageQueue>,
    email: Arc<dyn NotificationChannel>,
    sms: Arc<dyn NotificationChannel>,
    webhook: Arc<dyn NotificationChannel>,
    attempts: Mutex<HashMap<u64, u32>>,
}

impl NotificationConsumer {
    /// Consumer with the given email channel and stub sms/webhook.
    #[must_use]
    pub fn new(queue: Arc<dyn MessageQueue>, email: Arc<dyn NotificationChannel>) -> Self {
        Self::with_channels(
            queue,
            email,
            Arc::new(StubSmsChannel),
            Arc::new(StubWebhookChannel),
        )
    }

    /// Consumer with all three channels injected.
    #[must_use]
    pub fn with_channels(
        queue: Arc<dyn MessageQueue>,
        email: Arc<dyn NotificationChannel>,
        sms: Arc<dyn NotificationChannel>,
        webhook: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self {
            queue,
            email,
            sms,
            webhook,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Consume `queue_name` until the shutdown signal flips.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumeError::Queue`] if the consumer cannot be
    /// registered and [`ConsumeError::QueueClosed`] if the broker stream
    /// ends on its own.
    pub async fn run(
        &self,
        queue_name: &str,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ConsumeError> {
        use futures::StreamExt;

        let mut stream = self.queue.consume(queue_name).await?;
        tracing::info!(queue = %queue_name, "notification consumer started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!(queue = %queue_name, "notification consumer shutting down");
                        return Ok(());
                    }
                }
                next = stream.next() => match next {
                    None => return Err(ConsumeError::QueueClosed(queue_name.to_string())),
                    Some(Err(e)) => {
                        tracing::warn!(queue = %queue_name, error = %e, "transport error on queue");
                    }
                    Some(Ok(delivery)) => self.handle(queue_name, delivery).await,
                },
            }
        }
    }

    /// Process one payload from `queue_name`.
    ///
    /// Exposed for direct testing of the dispatch logic; `run` calls this
    /// through the ack/requeue wrapper.
    ///
    /// # Errors
    ///
    /// Returns a [`HandleError`] describing why the payload failed.
    pub async fn process(&self, queue_name: &str, payload: &[u8]) -> Result<(), HandleError> {
        if queue_name == queues::ALERTS {
            let alert: AlertMessage = serde_json::from_slice(payload)?;
            // Alerts are recorded, not re-dispatched to channels.
            tracing::info!(
                alert_type = %alert.alert_type,
                severity = ?alert.severity,
                source = %alert.source,
                message = %alert.message,
                "alert received"
            );
            return Ok(());
        }

        let notification: NotificationMessage = serde_json::from_slice(payload)?;
        let channel = match notification.notification_type {
            NotificationType::Email => &self.email,
            NotificationType::Sms => &self.sms,
            NotificationType::Webhook => &self.webhook,
        };

        let delivered = channel.send(&notification).await?;
        if delivered {
            tracing::debug!(
                channel = channel.name(),
                recipient = %notification.recipient,
                "notification delivered"
            );
            Ok(())
        } else {
            Err(HandleError::Undelivered(channel.name()))
        }
    }

    async fn handle(&self, queue_name: &str, delivery: Delivery) {
        let fingerprint = payload_fingerprint(&delivery.payload);

        match self.process(queue_name, &delivery.payload).await {
            Ok(()) => {
                self.clear_attempts(fingerprint);
                if let Err(e) = delivery.ack().await {
                    tracing::warn!(queue = %queue_name, error = %e, "ack failed");
                }
            }
            Err(e) => {
                let attempts = self.record_attempt(fingerprint);
                if attempts < MAX_DELIVERY_ATTEMPTS {
                    tracing::warn!(
                        queue = %queue_name,
                        attempts = attempts,
                        error = %e,
                        "processing failed, requeueing"
                    );
                    if let Err(nack_err) = delivery.nack_requeue().await {
                        tracing::warn!(queue = %queue_name, error = %nack_err, "nack failed");
                    }
                } else {
                    self.dead_letter(queue_name, delivery, fingerprint, &e).await;
                }
            }
        }
    }

    /// Move an exhausted payload to the queue's dead-letter destination
    /// and ack it. If the dead-letter publish itself fails, the message
    /// is requeued and the ledger kept, so the move is retried on the
    /// next delivery.
    async fn dead_letter(
        &self,
        queue_name: &str,
        delivery: Delivery,
        fingerprint: u64,
        cause: &HandleError,
    ) {
        let target = queues::dead_letter(queue_name);
        match self
            .queue
            .publish(&target, &delivery.payload, DEFAULT_QUEUE_PRIORITY)
            .await
        {
            Ok(()) => {
                self.clear_attempts(fingerprint);
                tracing::error!(
                    queue = %queue_name,
                    dead_letter = %target,
                    error = %cause,
                    "delivery attempts exhausted, message dead-lettered"
                );
                if let Err(e) = delivery.ack().await {
                    tracing::warn!(queue = %queue_name, error = %e, "ack after dead-letter failed");
                }
            }
            Err(e) => {
                tracing::error!(
                    queue = %queue_name,
                    dead_letter = %target,
                    error = %e,
                    "dead-letter publish failed, requeueing"
                );
                if let Err(nack_err) = delivery.nack_requeue().await {
                    tracing::warn!(queue = %queue_name, error = %nack_err, "nack failed");
                }
            }
        }
    }

    fn record_attempt(&self, fingerprint: u64) -> u32 {
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = attempts.entry(fingerprint).or_insert(0);
        *count += 1;
        *count
    }

    fn clear_attempts(&self, fingerprint: u64) {
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        attempts.remove(&fingerprint);
    }
}

fn payload_fingerprint(payload: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}

//! Durable message queue abstraction with manual acknowledgement.
//!
//! Notification and alert payloads travel through durable queues with
//! numeric priority and manual acknowledgement. A consumer receives
//! [`Delivery`] values; after processing it either acknowledges (the
//! broker discards the message) or negatively acknowledges with requeue
//! (the broker redelivers it to the same queue).
//!
//! Unacknowledged in-flight messages at shutdown are redelivered to the
//! next consumer — at-least-once, never exactly-once.
//!
//! # Implementations
//!
//! - `AmqpQueue` (`shopstream-amqp`) — production
//! - `InMemoryQueue` (`shopstream-testing`) — tests

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during queue operations.
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    /// Failed to connect to the broker.
    #[error("queue connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish to a queue.
    #[error("publish failed for queue '{queue}': {reason}")]
    PublishFailed {
        /// The queue that failed.
        queue: String,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to start consuming a queue.
    #[error("consume failed for queue '{queue}': {reason}")]
    ConsumeFailed {
        /// The queue that failed.
        queue: String,
        /// The reason for failure.
        reason: String,
    },

    /// An acknowledgement could not be delivered to the broker.
    #[error("acknowledgement failed: {0}")]
    AckFailed(String),

    /// Network or transport error while consuming.
    #[error("transport error: {0}")]
    TransportError(String),
}

/// Broker-side acknowledgement handle for a single delivery.
///
/// Methods take `self: Box<Self>` — an acknowledgement is a one-shot
/// decision per delivery.
pub trait Acknowledger: Send {
    /// Acknowledge the delivery; the broker discards the message.
    fn ack(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send>>;

    /// Negatively acknowledge with requeue; the broker redelivers the
    /// message to the same queue.
    fn nack_requeue(
        self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send>>;
}

/// A message delivered from a queue, pending acknowledgement.
pub struct Delivery {
    /// The message payload, JSON-encoded by publishers.
    pub payload: Vec<u8>,
    /// Whether the broker marked this delivery as a redelivery.
    pub redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    /// Create a delivery from a payload and an acknowledgement handle.
    #[must_use]
    pub fn new(payload: Vec<u8>, redelivered: bool, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            payload,
            redelivered,
            acker,
        }
    }

    /// Acknowledge the delivery.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AckFailed`] if the broker rejects the ack.
    pub async fn ack(self) -> Result<(), QueueError> {
        self.acker.ack().await
    }

    /// Negatively acknowledge with requeue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AckFailed`] if the broker rejects the nack.
    pub async fn nack_requeue(self) -> Result<(), QueueError> {
        self.acker.nack_requeue().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish_non_exhaustive()
    }
}

/// Stream of deliveries from a queue consumer.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, QueueError>> + Send>>;

/// Trait for durable message queue implementations.
pub trait MessageQueue: Send + Sync {
    /// Publish a payload to a durable queue with the given priority.
    ///
    /// Messages are persisted by the broker; priority determines delivery
    /// order under broker-level priority scheduling.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::PublishFailed`] if the publish fails.
    fn publish(
        &self,
        queue: &str,
        payload: &[u8],
        priority: u8,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>>;

    /// Start consuming a queue with manual acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConsumeFailed`] if the consumer cannot be
    /// registered.
    fn consume(
        &self,
        queue: &str,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryStream, QueueError>> + Send + '_>>;
}

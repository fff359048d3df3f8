//! Event bus abstraction over stream topics.
//!
//! The ingestion consumer subscribes to a fixed set of topics and folds
//! whatever arrives. The transport yields raw [`TopicMessage`] values —
//! topic name, payload bytes and headers — and the consumer owns JSON
//! decoding, so transport implementations never need to know the event
//! shapes.
//!
//! # Delivery Semantics
//!
//! **At-least-once** with manual offset commits:
//! - Offsets are committed after the message is handed to the subscriber
//! - A crash before commit means redelivery
//! - Handlers must tolerate duplicate side effects (counters may double)
//! - Ordering holds within a partition; topics proceed concurrently
//!
//! # Implementations
//!
//! - `KafkaEventBus` (`shopstream-kafka`) — production
//! - `InMemoryEventBus` (`shopstream-testing`) — tests

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum BusError {
    /// Failed to connect to the broker.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish to a topic.
    #[error("publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to subscribe to topics.
    #[error("subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// The reason for failure.
        reason: String,
    },

    /// Network or transport error while consuming.
    #[error("transport error: {0}")]
    TransportError(String),
}

/// A raw message received from a stream topic.
#[derive(Clone, Debug)]
pub struct TopicMessage {
    /// The topic the message arrived on.
    pub topic: String,
    /// The message value, JSON-encoded by producers.
    pub payload: Vec<u8>,
    /// Broker headers (`eventType`, `version`, `timestamp`, ...).
    pub headers: Vec<(String, String)>,
}

/// Stream of raw messages from a subscription.
pub type TopicStream = Pin<Box<dyn Stream<Item = Result<TopicMessage, BusError>> + Send>>;

/// Trait for event bus implementations.
///
/// All implementations must be `Send + Sync`; consumers hold
/// `Arc<dyn EventBus>` handles, hence the explicit boxed-future returns.
pub trait EventBus: Send + Sync {
    /// Publish a payload to a topic with the given headers.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PublishFailed`] if the publish operation fails.
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        headers: &[(String, String)],
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a merged stream.
    ///
    /// Message handling within the returned stream is sequential, which
    /// preserves per-partition delivery order; separate subscriptions
    /// proceed concurrently with respect to each other.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<TopicStream, BusError>> + Send + '_>>;
}

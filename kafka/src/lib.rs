//! Kafka event bus implementation for shopstream.
//!
//! Implements the [`EventBus`] trait from `shopstream-core` on top of
//! rdkafka. Works against Apache Kafka, Redpanda or any other broker
//! speaking the Kafka protocol.
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - Offsets are committed AFTER the message is handed to the subscriber's
//!   channel; a crash before commit means redelivery
//! - Subscribers must tolerate duplicate deliveries (counter folds may
//!   double-count across a crash window)
//! - Ordering is guaranteed within a partition
//!
//! # Example
//!
//! ```no_run
//! use shopstream_kafka::KafkaEventBus;
//! use shopstream_core::event_bus::EventBus;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = KafkaEventBus::new("localhost:9092")?;
//!
//! bus.publish(
//!     "product-events",
//!     br#"{"id":"evt-1","type":"product.created"}"#,
//!     &[("eventType".to_string(), "product.created".to_string())],
//! )
//! .await?;
//!
//! let mut stream = bus.subscribe(&["product-events"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(message) => println!("received from {}", message.topic),
//!         Err(e) => eprintln!("stream error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use shopstream_core::event_bus::{BusError, EventBus, TopicMessage, TopicStream};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Kafka event bus implementation.
///
/// One producer is shared by all publishes; each subscription creates its
/// own `StreamConsumer` in a dedicated task, so independent subscriptions
/// proceed concurrently.
///
/// # Configuration
///
/// - **Broker addresses**: bootstrap servers (required)
/// - **Consumer group**: explicit ID or auto-generated from topics
/// - **Buffer size**: message buffer capacity (default: 1000)
/// - **Offset reset**: where new groups start reading (default: "latest")
pub struct KafkaEventBus {
    /// Kafka producer for publishing messages
    producer: FutureProducer,
    /// Broker addresses (for creating consumers)
    brokers: String,
    /// Producer timeout
    timeout: Duration,
    /// Consumer group ID (if explicitly set)
    consumer_group: Option<String>,
    /// Message buffer size for subscribers
    buffer_size: usize,
    /// Auto offset reset policy
    auto_offset_reset: String,
}

impl KafkaEventBus {
    /// Create a new Kafka event bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConnectionFailed`] if the producer cannot be
    /// created or broker addresses are invalid.
    pub fn new(brokers: &str) -> Result<Self, BusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the event bus.
    #[must_use]
    pub fn builder() -> KafkaEventBusBuilder {
        KafkaEventBusBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for configuring a [`KafkaEventBus`].
///
/// # Example
///
/// ```no_run
/// use shopstream_kafka::KafkaEventBus;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = KafkaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .consumer_group("analytics-workers")
///     .producer_acks("all")
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct KafkaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl KafkaEventBusBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode: "0", "1" or "all".
    ///
    /// Default: "1"
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec: "none", "gzip", "snappy", "lz4", "zstd".
    ///
    /// Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the producer send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the consumer group ID for subscriptions.
    ///
    /// If not set, the group is auto-generated from the sorted topic
    /// names. Setting an explicit ID lets multiple worker instances share
    /// the workload.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set the message buffer size between the consumer task and the
    /// subscriber (default: 1000).
    ///
    /// # Panics
    ///
    /// Panics if `buffer_size` is 0.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        assert!(buffer_size > 0, "buffer_size must be greater than 0");
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Set where new consumer groups start reading when no committed
    /// offset exists: "earliest", "latest" or "error".
    ///
    /// Default: "latest"
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`KafkaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConnectionFailed`] if brokers are not set or
    /// the producer cannot be created.
    pub fn build(self) -> Result<KafkaEventBus, BusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| BusError::ConnectionFailed("Brokers not configured".to_string()))?;

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", self.producer_acks.as_deref().unwrap_or("1"))
            .set(
                "compression.type",
                self.compression.as_deref().unwrap_or("none"),
            );

        let producer: FutureProducer = producer_config
            .create()
            .map_err(|e| BusError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        tracing::info!(
            brokers = %brokers,
            acks = self.producer_acks.as_deref().unwrap_or("1"),
            buffer_size = self.buffer_size.unwrap_or(1000),
            auto_offset_reset = self.auto_offset_reset.as_deref().unwrap_or("latest"),
            "KafkaEventBus created"
        );

        Ok(KafkaEventBus {
            producer,
            brokers,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            consumer_group: self.consumer_group,
            buffer_size: self.buffer_size.unwrap_or(1000),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "latest".to_string()),
        })
    }
}

impl EventBus for KafkaEventBus {
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        headers: &[(String, String)],
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>> {
        // Clone data before moving into async block
        let topic = topic.to_string();
        let payload = payload.to_vec();
        let headers = headers.to_vec();
        let timeout = self.timeout;

        Box::pin(async move {
            // The eventType header doubles as the partition key so events
            // of one type stay ordered; topic name otherwise.
            let key = headers
                .iter()
                .find(|(name, _)| name == "eventType")
                .map_or_else(|| topic.clone(), |(_, value)| value.clone());

            let mut owned_headers = OwnedHeaders::new();
            for (name, value) in &headers {
                owned_headers = owned_headers.insert(Header {
                    key: name,
                    value: Some(value.as_str()),
                });
            }

            let record = FutureRecord::to(&topic)
                .payload(&payload)
                .key(&key)
                .headers(owned_headers);

            let send_result = self.producer.send(record, Timeout::After(timeout)).await;

            match send_result {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition = partition,
                        offset = offset,
                        "Message published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %topic,
                        error = %kafka_error,
                        "Failed to publish message"
                    );
                    Err(BusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<TopicStream, BusError>> + Send + '_>> {
        // Clone configuration before moving into async block
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            // Explicit consumer group if set; otherwise deterministic name
            // derived from the sorted topic list.
            let consumer_group_id = if let Some(group) = consumer_group {
                group
            } else {
                let mut sorted_topics = topics.clone();
                sorted_topics.sort();
                format!("shopstream-{}", sorted_topics.join("-"))
            };

            // Manual commit for at-least-once delivery
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| BusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| BusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group_id,
                buffer_size = buffer_size,
                auto_offset_reset = %auto_offset_reset,
                manual_commit = true,
                "Subscribed to topics"
            );

            // Channel between the consumer task and the subscriber;
            // buffer size absorbs bursts and slow folds.
            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            // Spawn a task that owns the consumer and forwards messages
            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(msg_result) = stream.next().await {
                    match msg_result {
                        Ok(message) => {
                            let Some(payload) = message.payload() else {
                                // Empty messages carry nothing to fold;
                                // commit and move on.
                                if let Err(e) =
                                    consumer.commit_message(&message, CommitMode::Async)
                                {
                                    tracing::warn!(
                                        error = %e,
                                        "Failed to commit message with no payload"
                                    );
                                }
                                continue;
                            };

                            let headers = message.headers().map_or_else(Vec::new, |hs| {
                                hs.iter()
                                    .filter_map(|h| {
                                        h.value.map(|v| {
                                            (
                                                h.key.to_string(),
                                                String::from_utf8_lossy(v).into_owned(),
                                            )
                                        })
                                    })
                                    .collect()
                            });

                            let topic_message = TopicMessage {
                                topic: message.topic().to_string(),
                                payload: payload.to_vec(),
                                headers,
                            };

                            tracing::trace!(
                                topic = message.topic(),
                                partition = message.partition(),
                                offset = message.offset(),
                                "Received message"
                            );

                            // CRITICAL: commit only AFTER successful send
                            // to the channel; crash-before-commit means
                            // redelivery (at-least-once).
                            if tx.send(Ok(topic_message)).await.is_err() {
                                tracing::debug!(
                                    "Channel receiver dropped, exiting consumer task"
                                );
                                break; // Exit WITHOUT committing
                            }

                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "Failed to commit offset (message may be redelivered)"
                                );
                                // Keep going; a failed commit only risks
                                // duplicates, never loss.
                            }
                        }
                        Err(e) => {
                            let err =
                                BusError::TransportError(format!("Failed to receive message: {e}"));
                            if tx.send(Err(err)).await.is_err() {
                                break; // Receiver dropped
                            }
                        }
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as TopicStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kafka_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KafkaEventBus>();
        assert_sync::<KafkaEventBus>();
    }

    #[test]
    fn builder_default_works() {
        let _builder = KafkaEventBus::builder();
    }

    #[test]
    fn build_without_brokers_fails() {
        let result = KafkaEventBus::builder().build();
        assert!(matches!(result, Err(BusError::ConnectionFailed(_))));
    }
}

//! In-memory event bus with channel fanout.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use shopstream_core::event_bus::{BusError, EventBus, TopicMessage, TopicStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tokio::sync::mpsc;

type Subscriber = (Vec<String>, mpsc::UnboundedSender<Result<TopicMessage, BusError>>);

/// Channel-fanout implementation of [`EventBus`].
///
/// Publishes fan out synchronously to every live subscription whose topic
/// set contains the topic. Unbounded channels keep test ordering
/// deterministic: a message published before a poll is observed by that
/// poll.
#[derive(Default)]
pub struct InMemoryEventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl InMemoryEventBus {
    /// Create a bus with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions, for wiring assertions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        headers: &[(String, String)],
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>> {
        let message = TopicMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            headers: headers.to_vec(),
        };

        {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.retain(|(topics, tx)| {
                if topics.iter().any(|t| t == &message.topic) {
                    tx.send(Ok(message.clone())).is_ok()
                } else {
                    !tx.is_closed()
                }
            });
        }

        Box::pin(async { Ok(()) })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<TopicStream, BusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push((topics, tx));

        Box::pin(async move {
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
    use futures::StreamExt;

    #[tokio::test]
    async fn delivers_only_to_matching_topics() {
        let bus = InMemoryEventBus::new();
        let mut product = bus.subscribe(&["product-events"]).await.unwrap();
        let mut search = bus.subscribe(&["search-analytics"]).await.unwrap();

        bus.publish("product-events", b"p", &[]).await.unwrap();
        bus.publish("search-analytics", b"s", &[]).await.unwrap();

        assert_eq!(product.next().await.unwrap().unwrap().payload, b"p");
        assert_eq!(search.next().await.unwrap().unwrap().payload, b"s");
    }

    #[tokio::test]
    async fn one_subscription_can_span_topics() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus
            .subscribe(&["product-events", "system-events"])
            .await
            .unwrap();

        bus.publish("system-events", b"sys", &[]).await.unwrap();
        let message = stream.next().await.unwrap().unwrap();
        assert_eq!(message.topic, "system-events");
    }
}

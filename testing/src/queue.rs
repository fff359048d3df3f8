//! In-memory priority queue with manual acknowledgement.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use shopstream_core::queue::{
    Acknowledger, Delivery, DeliveryStream, MessageQueue, QueueError,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Clone)]
struct QueuedMessage {
    payload: Vec<u8>,
    priority: u8,
    redelivered: bool,
}

/// One publish as seen by the broker, kept for assertions.
#[derive(Clone, Debug)]
pub struct PublishedMessage {
    /// Destination queue.
    pub queue: String,
    /// Raw payload.
    pub payload: Vec<u8>,
    /// Broker priority the message was published with.
    pub priority: u8,
}

#[derive(Default)]
struct QueueState {
    queues: HashMap<String, Vec<QueuedMessage>>,
    notifiers: HashMap<String, Arc<Notify>>,
    published: Vec<PublishedMessage>,
    acked: usize,
}

/// Wakeup handle for one queue. Each queue gets its own `Notify` so a
/// publish to one queue can never consume the wakeup of a consumer
/// parked on another.
fn notifier(state: &Arc<Mutex<QueueState>>, queue: &str) -> Arc<Notify> {
    Arc::clone(
        state
            .lock()
            .unwrap()
            .notifiers
            .entry(queue.to_string())
            .or_default(),
    )
}

/// Priority-ordered implementation of [`MessageQueue`].
///
/// Mirrors the broker behaviours the consumers depend on: higher priority
/// delivers first (FIFO within a priority), nack-with-requeue puts the
/// message back flagged as redelivered, and nothing leaves the queue
/// until it is acked. Wakeups are per queue, matching a broker's
/// per-queue consumer channels.
///
/// Every publish — including dead-letter publishes — is also appended to
/// a log readable through [`InMemoryQueue::published`].
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryQueue {
    /// Create an empty queue broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All publishes to `queue`, in publish order.
    #[must_use]
    pub fn published(&self, queue: &str) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .unwrap()
            .published
            .iter()
            .filter(|p| p.queue == queue)
            .cloned()
            .collect()
    }

    /// Messages currently waiting on `queue`.
    #[must_use]
    pub fn queue_len(&self, queue: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map_or(0, Vec::len)
    }

    /// How many deliveries have been acknowledged.
    #[must_use]
    pub fn ack_count(&self) -> usize {
        self.state.lock().unwrap().acked
    }

    fn pop_highest(&self, queue: &str) -> Option<QueuedMessage> {
        let mut state = self.state.lock().unwrap();
        let messages = state.queues.get_mut(queue)?;
        let best = messages
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                // FIFO within a priority: on ties prefer the earlier index.
                a.priority.cmp(&b.priority).then(ib.cmp(ia))
            })
            .map(|(i, _)| i)?;
        Some(messages.remove(best))
    }
}

struct InMemoryAcker {
    state: Arc<Mutex<QueueState>>,
    queue: String,
    message: QueuedMessage,
}

impl Acknowledger for InMemoryAcker {
    fn ack(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send>> {
        self.state.lock().unwrap().acked += 1;
        Box::pin(async { Ok(()) })
    }

    fn nack_requeue(
        self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send>> {
        {
            let mut state = self.state.lock().unwrap();
            state
                .queues
                .entry(self.queue.clone())
                .or_default()
                .push(QueuedMessage {
                    redelivered: true,
                    ..self.message.clone()
                });
        }
        notifier(&self.state, &self.queue).notify_one();
        Box::pin(async { Ok(()) })
    }
}

impl MessageQueue for InMemoryQueue {
    fn publish(
        &self,
        queue: &str,
        payload: &[u8],
        priority: u8,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + '_>> {
        {
            let mut state = self.state.lock().unwrap();
            state.published.push(PublishedMessage {
                queue: queue.to_string(),
                payload: payload.to_vec(),
                priority,
            });
            state
                .queues
                .entry(queue.to_string())
                .or_default()
                .push(QueuedMessage {
                    payload: payload.to_vec(),
                    priority,
                    redelivered: false,
                });
        }
        notifier(&self.state, queue).notify_one();
        Box::pin(async { Ok(()) })
    }

    fn consume(
        &self,
        queue: &str,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryStream, QueueError>> + Send + '_>> {
        let broker = self.clone();
        let queue = queue.to_string();

        Box::pin(async move {
            // Poll-or-park state machine: drain the queue, then wait on
            // this queue's notifier (a `notify_one` permit stored before
            // the wait is picked up immediately, so no publish is missed).
            let stream = futures::stream::unfold((broker, queue), |(broker, queue)| async move {
                let message = loop {
                    if let Some(message) = broker.pop_highest(&queue) {
                        break message;
                    }
                    notifier(&broker.state, &queue).notified().await;
                };

                let acker = Box::new(InMemoryAcker {
                    state: Arc::clone(&broker.state),
                    queue: queue.clone(),
                    message: message.clone(),
                });
                let delivery = Delivery::new(message.payload, message.redelivered, acker);
                Some((Ok(delivery), (broker, queue)))
            });
            Ok(Box::pin(stream) as DeliveryStream)
        })
    }
}

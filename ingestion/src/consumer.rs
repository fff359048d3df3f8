//! The event ingestion consumer loop.

use crate::folding::Folder;
use futures::StreamExt;
use shopstream_core::event::{Event, TopicSet};
use shopstream_core::event_bus::{BusError, EventBus, TopicMessage};
use shopstream_core::store::AggregateStore;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Errors that abort the ingestion consumer.
///
/// Per-message problems (decode failures, folding failures) never appear
/// here; they are logged and the loop continues.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The initial subscription could not be established.
    #[error("subscription failed: {0}")]
    Subscribe(#[from] BusError),

    /// The broker stream ended without a shutdown signal.
    #[error("topic stream closed unexpectedly")]
    StreamClosed,
}

/// Long-lived consumer folding the five analytics topics into aggregates.
///
/// One instance runs per worker process; handling within the merged
/// subscription is sequential, which preserves per-partition order.
pub struct EventIngestionConsumer {
    bus: Arc<dyn EventBus>,
    store: Arc<dyn AggregateStore>,
    topics: TopicSet,
}

impl EventIngestionConsumer {
    /// Consumer over the default topic names.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>, store: Arc<dyn AggregateStore>) -> Self {
        Self::with_topics(bus, store, TopicSet::default())
    }

    /// Consumer over explicit topic names.
    #[must_use]
    pub fn with_topics(
        bus: Arc<dyn EventBus>,
        store: Arc<dyn AggregateStore>,
        topics: TopicSet,
    ) -> Self {
        Self { bus, store, topics }
    }

    /// Run until the shutdown signal flips or the subscription dies.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Subscribe`] if the subscription cannot be
    /// established and [`IngestError::StreamClosed`] if the broker stream
    /// ends on its own; both are fatal and surface to the supervisor.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), IngestError> {
        let names = self.topics.names();
        let mut stream = self.bus.subscribe(&names).await?;
        let folder = Folder::new(Arc::clone(&self.store));

        tracing::info!(topics = ?names, "ingestion consumer started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("ingestion consumer shutting down");
                        return Ok(());
                    }
                }
                next = stream.next() => match next {
                    None => return Err(IngestError::StreamClosed),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "transport error on topic stream");
                    }
                    Some(Ok(message)) => self.handle(&folder, message).await,
                },
            }
        }
    }

    async fn handle(&self, folder: &Folder, message: TopicMessage) {
        let Some(kind) = self.topics.kind_of(&message.topic) else {
            tracing::warn!(topic = %message.topic, "message from unsubscribed topic, dropping");
            return;
        };

        // Malformed input is not recoverable by retrying: log and drop.
        let event = match Event::decode(kind, &message.payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    topic = %message.topic,
                    error = %e,
                    "dropping undecodable message"
                );
                return;
            }
        };

        // Folding failures are isolated to the offending message.
        if let Err(e) = folder.fold(&message.topic, &event, &message.payload).await {
            tracing::error!(
                topic = %message.topic,
                event_id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "folding failed for message"
            );
        } else {
            tracing::trace!(
                topic = %message.topic,
                event_type = %event.event_type,
                "event folded"
            );
        }
    }
}

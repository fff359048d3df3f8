//! Notification consumer tests: ack/requeue flow, priority ordering and
//! dead-lettering over the in-memory queue.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use serde_json::json;
use shopstream_alerting::{MAX_DELIVERY_ATTEMPTS, NotificationConsumer};
use shopstream_core::channel::NotificationChannel;
use shopstream_core::message::queues;
use shopstream_core::queue::MessageQueue;
use shopstream_testing::{InMemoryQueue, RecordingChannel};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn email_payload(recipient: &str, priority: Option<&str>) -> Vec<u8> {
    let mut payload = json!({
        "type": "email",
        "recipient": recipient,
        "subject": "subject",
        "template": "template",
        "data": {},
    });
    if let Some(priority) = priority {
        payload["priority"] = json!(priority);
    }
    payload.to_string().into_bytes()
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn spawn_consumer(
    queue: &Arc<InMemoryQueue>,
    email: &Arc<RecordingChannel>,
    queue_name: &'static str,
) -> (
    watch::Sender<bool>,
    tokio::task::JoinHandle<Result<(), shopstream_alerting::ConsumeError>>,
) {
    let consumer = NotificationConsumer::new(
        Arc::clone(queue) as Arc<dyn MessageQueue>,
        Arc::clone(email) as Arc<dyn NotificationChannel>,
    );
    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { consumer.run(queue_name, shutdown_rx).await });
    (shutdown, handle)
}

#[tokio::test]
async fn delivered_notifications_are_acked() {
    let queue = Arc::new(InMemoryQueue::new());
    let email = Arc::new(RecordingChannel::new("email"));
    queue
        .publish(queues::NOTIFICATIONS, &email_payload("a@example.com", None), 4)
        .await
        .unwrap();

    let (shutdown, handle) = spawn_consumer(&queue, &email, queues::NOTIFICATIONS);

    let q = Arc::clone(&queue);
    wait_until(move || q.ack_count() == 1).await;
    assert_eq!(email.sent().len(), 1);
    assert_eq!(queue.queue_len(queues::NOTIFICATIONS), 0);

    shutdown.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn higher_priority_notifications_are_processed_first() {
    let queue = Arc::new(InMemoryQueue::new());
    let email = Arc::new(RecordingChannel::new("email"));
    queue
        .publish(
            queues::NOTIFICATIONS,
            &email_payload("low@example.com", Some("low")),
            1,
        )
        .await
        .unwrap();
    queue
        .publish(
            queues::NOTIFICATIONS,
            &email_payload("critical@example.com", Some("critical")),
            8,
        )
        .await
        .unwrap();

    let (shutdown, handle) = spawn_consumer(&queue, &email, queues::NOTIFICATIONS);

    let q = Arc::clone(&queue);
    wait_until(move || q.ack_count() == 2).await;

    let sent = email.sent();
    assert_eq!(sent[0].recipient, "critical@example.com");
    assert_eq!(sent[1].recipient, "low@example.com");

    shutdown.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn poison_payload_is_dead_lettered_after_bounded_requeues() {
    let queue = Arc::new(InMemoryQueue::new());
    let email = Arc::new(RecordingChannel::new("email"));
    queue
        .publish(queues::NOTIFICATIONS, b"{ not a notification", 4)
        .await
        .unwrap();

    let (shutdown, handle) = spawn_consumer(&queue, &email, queues::NOTIFICATIONS);

    let dead_letter_queue = queues::dead_letter(queues::NOTIFICATIONS);
    let q = Arc::clone(&queue);
    let dlq = dead_letter_queue.clone();
    wait_until(move || q.published(&dlq).len() == 1).await;

    // The poison message left its queue exactly once, by the ack that
    // follows the dead-letter publish.
    assert_eq!(queue.ack_count(), 1);
    assert_eq!(queue.queue_len(queues::NOTIFICATIONS), 0);
    assert!(email.sent().is_empty());
    assert!(MAX_DELIVERY_ATTEMPTS >= 1);

    shutdown.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn failed_then_fixed_payloads_survive_requeue() {
    // A channel that declines everything models a transient outage; the
    // payload must come back on the same queue as a redelivery.
    let queue = Arc::new(InMemoryQueue::new());
    let declining = Arc::new(RecordingChannel::declining("email"));
    queue
        .publish(queues::NOTIFICATIONS, &email_payload("a@example.com", None), 4)
        .await
        .unwrap();

    let consumer = NotificationConsumer::new(
        Arc::clone(&queue) as Arc<dyn MessageQueue>,
        Arc::clone(&declining) as Arc<dyn NotificationChannel>,
    );
    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { consumer.run(queues::NOTIFICATIONS, shutdown_rx).await });

    // Every attempt reaches the channel until the message dead-letters.
    let channel = Arc::clone(&declining);
    wait_until(move || channel.sent().len() == MAX_DELIVERY_ATTEMPTS as usize).await;

    let q = Arc::clone(&queue);
    let dlq = queues::dead_letter(queues::NOTIFICATIONS);
    wait_until(move || q.published(&dlq).len() == 1).await;

    shutdown.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn alert_queue_messages_are_acked_without_channel_dispatch() {
    let queue = Arc::new(InMemoryQueue::new());
    let email = Arc::new(RecordingChannel::new("email"));
    let alert = json!({
        "type": "high-demand",
        "severity": "normal",
        "message": "Running Socks is in high demand",
        "data": {},
        "source": "business-rules",
        "timestamp": "2025-06-01T12:00:00Z",
    })
    .to_string()
    .into_bytes();
    queue.publish(queues::ALERTS, &alert, 4).await.unwrap();

    let (shutdown, handle) = spawn_consumer(&queue, &email, queues::ALERTS);

    let q = Arc::clone(&queue);
    wait_until(move || q.ack_count() == 1).await;
    assert!(email.sent().is_empty());

    shutdown.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

//! Alert rule engine tests over the in-memory store and queue.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use shopstream_alerting::engine::{AlertRuleEngine, LAST_TRIGGERED_KEY, RULES_KEY};
use shopstream_core::message::queues;
use shopstream_testing::{FixedClock, InMemoryAggregateStore, InMemoryQueue};
use std::sync::Arc;

fn engine() -> (AlertRuleEngine, InMemoryAggregateStore, Arc<InMemoryQueue>) {
    let store = InMemoryAggregateStore::new();
    let queue = Arc::new(InMemoryQueue::new());
    let clock = FixedClock::at(Utc.with_ymd_and_hms(2025, 6, 7, 12, 0, 0).unwrap());
    let engine = AlertRuleEngine::with_clock(
        Arc::new(store.clone()),
        Arc::clone(&queue) as Arc<dyn shopstream_core::queue::MessageQueue>,
        Arc::new(clock),
    );
    (engine, store, queue)
}

fn seed_rule(store: &InMemoryAggregateStore, rule: &Value) {
    store.seed_hash(
        RULES_KEY,
        rule["id"].as_str().unwrap(),
        &rule.to_string(),
    );
}

#[tokio::test]
async fn threshold_rule_triggers_above_threshold() {
    let (engine, store, queue) = engine();
    store.seed("analytics:events:total", "150");
    seed_rule(
        &store,
        &json!({
            "id": "rule-1",
            "name": "Event volume",
            "type": "threshold",
            "condition": "analytics:events:total",
            "threshold": 100.0,
            "enabled": true,
            "notificationType": "email",
            "recipients": ["ops@example.com", "oncall@example.com"],
        }),
    );

    let summary = engine.evaluate().await.unwrap();
    assert_eq!(summary.evaluated, 1);
    assert_eq!(summary.triggered, 1);
    assert_eq!(summary.failed, 0);

    // One notification per recipient, default priority.
    let published = queue.published(queues::NOTIFICATIONS);
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|p| p.priority == 4));

    let notification: Value = serde_json::from_slice(&published[0].payload).unwrap();
    assert_eq!(notification["type"], "email");
    assert_eq!(notification["template"], "custom-alert");
    assert_eq!(notification["data"]["ruleName"], "Event volume");

    // Trigger stamp recorded.
    assert!(store.hash_field(LAST_TRIGGERED_KEY, "rule-1").is_some());
}

#[tokio::test]
async fn threshold_rule_stays_quiet_below_threshold() {
    let (engine, store, queue) = engine();
    store.seed("analytics:events:total", "50");
    seed_rule(
        &store,
        &json!({
            "id": "rule-1",
            "name": "Event volume",
            "type": "threshold",
            "condition": "analytics:events:total",
            "threshold": 100.0,
            "enabled": true,
            "notificationType": "email",
            "recipients": ["ops@example.com"],
        }),
    );

    let summary = engine.evaluate().await.unwrap();
    assert_eq!(summary.triggered, 0);
    assert!(queue.published(queues::NOTIFICATIONS).is_empty());
    assert!(store.hash_field(LAST_TRIGGERED_KEY, "rule-1").is_none());
}

#[tokio::test]
async fn missing_metric_reads_as_zero() {
    let (engine, store, queue) = engine();
    seed_rule(
        &store,
        &json!({
            "id": "rule-1",
            "name": "Unset metric",
            "type": "threshold",
            "condition": "analytics:does:not:exist",
            "threshold": 0.5,
            "enabled": true,
            "notificationType": "email",
            "recipients": ["ops@example.com"],
        }),
    );

    let summary = engine.evaluate().await.unwrap();
    assert_eq!(summary.triggered, 0);
    assert!(queue.published(queues::NOTIFICATIONS).is_empty());
}

#[tokio::test]
async fn trend_rule_triggers_on_confident_decrease() {
    let (engine, store, queue) = engine();
    // Clock is pinned to 2025-06-07; seed a week of daily samples where
    // the last 3 days collapse.
    for (day, value) in [
        ("2025-06-01", "100"),
        ("2025-06-02", "100"),
        ("2025-06-03", "100"),
        ("2025-06-04", "100"),
        ("2025-06-05", "10"),
        ("2025-06-06", "10"),
        ("2025-06-07", "10"),
    ] {
        store.seed(&format!("analytics:daily:search.performed:{day}"), value);
    }
    seed_rule(
        &store,
        &json!({
            "id": "rule-trend",
            "name": "Search volume drop",
            "type": "trend",
            "condition": "search.performed",
            "enabled": true,
            "notificationType": "email",
            "recipients": ["ops@example.com"],
        }),
    );

    let summary = engine.evaluate().await.unwrap();
    assert_eq!(summary.triggered, 1);
    assert_eq!(queue.published(queues::NOTIFICATIONS).len(), 1);
}

#[tokio::test]
async fn trend_rule_ignores_low_confidence_decrease() {
    let (engine, store, queue) = engine();
    // -6% change: decreasing, but confidence 60 is under the floor.
    for (day, value) in [
        ("2025-06-01", "100"),
        ("2025-06-02", "100"),
        ("2025-06-03", "100"),
        ("2025-06-04", "100"),
        ("2025-06-05", "94"),
        ("2025-06-06", "94"),
        ("2025-06-07", "94"),
    ] {
        store.seed(&format!("analytics:daily:search.performed:{day}"), value);
    }
    seed_rule(
        &store,
        &json!({
            "id": "rule-trend",
            "name": "Search volume drop",
            "type": "trend",
            "condition": "search.performed",
            "enabled": true,
            "notificationType": "email",
            "recipients": ["ops@example.com"],
        }),
    );

    let summary = engine.evaluate().await.unwrap();
    assert_eq!(summary.triggered, 0);
    assert!(queue.published(queues::NOTIFICATIONS).is_empty());
}

#[tokio::test]
async fn disabled_rules_are_skipped() {
    let (engine, store, queue) = engine();
    store.seed("analytics:events:total", "150");
    seed_rule(
        &store,
        &json!({
            "id": "rule-1",
            "name": "Disabled",
            "type": "threshold",
            "condition": "analytics:events:total",
            "threshold": 100.0,
            "enabled": false,
            "notificationType": "email",
            "recipients": ["ops@example.com"],
        }),
    );

    let summary = engine.evaluate().await.unwrap();
    assert_eq!(summary.evaluated, 0);
    assert!(queue.published(queues::NOTIFICATIONS).is_empty());
}

#[tokio::test]
async fn anomaly_rules_are_accepted_but_not_evaluated() {
    let (engine, store, queue) = engine();
    seed_rule(
        &store,
        &json!({
            "id": "rule-anomaly",
            "name": "Anomaly",
            "type": "anomaly",
            "condition": "analytics:events:total",
            "enabled": true,
            "notificationType": "email",
            "recipients": ["ops@example.com"],
        }),
    );

    let summary = engine.evaluate().await.unwrap();
    assert_eq!(summary.evaluated, 1);
    assert_eq!(summary.triggered, 0);
    assert_eq!(summary.failed, 0);
    assert!(queue.published(queues::NOTIFICATIONS).is_empty());
}

#[tokio::test]
async fn one_bad_rule_does_not_stop_the_pass() {
    let (engine, store, queue) = engine();
    store.seed("analytics:events:total", "150");
    store.seed_hash(RULES_KEY, "rule-bad", "{ this is not json");
    seed_rule(
        &store,
        &json!({
            "id": "rule-good",
            "name": "Event volume",
            "type": "threshold",
            "condition": "analytics:events:total",
            "threshold": 100.0,
            "enabled": true,
            "notificationType": "email",
            "recipients": ["ops@example.com"],
        }),
    );

    let summary = engine.evaluate().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.triggered, 1);
    assert_eq!(queue.published(queues::NOTIFICATIONS).len(), 1);
}

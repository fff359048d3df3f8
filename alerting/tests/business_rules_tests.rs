//! Business-rule check tests over the in-memory queue.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use serde_json::Value;
use shopstream_alerting::BusinessRules;
use shopstream_alerting::rules::{MARKETING_RECIPIENT, OPS_RECIPIENT};
use shopstream_core::message::{Severity, queues};
use shopstream_core::queue::MessageQueue;
use shopstream_testing::{FixedClock, InMemoryQueue};
use std::sync::Arc;

fn rules() -> (BusinessRules, Arc<InMemoryQueue>) {
    let queue = Arc::new(InMemoryQueue::new());
    let clock = FixedClock::at(Utc.with_ymd_and_hms(2025, 6, 7, 12, 0, 0).unwrap());
    let rules = BusinessRules::with_clock(
        Arc::clone(&queue) as Arc<dyn MessageQueue>,
        Arc::new(clock),
    );
    (rules, queue)
}

#[tokio::test]
async fn zero_stock_is_critical() {
    let (rules, queue) = rules();
    let severity = rules
        .check_low_stock("prod-1", "Trail Boots", 0, None)
        .await
        .unwrap();
    assert_eq!(severity, Some(Severity::Critical));

    let alerts = queue.published(queues::ALERTS);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].priority, 8);
    let alert: Value = serde_json::from_slice(&alerts[0].payload).unwrap();
    assert_eq!(alert["type"], "low-stock");
    assert_eq!(alert["severity"], "critical");

    let notifications = queue.published(queues::NOTIFICATIONS);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].priority, 8);
    let notification: Value = serde_json::from_slice(&notifications[0].payload).unwrap();
    assert_eq!(notification["recipient"], OPS_RECIPIENT);
    assert_eq!(notification["template"], "low-stock");
}

#[tokio::test]
async fn low_but_nonzero_stock_is_high() {
    let (rules, queue) = rules();
    let severity = rules
        .check_low_stock("prod-1", "Trail Boots", 3, None)
        .await
        .unwrap();
    assert_eq!(severity, Some(Severity::High));
    assert_eq!(queue.published(queues::ALERTS)[0].priority, 8);
}

#[tokio::test]
async fn stock_above_threshold_is_quiet() {
    let (rules, queue) = rules();
    let severity = rules
        .check_low_stock("prod-1", "Trail Boots", 11, None)
        .await
        .unwrap();
    assert_eq!(severity, None);
    assert!(queue.published(queues::ALERTS).is_empty());
    assert!(queue.published(queues::NOTIFICATIONS).is_empty());
}

#[tokio::test]
async fn explicit_threshold_overrides_default() {
    let (rules, queue) = rules();
    let severity = rules
        .check_low_stock("prod-1", "Trail Boots", 20, Some(25))
        .await
        .unwrap();
    assert_eq!(severity, Some(Severity::High));
    assert_eq!(queue.published(queues::ALERTS).len(), 1);
}

#[tokio::test]
async fn high_demand_triggers_on_searches_alone() {
    let (rules, queue) = rules();
    let triggered = rules
        .check_high_demand("prod-2", "Running Socks", 10, 25)
        .await
        .unwrap();
    assert!(triggered);

    let notifications = queue.published(queues::NOTIFICATIONS);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].priority, 4);
    let notification: Value = serde_json::from_slice(&notifications[0].payload).unwrap();
    assert_eq!(notification["recipient"], MARKETING_RECIPIENT);
}

#[tokio::test]
async fn moderate_interest_is_not_high_demand() {
    let (rules, queue) = rules();
    let triggered = rules
        .check_high_demand("prod-2", "Running Socks", 49, 19)
        .await
        .unwrap();
    assert!(!triggered);
    assert!(queue.published(queues::ALERTS).is_empty());
}

#[tokio::test]
async fn large_price_change_is_high_severity_with_formatted_data() {
    let (rules, queue) = rules();
    let severity = rules
        .check_price_change("prod-3", "Headlamp", 10.0, 13.0)
        .await
        .unwrap();
    assert_eq!(severity, Some(Severity::High));

    let alert: Value =
        serde_json::from_slice(&queue.published(queues::ALERTS)[0].payload).unwrap();
    assert_eq!(alert["data"]["oldPrice"], "10.00");
    assert_eq!(alert["data"]["newPrice"], "13.00");
    assert_eq!(alert["data"]["changePercent"], "30.00");
}

#[tokio::test]
async fn moderate_price_change_is_normal_severity() {
    let (rules, queue) = rules();
    let severity = rules
        .check_price_change("prod-3", "Headlamp", 10.0, 11.5)
        .await
        .unwrap();
    assert_eq!(severity, Some(Severity::Normal));
    assert_eq!(queue.published(queues::ALERTS)[0].priority, 4);
}

#[tokio::test]
async fn small_price_change_is_quiet() {
    let (rules, queue) = rules();
    let severity = rules
        .check_price_change("prod-3", "Headlamp", 10.0, 10.5)
        .await
        .unwrap();
    assert_eq!(severity, None);
    assert!(queue.published(queues::ALERTS).is_empty());
}

#[tokio::test]
async fn price_drop_triggers_on_absolute_change() {
    let (rules, _queue) = rules();
    let severity = rules
        .check_price_change("prod-3", "Headlamp", 10.0, 7.0)
        .await
        .unwrap();
    assert_eq!(severity, Some(Severity::High));
}

#[tokio::test]
async fn nonpositive_old_price_is_ignored() {
    let (rules, queue) = rules();
    let severity = rules
        .check_price_change("prod-3", "Headlamp", 0.0, 5.0)
        .await
        .unwrap();
    assert_eq!(severity, None);
    assert!(queue.published(queues::ALERTS).is_empty());
}

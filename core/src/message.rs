//! Notification, alert and alert-rule payloads.
//!
//! These are the wire shapes carried by the durable queues and the
//! `alerts:rules` hash. Field names follow the producers' camelCase JSON
//! convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Queue names consumed by the notification consumer.
pub mod queues {
    /// General notification queue.
    pub const NOTIFICATIONS: &str = "notifications";
    /// Business-rule and engine alerts.
    pub const ALERTS: &str = "alerts";
    /// Email-only notification queue.
    pub const EMAIL: &str = "email-notifications";

    /// Dead-letter destination for a queue, used once a message has
    /// exhausted its delivery attempts.
    #[must_use]
    pub fn dead_letter(queue: &str) -> String {
        format!("{queue}.dead-letter")
    }
}

/// Broker priority assigned to messages without an explicit priority.
pub const DEFAULT_QUEUE_PRIORITY: u8 = 4;

/// Notification delivery channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    /// Delivered through the external mail contract.
    Email,
    /// Delivered through the SMS channel.
    Sms,
    /// Delivered through the webhook channel.
    Webhook,
}

/// Notification priority, mapped onto broker message priority at publish
/// time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background traffic.
    Low,
    /// Default.
    Normal,
    /// Deliver ahead of normal traffic.
    High,
    /// Operational emergencies.
    Critical,
}

impl Priority {
    /// Broker message priority for this level.
    ///
    /// The mapping (`critical|high → 8`, `normal → 4`, `low → 1`) must be
    /// preserved exactly; it determines delivery order under broker-level
    /// priority scheduling.
    #[must_use]
    pub const fn queue_priority(self) -> u8 {
        match self {
            Self::Critical | Self::High => 8,
            Self::Normal => 4,
            Self::Low => 1,
        }
    }
}

/// Broker priority for an optional notification priority; unspecified
/// maps to [`DEFAULT_QUEUE_PRIORITY`].
#[must_use]
pub fn queue_priority(priority: Option<Priority>) -> u8 {
    priority.map_or(DEFAULT_QUEUE_PRIORITY, Priority::queue_priority)
}

/// Alert severity. Shares the broker priority mapping with [`Priority`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Low,
    /// Default.
    Normal,
    /// Needs attention soon.
    High,
    /// Needs attention now.
    Critical,
}

impl Severity {
    /// Broker message priority for alert messages of this severity.
    #[must_use]
    pub const fn queue_priority(self) -> u8 {
        match self {
            Self::Critical | Self::High => 8,
            Self::Normal => 4,
            Self::Low => 1,
        }
    }
}

/// A notification to be delivered through an external channel.
///
/// Created by the business-rule checks and the alert rule engine,
/// consumed once per delivery by the notification consumer, not
/// persisted after delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    /// Which channel delivers the notification.
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Channel-specific recipient (address, number, URL).
    pub recipient: String,
    /// Human-readable subject line.
    pub subject: String,
    /// Template name resolved by the external renderer.
    pub template: String,
    /// Template data.
    #[serde(default)]
    pub data: Value,
    /// Optional delivery priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Optional scheduled delivery time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// A business or rule alert recorded alongside its notification.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertMessage {
    /// Alert category, e.g. `low-stock`.
    #[serde(rename = "type")]
    pub alert_type: String,
    /// How urgent the alert is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Structured alert context.
    #[serde(default)]
    pub data: Value,
    /// The component that raised the alert.
    pub source: String,
    /// When the alert was raised.
    pub timestamp: DateTime<Utc>,
}

/// Alert rule evaluation strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Trigger when a metric exceeds a fixed threshold.
    Threshold,
    /// Trigger on a decreasing multi-day trend.
    Trend,
    /// Accepted on decode but not evaluated by this engine.
    Anomaly,
}

/// A persisted alert rule definition.
///
/// Created and updated through an external administrative surface; this
/// system only reads enabled rules and writes nothing back except via the
/// notification publish path.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    /// Rule id, also the hash field the rule is stored under.
    pub id: String,
    /// Display name, included in triggered notifications.
    pub name: String,
    /// Evaluation strategy.
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// The metric key the rule watches.
    pub condition: String,
    /// Threshold value, required for threshold rules.
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Disabled rules are skipped without evaluation.
    pub enabled: bool,
    /// Channel for triggered notifications.
    pub notification_type: NotificationType,
    /// Recipients, one notification each on trigger.
    #[serde(default)]
    pub recipients: Vec<String>,
}

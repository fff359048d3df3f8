//! Evaluation of persisted alert rules.
//!
//! Rules live as JSON values in the `alerts:rules` hash, written by an
//! external administrative surface. Each `evaluate` pass reads the whole
//! hash, evaluates every enabled rule against the aggregate store and
//! publishes notifications for the rules that trigger. One failing rule
//! never stops the rest of the pass.

use crate::trend::{TrendDirection, compute_trend};
use chrono::Duration as ChronoDuration;
use serde_json::json;
use shopstream_core::clock::{Clock, SystemClock};
use shopstream_core::message::{
    AlertRule, NotificationMessage, NotificationType, RuleType, queue_priority, queues,
};
use shopstream_core::queue::{MessageQueue, QueueError};
use shopstream_core::store::{AggregateStore, StoreError, daily_sample_key};
use std::sync::Arc;
use thiserror::Error;

/// Hash holding the persisted alert rules (field = rule id, value = JSON).
pub const RULES_KEY: &str = "alerts:rules";

/// Hash stamping when each rule last triggered.
pub const LAST_TRIGGERED_KEY: &str = "alerts:last";

/// Days of samples a trend rule reads (today inclusive).
const TREND_WINDOW_DAYS: i64 = 7;

/// Confidence a decreasing trend must exceed to trigger.
const TREND_CONFIDENCE_FLOOR: f64 = 70.0;

/// Errors raised by alert evaluation and business-rule checks.
#[derive(Error, Debug)]
pub enum AlertError {
    /// The aggregate store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A notification or alert could not be published.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// A payload could not be encoded.
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outcome counts of one evaluation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    /// Enabled rules that were evaluated.
    pub evaluated: usize,
    /// Rules that triggered notifications.
    pub triggered: usize,
    /// Rules that failed to decode or evaluate.
    pub failed: usize,
}

/// Evaluates persisted threshold and trend rules.
pub struct AlertRuleEngine {
    store: Arc<dyn AggregateStore>,
    queue: Arc<dyn MessageQueue>,
    clock: Arc<dyn Clock>,
}

impl AlertRuleEngine {
    /// Engine on the wall clock.
    #[must_use]
    pub fn new(store: Arc<dyn AggregateStore>, queue: Arc<dyn MessageQueue>) -> Self {
        Self::with_clock(store, queue, Arc::new(SystemClock))
    }

    /// Engine with an injected clock (trend tests pin "today").
    #[must_use]
    pub fn with_clock(
        store: Arc<dyn AggregateStore>,
        queue: Arc<dyn MessageQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            queue,
            clock,
        }
    }

    /// Run one evaluation pass over all persisted rules.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::Store`] only when the rule hash itself cannot
    /// be read; per-rule failures are logged and counted in the summary.
    pub async fn evaluate(&self) -> Result<EvaluationSummary, AlertError> {
        let raw_rules = self.store.hgetall(RULES_KEY).await?;
        let mut summary = EvaluationSummary::default();

        for (id, raw) in raw_rules {
            let rule: AlertRule = match serde_json::from_str(&raw) {
                Ok(rule) => rule,
                Err(e) => {
                    tracing::warn!(rule_id = %id, error = %e, "undecodable alert rule, skipping");
                    summary.failed += 1;
                    continue;
                }
            };

            if !rule.enabled {
                continue;
            }
            summary.evaluated += 1;

            match self.evaluate_rule(&rule).await {
                Ok(true) => summary.triggered += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, error = %e, "rule evaluation failed");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            evaluated = summary.evaluated,
            triggered = summary.triggered,
            failed = summary.failed,
            "alert rule pass complete"
        );
        Ok(summary)
    }

    async fn evaluate_rule(&self, rule: &AlertRule) -> Result<bool, AlertError> {
        let triggered_message = match rule.rule_type {
            RuleType::Threshold => self.check_threshold(rule).await?,
            RuleType::Trend => self.check_trend(rule).await?,
            RuleType::Anomaly => {
                tracing::warn!(rule_id = %rule.id, "anomaly rules are not evaluated, skipping");
                None
            }
        };

        match triggered_message {
            Some(message) => {
                self.trigger(rule, &message).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn check_threshold(&self, rule: &AlertRule) -> Result<Option<String>, AlertError> {
        let Some(threshold) = rule.threshold else {
            tracing::warn!(rule_id = %rule.id, "threshold rule without a threshold, skipping");
            return Ok(None);
        };

        let current = self
            .store
            .get(&rule.condition)
            .await?
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);

        if current > threshold {
            Ok(Some(format!(
                "{} is {current:.2}, above threshold {threshold:.2}",
                rule.condition
            )))
        } else {
            Ok(None)
        }
    }

    async fn check_trend(&self, rule: &AlertRule) -> Result<Option<String>, AlertError> {
        let samples = self.daily_samples(&rule.condition).await?;
        let trend = compute_trend(&samples);

        if trend.direction == TrendDirection::Decreasing
            && trend.confidence > TREND_CONFIDENCE_FLOOR
        {
            Ok(Some(format!(
                "{} is decreasing {:.1}% over {TREND_WINDOW_DAYS} days (confidence {:.0}%)",
                rule.condition,
                trend.change_percent.abs(),
                trend.confidence
            )))
        } else {
            Ok(None)
        }
    }

    /// Daily samples for the trend window, oldest first, today inclusive.
    /// Absent days read as zero.
    async fn daily_samples(&self, metric: &str) -> Result<Vec<f64>, AlertError> {
        let today = self.clock.now();
        let mut samples = Vec::with_capacity(TREND_WINDOW_DAYS as usize);

        for age in (0..TREND_WINDOW_DAYS).rev() {
            let day = today - ChronoDuration::days(age);
            let value = self
                .store
                .get(&daily_sample_key(metric, day))
                .await?
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0);
            samples.push(value);
        }
        Ok(samples)
    }

    async fn trigger(&self, rule: &AlertRule, message: &str) -> Result<(), AlertError> {
        let now = self.clock.now();

        for recipient in &rule.recipients {
            let notification = NotificationMessage {
                notification_type: NotificationType::Email,
                recipient: recipient.clone(),
                subject: format!("Alert: {}", rule.name),
                template: "custom-alert".to_string(),
                data: json!({
                    "ruleName": rule.name,
                    "message": message,
                    "timestamp": now,
                }),
                priority: None,
                scheduled_at: None,
            };

            self.queue
                .publish(
                    queues::NOTIFICATIONS,
                    &serde_json::to_vec(&notification)?,
                    queue_priority(notification.priority),
                )
                .await?;
        }

        self.store
            .hset(LAST_TRIGGERED_KEY, &rule.id, &now.to_rfc3339())
            .await?;

        tracing::info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            recipients = rule.recipients.len(),
            "alert rule triggered"
        );
        Ok(())
    }
}

//! Reactive business-rule checks.
//!
//! Invoked by inventory and pricing flows as state changes. Each
//! triggered check publishes a pair: an [`AlertMessage`] on the `alerts`
//! queue and an email [`NotificationMessage`] on the `notifications`
//! queue, both at the severity's broker priority.

use crate::engine::AlertError;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use shopstream_core::clock::{Clock, SystemClock};
use shopstream_core::message::{
    AlertMessage, NotificationMessage, NotificationType, Priority, Severity, queue_priority,
    queues,
};
use shopstream_core::queue::MessageQueue;
use std::sync::Arc;

/// Recipient of operational (stock) notifications.
pub const OPS_RECIPIENT: &str = "ops@shopstream.example";
/// Recipient of demand notifications.
pub const MARKETING_RECIPIENT: &str = "marketing@shopstream.example";

/// Default low-stock threshold.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;
/// 24h views at or above which a product counts as high demand.
pub const HIGH_DEMAND_VIEWS: i64 = 50;
/// 24h searches at or above which a product counts as high demand.
pub const HIGH_DEMAND_SEARCHES: i64 = 20;
/// Relative price change at which a price alert triggers.
pub const PRICE_CHANGE_TRIGGER: f64 = 0.10;
/// Relative price change at which a price alert is high severity.
pub const PRICE_CHANGE_HIGH: f64 = 0.25;

/// Reactive business-rule checks over the queue broker.
pub struct BusinessRules {
    queue: Arc<dyn MessageQueue>,
    clock: Arc<dyn Clock>,
}

impl BusinessRules {
    /// Checks on the wall clock.
    #[must_use]
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self::with_clock(queue, Arc::new(SystemClock))
    }

    /// Checks with an injected clock.
    #[must_use]
    pub fn with_clock(queue: Arc<dyn MessageQueue>, clock: Arc<dyn Clock>) -> Self {
        Self { queue, clock }
    }

    /// Low-stock check: triggers when `inventory_count <= threshold`
    /// (default 10). Returns the severity raised, `None` when stock is
    /// fine.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::Queue`] when either publish fails.
    pub async fn check_low_stock(
        &self,
        product_id: &str,
        product_name: &str,
        inventory_count: i64,
        threshold: Option<i64>,
    ) -> Result<Option<Severity>, AlertError> {
        let threshold = threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        if inventory_count > threshold {
            return Ok(None);
        }

        let severity = if inventory_count == 0 {
            Severity::Critical
        } else {
            Severity::High
        };
        let data = json!({
            "productId": product_id,
            "productName": product_name,
            "inventoryCount": inventory_count,
            "threshold": threshold,
        });

        self.publish_pair(
            "low-stock",
            severity,
            &format!("{product_name} has {inventory_count} units left"),
            data,
            OPS_RECIPIENT,
            &format!("Low stock: {product_name}"),
            "low-stock",
        )
        .await?;

        Ok(Some(severity))
    }

    /// High-demand check: triggers when 24h views or searches cross
    /// their thresholds. Returns whether it triggered.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::Queue`] when either publish fails.
    pub async fn check_high_demand(
        &self,
        product_id: &str,
        product_name: &str,
        views_24h: i64,
        searches_24h: i64,
    ) -> Result<bool, AlertError> {
        if views_24h < HIGH_DEMAND_VIEWS && searches_24h < HIGH_DEMAND_SEARCHES {
            return Ok(false);
        }

        let data = json!({
            "productId": product_id,
            "productName": product_name,
            "views24h": views_24h,
            "searches24h": searches_24h,
        });

        self.publish_pair(
            "high-demand",
            Severity::Normal,
            &format!("{product_name} is in high demand"),
            data,
            MARKETING_RECIPIENT,
            &format!("High demand: {product_name}"),
            "high-demand",
        )
        .await?;

        Ok(true)
    }

    /// Price-change check: triggers when the relative change reaches 10%,
    /// high severity at 25%. Returns the severity raised, `None` below
    /// the trigger (or when the old price is not positive).
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::Queue`] when either publish fails.
    pub async fn check_price_change(
        &self,
        product_id: &str,
        product_name: &str,
        old_price: f64,
        new_price: f64,
    ) -> Result<Option<Severity>, AlertError> {
        if old_price <= 0.0 {
            return Ok(None);
        }

        let change = ((new_price - old_price) / old_price).abs();
        if change < PRICE_CHANGE_TRIGGER {
            return Ok(None);
        }

        let severity = if change >= PRICE_CHANGE_HIGH {
            Severity::High
        } else {
            Severity::Normal
        };
        let data = json!({
            "productId": product_id,
            "productName": product_name,
            "oldPrice": format!("{old_price:.2}"),
            "newPrice": format!("{new_price:.2}"),
            "changePercent": format!("{:.2}", change * 100.0),
        });

        self.publish_pair(
            "price-change",
            severity,
            &format!("{product_name} price changed by {:.2}%", change * 100.0),
            data,
            OPS_RECIPIENT,
            &format!("Price change: {product_name}"),
            "price-change",
        )
        .await?;

        Ok(Some(severity))
    }

    #[allow(clippy::too_many_arguments)]
    async fn publish_pair(
        &self,
        alert_type: &str,
        severity: Severity,
        message: &str,
        data: Value,
        recipient: &str,
        subject: &str,
        template: &str,
    ) -> Result<(), AlertError> {
        let now: DateTime<Utc> = self.clock.now();

        let alert = AlertMessage {
            alert_type: alert_type.to_string(),
            severity,
            message: message.to_string(),
            data: data.clone(),
            source: "business-rules".to_string(),
            timestamp: now,
        };
        self.queue
            .publish(
                queues::ALERTS,
                &serde_json::to_vec(&alert)?,
                severity.queue_priority(),
            )
            .await?;

        let priority = match severity {
            Severity::Critical => Priority::Critical,
            Severity::High => Priority::High,
            Severity::Normal => Priority::Normal,
            Severity::Low => Priority::Low,
        };
        let notification = NotificationMessage {
            notification_type: NotificationType::Email,
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            template: template.to_string(),
            data,
            priority: Some(priority),
            scheduled_at: None,
        };
        self.queue
            .publish(
                queues::NOTIFICATIONS,
                &serde_json::to_vec(&notification)?,
                queue_priority(notification.priority),
            )
            .await?;

        tracing::info!(
            alert_type = alert_type,
            severity = ?severity,
            message = message,
            "business rule triggered"
        );
        Ok(())
    }
}

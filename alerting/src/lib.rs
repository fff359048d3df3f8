//! # Shopstream Alerting
//!
//! The alerting side of the analytics workers:
//!
//! - [`engine::AlertRuleEngine`] — evaluates persisted threshold and
//!   trend rules against the aggregate store
//! - [`rules::BusinessRules`] — reactive low-stock, high-demand and
//!   price-change checks
//! - [`consumer::NotificationConsumer`] — drains the durable notification
//!   queues, dispatching by channel type with bounded redelivery
//! - [`trend`] — the shared multi-day trend algorithm

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Stub notification channels (and a logging email default).
pub mod channels;
/// The notification queue consumer.
pub mod consumer;
/// The persisted-rule evaluation engine.
pub mod engine;
/// Reactive business-rule checks.
pub mod rules;
/// The shared trend algorithm.
pub mod trend;

pub use consumer::{MAX_DELIVERY_ATTEMPTS, ConsumeError, NotificationConsumer};
pub use engine::{AlertError, AlertRuleEngine, EvaluationSummary};
pub use rules::BusinessRules;
pub use trend::{Trend, TrendDirection, compute_trend};

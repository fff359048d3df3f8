//! # Shopstream Core
//!
//! Core traits and types for the shopstream analytics workers.
//!
//! This crate provides the seams between the consumers and their external
//! collaborators:
//!
//! - [`event::Event`] — the typed domain event decoded from stream topics
//! - [`event_bus::EventBus`] — publish/subscribe over stream topics
//! - [`store::AggregateStore`] — atomic counters, hashes and capped logs
//! - [`queue::MessageQueue`] — durable queues with manual acknowledgement
//! - [`channel::NotificationChannel`] — the external `send -> delivered` contract
//! - [`message`] — notification, alert and alert-rule payloads
//!
//! ## Architecture Principles
//!
//! - Explicit, dependency-injected clients (no module-level singletons)
//! - Transport layers yield raw bytes; consumers own decoding
//! - At-least-once delivery everywhere; handlers tolerate duplicates
//! - Dyn-compatible traits so consumers hold `Arc<dyn Trait>` handles

/// Notification channel contract (email/sms/webhook senders).
pub mod channel;
/// Clock abstraction for testable time.
pub mod clock;
/// Typed domain events and topic mapping.
pub mod event;
/// Event bus abstraction over stream topics.
pub mod event_bus;
/// Notification, alert and alert-rule payloads.
pub mod message;
/// Durable message queue abstraction with manual acknowledgement.
pub mod queue;
/// Aggregate key/value store abstraction.
pub mod store;

pub use channel::{ChannelError, NotificationChannel};
pub use clock::{Clock, SystemClock};
pub use event::{Event, EventError, EventKind, TopicKind, TopicSet};
pub use event_bus::{BusError, EventBus, TopicMessage, TopicStream};
pub use message::{AlertMessage, AlertRule, NotificationMessage, NotificationType, Priority, RuleType, Severity};
pub use queue::{Acknowledger, Delivery, DeliveryStream, MessageQueue, QueueError};
pub use store::{AggregateStore, StoreError, daily_sample_key};

//! # Shopstream Testing
//!
//! In-memory test doubles for the shopstream workers. Everything here is
//! deterministic and runs without external services:
//!
//! - [`InMemoryAggregateStore`] — HashMap-backed [`AggregateStore`]
//! - [`InMemoryEventBus`] — channel-fanout [`EventBus`]
//! - [`InMemoryQueue`] — priority-ordered [`MessageQueue`] with manual acks
//! - [`RecordingChannel`] / [`FailingChannel`] — notification channel doubles
//! - [`FixedClock`] — pinned [`Clock`] for trend evaluation tests
//!
//! [`AggregateStore`]: shopstream_core::store::AggregateStore
//! [`EventBus`]: shopstream_core::event_bus::EventBus
//! [`MessageQueue`]: shopstream_core::queue::MessageQueue
//! [`Clock`]: shopstream_core::clock::Clock

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// In-memory event bus with channel fanout.
pub mod bus;
/// Notification channel doubles.
pub mod channel;
/// Pinned clock.
pub mod clock;
/// In-memory priority queue with manual acknowledgement.
pub mod queue;
/// In-memory aggregate store.
pub mod store;

pub use bus::InMemoryEventBus;
pub use channel::{FailingChannel, RecordingChannel};
pub use clock::FixedClock;
pub use queue::InMemoryQueue;
pub use store::InMemoryAggregateStore;

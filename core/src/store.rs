//! Aggregate key/value store abstraction.
//!
//! The store holds every aggregate the consumers fold into: scalar
//! counters, per-entity hashes and capped rolling logs. All mutation goes
//! through the store's atomic primitives (`INCR`, `HINCRBY`, ...), so
//! concurrent folding from multiple topics is safe without external
//! locking. The only non-atomic compound is [`AggregateStore::push_capped`]
//! (push then trim) — under concurrent writers a log can transiently
//! exceed its cap, which is acceptable for an operational log.
//!
//! # Implementations
//!
//! - `RedisAggregateStore` (`shopstream-redis`) — production
//! - `InMemoryAggregateStore` (`shopstream-testing`) — tests
//!
//! # Dyn Compatibility
//!
//! Methods return explicit `Pin<Box<dyn Future>>` so consumers can hold
//! `Arc<dyn AggregateStore>` handles. Implementations clone borrowed
//! arguments before moving into the async block.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Key of the daily sample counter for a metric on a given day.
///
/// Written by ingestion folding, read back by trend evaluation; both
/// sides must agree on the format.
#[must_use]
pub fn daily_sample_key(metric: &str, day: DateTime<Utc>) -> String {
    format!("analytics:daily:{}:{}", metric, day.format("%Y-%m-%d"))
}

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Could not reach the store.
    #[error("store connection failed: {0}")]
    ConnectionFailed(String),

    /// A command was rejected or failed mid-flight.
    #[error("store command failed: {0}")]
    Command(String),

    /// A key held a value of an unexpected type.
    #[error("unexpected value type at key '{key}': {reason}")]
    TypeMismatch {
        /// The offending key.
        key: String,
        /// What the store reported.
        reason: String,
    },
}

/// Boxed future returned by [`AggregateStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Counter/hash/list-backed key/value store.
///
/// The leaf dependency of the whole pipeline: shared, mutably, by every
/// handler. No transactions span multiple keys; the only isolation
/// guarantee is per-key atomicity of the primitive operations.
pub trait AggregateStore: Send + Sync {
    /// Atomically increment the integer at `key` by `by`, returning the
    /// new value. Missing keys start at zero.
    fn incr(&self, key: &str, by: i64) -> StoreFuture<'_, i64>;

    /// Atomically increment the integer at `field` inside the hash at
    /// `key`, returning the new value.
    fn hincr(&self, key: &str, field: &str, by: i64) -> StoreFuture<'_, i64>;

    /// Set a hash field to a string value.
    fn hset(&self, key: &str, field: &str, value: &str) -> StoreFuture<'_, ()>;

    /// Read a single hash field.
    fn hget(&self, key: &str, field: &str) -> StoreFuture<'_, Option<String>>;

    /// Read an entire hash.
    fn hgetall(&self, key: &str) -> StoreFuture<'_, HashMap<String, String>>;

    /// Read a plain string key.
    fn get(&self, key: &str) -> StoreFuture<'_, Option<String>>;

    /// Set a plain string key, optionally with a time-to-live.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreFuture<'_, ()>;

    /// Push `entry` onto the front of the list at `key`, then trim the
    /// list to at most `cap` entries (most-recent-first).
    ///
    /// Push and trim are two operations, not one atomic step; the cap is
    /// an eventual bound, not an instantaneous one.
    fn push_capped(&self, key: &str, entry: &str, cap: usize) -> StoreFuture<'_, ()>;

    /// Read a list slice using inclusive indices (`-1` meaning the end).
    fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreFuture<'_, Vec<String>>;
}

//! Redis-backed aggregate store for shopstream.
//!
//! Implements [`AggregateStore`] on top of `redis::aio::ConnectionManager`
//! (connection pooling with automatic reconnection). Every trait method
//! maps onto a single Redis primitive except `push_capped`, which is
//! `LPUSH` followed by `LTRIM` — deliberately two commands, so the log cap
//! is an eventual bound under concurrent writers.
//!
//! # Example
//!
//! ```no_run
//! use shopstream_redis::RedisAggregateStore;
//! use shopstream_core::store::AggregateStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisAggregateStore::new("redis://127.0.0.1:6379").await?;
//! store.incr("analytics:events:product.created", 1).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use shopstream_core::store::{AggregateStore, StoreError, StoreFuture};
use std::collections::HashMap;
use std::time::Duration;

fn command_err(op: &str, key: &str, e: &redis::RedisError) -> StoreError {
    StoreError::Command(format!("{op} {key}: {e}"))
}

/// Redis-backed implementation of [`AggregateStore`].
///
/// Cloning is cheap; the underlying `ConnectionManager` multiplexes one
/// connection and reconnects on its own after the initial connect
/// succeeds. Initial connection failures are the caller's to retry (the
/// connection supervisor owns that policy).
#[derive(Clone)]
pub struct RedisAggregateStore {
    conn_manager: ConnectionManager,
}

impl RedisAggregateStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if the URL is invalid or
    /// the initial connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| {
            StoreError::ConnectionFailed(format!("failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::ConnectionFailed(format!("failed to connect to Redis: {e}"))
        })?;

        tracing::info!(url = %redis_url, "aggregate store connected");

        Ok(Self { conn_manager })
    }
}

impl AggregateStore for RedisAggregateStore {
    fn incr(&self, key: &str, by: i64) -> StoreFuture<'_, i64> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        Box::pin(async move {
            conn.incr(&key, by)
                .await
                .map_err(|e| command_err("INCRBY", &key, &e))
        })
    }

    fn hincr(&self, key: &str, field: &str, by: i64) -> StoreFuture<'_, i64> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        let field = field.to_string();
        Box::pin(async move {
            conn.hincr(&key, &field, by)
                .await
                .map_err(|e| command_err("HINCRBY", &key, &e))
        })
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> StoreFuture<'_, ()> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        let field = field.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let _: () = conn
                .hset(&key, &field, &value)
                .await
                .map_err(|e| command_err("HSET", &key, &e))?;
            Ok(())
        })
    }

    fn hget(&self, key: &str, field: &str) -> StoreFuture<'_, Option<String>> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        let field = field.to_string();
        Box::pin(async move {
            conn.hget(&key, &field)
                .await
                .map_err(|e| command_err("HGET", &key, &e))
        })
    }

    fn hgetall(&self, key: &str) -> StoreFuture<'_, HashMap<String, String>> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        Box::pin(async move {
            conn.hgetall(&key)
                .await
                .map_err(|e| command_err("HGETALL", &key, &e))
        })
    }

    fn get(&self, key: &str) -> StoreFuture<'_, Option<String>> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        Box::pin(async move {
            conn.get(&key)
                .await
                .map_err(|e| command_err("GET", &key, &e))
        })
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreFuture<'_, ()> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            match ttl {
                Some(ttl) => {
                    let _: () = conn
                        .set_ex(&key, &value, ttl.as_secs())
                        .await
                        .map_err(|e| command_err("SETEX", &key, &e))?;
                }
                None => {
                    let _: () = conn
                        .set(&key, &value)
                        .await
                        .map_err(|e| command_err("SET", &key, &e))?;
                }
            }
            Ok(())
        })
    }

    fn push_capped(&self, key: &str, entry: &str, cap: usize) -> StoreFuture<'_, ()> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        let entry = entry.to_string();
        Box::pin(async move {
            let _: () = conn
                .lpush(&key, &entry)
                .await
                .map_err(|e| command_err("LPUSH", &key, &e))?;

            // Separate trim; the cap is an eventual bound, not atomic
            // with the push.
            let stop = isize::try_from(cap).unwrap_or(isize::MAX).saturating_sub(1);
            let _: () = conn
                .ltrim(&key, 0, stop)
                .await
                .map_err(|e| command_err("LTRIM", &key, &e))?;
            Ok(())
        })
    }

    fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreFuture<'_, Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        Box::pin(async move {
            conn.lrange(&key, start, stop)
                .await
                .map_err(|e| command_err("LRANGE", &key, &e))
        })
    }
}

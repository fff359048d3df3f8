//! In-memory aggregate store for fast, deterministic tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use shopstream_core::store::{AggregateStore, StoreError, StoreFuture};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct StoreState {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, Vec<String>>,
}

/// HashMap-backed implementation of [`AggregateStore`].
///
/// Mirrors the per-key atomicity of the production store (one mutex
/// guards everything, so each operation is atomic) and the push-then-trim
/// behaviour of capped logs. TTLs are accepted and ignored.
///
/// # Example
///
/// ```
/// use shopstream_testing::InMemoryAggregateStore;
/// use shopstream_core::store::AggregateStore;
///
/// # async fn example() {
/// let store = InMemoryAggregateStore::new();
/// store.incr("analytics:events:total", 1).await.unwrap();
/// assert_eq!(store.counter("analytics:events:total"), 1);
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryAggregateStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryAggregateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of an integer counter (0 when unset).
    #[must_use]
    pub fn counter(&self, key: &str) -> i64 {
        self.state
            .lock()
            .unwrap()
            .strings
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Current value of a hash field.
    #[must_use]
    pub fn hash_field(&self, key: &str, field: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .hashes
            .get(key)
            .and_then(|h| h.get(field).cloned())
    }

    /// Length of the list at `key` (0 when unset).
    #[must_use]
    pub fn list_len(&self, key: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .lists
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Seed a plain string key.
    pub fn seed(&self, key: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .strings
            .insert(key.to_string(), value.to_string());
    }

    /// Seed a hash field.
    pub fn seed_hash(&self, key: &str, field: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }
}

fn incr_string(current: Option<&String>, key: &str, by: i64) -> Result<i64, StoreError> {
    let base = match current {
        None => 0,
        Some(v) => v.parse::<i64>().map_err(|e| StoreError::TypeMismatch {
            key: key.to_string(),
            reason: e.to_string(),
        })?,
    };
    Ok(base + by)
}

impl AggregateStore for InMemoryAggregateStore {
    fn incr(&self, key: &str, by: i64) -> StoreFuture<'_, i64> {
        let result = {
            let mut state = self.state.lock().unwrap();
            incr_string(state.strings.get(key), key, by).map(|next| {
                state.strings.insert(key.to_string(), next.to_string());
                next
            })
        };
        Box::pin(async move { result })
    }

    fn hincr(&self, key: &str, field: &str, by: i64) -> StoreFuture<'_, i64> {
        let result = {
            let mut state = self.state.lock().unwrap();
            let hash = state.hashes.entry(key.to_string()).or_default();
            incr_string(hash.get(field), key, by).map(|next| {
                hash.insert(field.to_string(), next.to_string());
                next
            })
        };
        Box::pin(async move { result })
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> StoreFuture<'_, ()> {
        self.seed_hash(key, field, value);
        Box::pin(async { Ok(()) })
    }

    fn hget(&self, key: &str, field: &str) -> StoreFuture<'_, Option<String>> {
        let value = self.hash_field(key, field);
        Box::pin(async move { Ok(value) })
    }

    fn hgetall(&self, key: &str) -> StoreFuture<'_, HashMap<String, String>> {
        let hash = self
            .state
            .lock()
            .unwrap()
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default();
        Box::pin(async move { Ok(hash) })
    }

    fn get(&self, key: &str) -> StoreFuture<'_, Option<String>> {
        let value = self.state.lock().unwrap().strings.get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> StoreFuture<'_, ()> {
        self.seed(key, value);
        Box::pin(async { Ok(()) })
    }

    fn push_capped(&self, key: &str, entry: &str, cap: usize) -> StoreFuture<'_, ()> {
        {
            let mut state = self.state.lock().unwrap();
            let list = state.lists.entry(key.to_string()).or_default();
            list.insert(0, entry.to_string());
            list.truncate(cap);
        }
        Box::pin(async { Ok(()) })
    }

    fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreFuture<'_, Vec<String>> {
        let slice = {
            let state = self.state.lock().unwrap();
            state.lists.get(key).map_or_else(Vec::new, |list| {
                let len = list.len() as isize;
                let resolve = |i: isize| if i < 0 { len + i } else { i };
                let from = resolve(start).max(0);
                let to = resolve(stop).min(len - 1);
                if from > to || len == 0 {
                    Vec::new()
                } else {
                    list[from as usize..=to as usize].to_vec()
                }
            })
        };
        Box::pin(async move { Ok(slice) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_accumulate() {
        let store = InMemoryAggregateStore::new();
        store.incr("k", 2).await.unwrap();
        let v = store.incr("k", 3).await.unwrap();
        assert_eq!(v, 5);
        assert_eq!(store.counter("k"), 5);
    }

    #[tokio::test]
    async fn incr_rejects_non_numeric_values() {
        let store = InMemoryAggregateStore::new();
        store.seed("k", "not a number");
        let result = store.incr("k", 1).await;
        assert!(matches!(result, Err(StoreError::TypeMismatch { .. })));
    }

    #[tokio::test]
    async fn capped_list_keeps_most_recent() {
        let store = InMemoryAggregateStore::new();
        for i in 0..5 {
            store
                .push_capped("log", &format!("e{i}"), 3)
                .await
                .unwrap();
        }
        let entries = store.list_range("log", 0, -1).await.unwrap();
        assert_eq!(entries, vec!["e4", "e3", "e2"]);
    }
}

//! Folding decoded events into aggregate counters, hashes and logs.
//!
//! Every mutation goes through the store's atomic primitives, so folds
//! from different topics can interleave freely. Key families:
//!
//! - `analytics:events:{type}`, `analytics:events:total` — global counters
//! - `analytics:product:{id}`, `analytics:product:{id}:views` — per-product
//! - `analytics:search:*` — search totals, query counts, result buckets
//! - `analytics:system:*` — system event counters
//! - `analytics:perf:{metric}` — occurrence count plus last sample
//! - `analytics:daily:{type}:{YYYY-MM-DD}` — daily samples for trend rules
//! - `analytics:events:log` (cap 1000), `analytics:search:log` (cap 500)

use serde_json::json;
use shopstream_core::event::{Event, EventKind};
use shopstream_core::store::{AggregateStore, StoreError, daily_sample_key};
use std::sync::Arc;

/// Global rolling log of compact event projections.
pub const EVENTS_LOG_KEY: &str = "analytics:events:log";
/// Cap on the global rolling log.
pub const EVENTS_LOG_CAP: usize = 1000;
/// Rolling log of raw search events.
pub const SEARCH_LOG_KEY: &str = "analytics:search:log";
/// Cap on the search rolling log.
pub const SEARCH_LOG_CAP: usize = 500;

/// Distribution bucket for a search result count.
#[must_use]
pub const fn result_count_bucket(result_count: u64) -> &'static str {
    match result_count {
        0 => "0",
        1..=10 => "1-10",
        11..=50 => "11-50",
        _ => "51+",
    }
}

/// Folds decoded events into the aggregate store.
pub struct Folder {
    store: Arc<dyn AggregateStore>,
}

impl Folder {
    /// Create a folder over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self { store }
    }

    /// Fold one event.
    ///
    /// `raw` is the undecoded payload; search events keep it verbatim on
    /// their rolling log.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`] hit; the caller logs it and moves
    /// on to the next message (partial folds are tolerated, the store
    /// primitives are individually atomic).
    pub async fn fold(&self, topic: &str, event: &Event, raw: &[u8]) -> Result<(), StoreError> {
        // Every event lands on the global log and the global counters,
        // whatever its category.
        let projection = json!({
            "topic": topic,
            "id": event.id,
            "type": event.event_type,
            "timestamp": event.timestamp,
            "data": event.data,
        });
        self.store
            .push_capped(EVENTS_LOG_KEY, &projection.to_string(), EVENTS_LOG_CAP)
            .await?;
        self.store.incr("analytics:events:total", 1).await?;
        self.store
            .incr(&daily_sample_key(&event.event_type, event.timestamp), 1)
            .await?;

        match &event.kind {
            EventKind::Product { product_id } => {
                self.fold_product(product_id, event).await?;
            }
            EventKind::Search {
                query,
                result_count,
            } => {
                self.fold_search(query, *result_count, raw).await?;
            }
            EventKind::UserActivity { product_id } => {
                if let Some(product_id) = product_id {
                    self.store
                        .incr(&format!("analytics:product:{product_id}:views"), 1)
                        .await?;
                    self.store
                        .hincr(&format!("analytics:product:{product_id}"), "viewed", 1)
                        .await?;
                }
            }
            EventKind::System => {
                self.store.incr("analytics:system:total", 1).await?;
                self.store
                    .incr(&format!("analytics:system:{}", event.event_type), 1)
                    .await?;
            }
            EventKind::Performance { metric, value } => {
                if let Some(metric) = metric {
                    let key = format!("analytics:perf:{metric}");
                    self.store.hincr(&key, "count", 1).await?;
                    self.store
                        .hset(&key, "last_value", &value.to_string())
                        .await?;
                    self.store
                        .hset(&key, "last_timestamp", &event.timestamp.to_rfc3339())
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn fold_product(&self, product_id: &str, event: &Event) -> Result<(), StoreError> {
        self.store
            .incr(&format!("analytics:events:{}", event.event_type), 1)
            .await?;

        let product_key = format!("analytics:product:{product_id}");
        self.store
            .hincr(&product_key, &event.event_type, 1)
            .await?;

        // Lifecycle stamps on the product's aggregate record.
        match event.event_type.as_str() {
            "product.created" => {
                self.store
                    .hset(&product_key, "created_at", &event.timestamp.to_rfc3339())
                    .await?;
            }
            "product.deleted" => {
                self.store
                    .hset(&product_key, "deleted_at", &event.timestamp.to_rfc3339())
                    .await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn fold_search(
        &self,
        query: &str,
        result_count: u64,
        raw: &[u8],
    ) -> Result<(), StoreError> {
        self.store.incr("analytics:search:total", 1).await?;
        self.store
            .hincr("analytics:search:queries", query, 1)
            .await?;
        self.store
            .hincr(
                "analytics:search:result_counts",
                result_count_bucket(result_count),
                1,
            )
            .await?;
        self.store
            .push_capped(
                SEARCH_LOG_KEY,
                &String::from_utf8_lossy(raw),
                SEARCH_LOG_CAP,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;
    use shopstream_core::event::TopicKind;
    use shopstream_testing::InMemoryAggregateStore;

    fn envelope(event_type: &str, data: Value) -> Vec<u8> {
        json!({
            "id": "evt-1",
            "type": event_type,
            "version": "1.0",
            "timestamp": "2025-06-01T12:00:00Z",
            "source": "test",
            "data": data,
        })
        .to_string()
        .into_bytes()
    }

    fn folder() -> (Folder, InMemoryAggregateStore) {
        let store = InMemoryAggregateStore::new();
        (Folder::new(Arc::new(store.clone())), store)
    }

    async fn fold(folder: &Folder, topic: &str, kind: TopicKind, payload: &[u8]) {
        let event = Event::decode(kind, payload).unwrap();
        folder.fold(topic, &event, payload).await.unwrap();
    }

    #[tokio::test]
    async fn product_events_bump_type_and_product_counters() {
        let (folder, store) = folder();
        let payload = envelope("product.created", json!({"productId": "prod-1"}));
        fold(&folder, "product-events", TopicKind::Product, &payload).await;

        assert_eq!(store.counter("analytics:events:product.created"), 1);
        assert_eq!(
            store.hash_field("analytics:product:prod-1", "product.created"),
            Some("1".to_string())
        );
        assert_eq!(
            store.hash_field("analytics:product:prod-1", "created_at"),
            Some("2025-06-01T12:00:00+00:00".to_string())
        );
        assert_eq!(store.counter("analytics:events:total"), 1);
        assert_eq!(
            store.counter("analytics:daily:product.created:2025-06-01"),
            1
        );
    }

    #[tokio::test]
    async fn deleted_products_get_a_deletion_stamp() {
        let (folder, store) = folder();
        let payload = envelope("product.deleted", json!({"productId": "prod-9"}));
        fold(&folder, "product-events", TopicKind::Product, &payload).await;

        assert!(
            store
                .hash_field("analytics:product:prod-9", "deleted_at")
                .is_some()
        );
        assert!(
            store
                .hash_field("analytics:product:prod-9", "created_at")
                .is_none()
        );
    }

    #[tokio::test]
    async fn search_events_fold_into_distribution_and_raw_log() {
        let (folder, store) = folder();
        let payload = envelope(
            "search.performed",
            json!({"query": "red shoes", "resultCount": 7}),
        );
        fold(&folder, "search-analytics", TopicKind::Search, &payload).await;

        assert_eq!(store.counter("analytics:search:total"), 1);
        assert_eq!(
            store.hash_field("analytics:search:queries", "red shoes"),
            Some("1".to_string())
        );
        assert_eq!(
            store.hash_field("analytics:search:result_counts", "1-10"),
            Some("1".to_string())
        );
        assert_eq!(store.list_len(SEARCH_LOG_KEY), 1);
    }

    #[tokio::test]
    async fn user_activity_without_product_folds_only_globals() {
        let (folder, store) = folder();
        let payload = envelope("user.page_view", json!({"page": "/home"}));
        fold(&folder, "user-activity", TopicKind::UserActivity, &payload).await;

        assert_eq!(store.counter("analytics:events:total"), 1);
        assert_eq!(store.list_len(EVENTS_LOG_KEY), 1);
    }

    #[tokio::test]
    async fn user_activity_with_product_counts_a_view() {
        let (folder, store) = folder();
        let payload = envelope("user.product_view", json!({"productId": "prod-2"}));
        fold(&folder, "user-activity", TopicKind::UserActivity, &payload).await;

        assert_eq!(store.counter("analytics:product:prod-2:views"), 1);
        assert_eq!(
            store.hash_field("analytics:product:prod-2", "viewed"),
            Some("1".to_string())
        );
    }

    #[tokio::test]
    async fn system_events_bump_total_and_per_type() {
        let (folder, store) = folder();
        let payload = envelope("system.restart", json!({}));
        fold(&folder, "system-events", TopicKind::System, &payload).await;

        assert_eq!(store.counter("analytics:system:total"), 1);
        assert_eq!(store.counter("analytics:system:system.restart"), 1);
    }

    #[tokio::test]
    async fn performance_samples_keep_count_and_last_value() {
        let (folder, store) = folder();
        for value in [10.0, 25.5] {
            let payload = envelope(
                "perf.sample",
                json!({"metric": "api_latency_ms", "value": value}),
            );
            fold(&folder, "performance-metrics", TopicKind::Performance, &payload).await;
        }

        assert_eq!(
            store.hash_field("analytics:perf:api_latency_ms", "count"),
            Some("2".to_string())
        );
        assert_eq!(
            store.hash_field("analytics:perf:api_latency_ms", "last_value"),
            Some("25.5".to_string())
        );
    }

    #[tokio::test]
    async fn performance_samples_without_metric_name_are_not_aggregated() {
        let (folder, store) = folder();
        let payload = envelope("perf.sample", json!({"value": 3.0}));
        fold(&folder, "performance-metrics", TopicKind::Performance, &payload).await;

        // Still logged globally.
        assert_eq!(store.list_len(EVENTS_LOG_KEY), 1);
        assert_eq!(store.counter("analytics:events:total"), 1);
    }

    #[tokio::test]
    async fn global_log_never_exceeds_its_cap() {
        let (folder, store) = folder();
        for i in 0..(EVENTS_LOG_CAP + 5) {
            let payload = envelope("system.tick", json!({"seq": i}));
            fold(&folder, "system-events", TopicKind::System, &payload).await;
        }

        assert_eq!(store.list_len(EVENTS_LOG_KEY), EVENTS_LOG_CAP);
        // Most-recent-first: the newest fold is at the head.
        let entries = store.list_range(EVENTS_LOG_KEY, 0, 0).await.unwrap();
        let head: Value = serde_json::from_str(&entries[0]).unwrap();
        assert_eq!(head["data"]["seq"], EVENTS_LOG_CAP + 4);
    }

    #[tokio::test]
    async fn per_query_counts_sum_to_the_search_total() {
        let (folder, store) = folder();
        let queries = [("boots", 3), ("socks", 2), ("headlamp", 1)];
        for (query, times) in queries {
            for _ in 0..times {
                let payload = envelope(
                    "search.performed",
                    json!({"query": query, "resultCount": 5}),
                );
                fold(&folder, "search-analytics", TopicKind::Search, &payload).await;
            }
        }

        let total = store.counter("analytics:search:total");
        assert_eq!(total, 6);

        let per_query_sum: i64 = queries
            .iter()
            .map(|(query, _)| {
                store
                    .hash_field("analytics:search:queries", query)
                    .unwrap()
                    .parse::<i64>()
                    .unwrap()
            })
            .sum();
        assert_eq!(per_query_sum, total);
    }

    #[tokio::test]
    async fn global_log_entries_are_compact_projections() {
        let (folder, store) = folder();
        let payload = envelope("system.restart", json!({"reason": "deploy"}));
        fold(&folder, "system-events", TopicKind::System, &payload).await;

        let entries = store.list_range(EVENTS_LOG_KEY, 0, -1).await.unwrap();
        let entry: Value = serde_json::from_str(&entries[0]).unwrap();
        assert_eq!(entry["topic"], "system-events");
        assert_eq!(entry["type"], "system.restart");
        assert_eq!(entry["data"]["reason"], "deploy");
    }

    proptest! {
        #[test]
        fn buckets_partition_all_result_counts(count in 0u64..10_000) {
            let bucket = result_count_bucket(count);
            let expected = if count == 0 {
                "0"
            } else if count <= 10 {
                "1-10"
            } else if count <= 50 {
                "11-50"
            } else {
                "51+"
            };
            prop_assert_eq!(bucket, expected);
        }
    }
}

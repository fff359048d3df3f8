//! Typed domain events decoded from stream topics.
//!
//! Producers publish a JSON envelope `{id, type, version, timestamp, source,
//! data, metadata?}` per topic. Each topic category has a closed payload
//! shape — [`EventKind`] — carrying only the fields its folding logic reads.
//! Decoding validates both the envelope and the category shape; anything
//! else is an [`EventError`] and the message is dropped by the consumer
//! (malformed input is not recoverable by retrying).
//!
//! # Example
//!
//! ```
//! use shopstream_core::event::{Event, TopicKind};
//!
//! let payload = br#"{
//!     "id": "evt-1",
//!     "type": "product.created",
//!     "version": "1.0",
//!     "timestamp": "2025-06-01T12:00:00Z",
//!     "source": "catalog-service",
//!     "data": { "productId": "prod-42" }
//! }"#;
//!
//! let event = Event::decode(TopicKind::Product, payload).unwrap();
//! assert_eq!(event.event_type, "product.created");
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while decoding an inbound event.
#[derive(Error, Debug)]
pub enum EventError {
    /// The payload is not a valid JSON event envelope.
    #[error("malformed event envelope: {0}")]
    Malformed(String),

    /// The envelope decoded but `data` does not match the topic's shape.
    #[error("event data does not match the {category} shape: {reason}")]
    Shape {
        /// The topic category the event was expected to match.
        category: &'static str,
        /// Why deserialization of `data` failed.
        reason: String,
    },
}

/// The five topic categories the ingestion consumer subscribes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicKind {
    /// Product lifecycle events (`product.created`, `product.updated`, ...).
    Product,
    /// Search activity events.
    Search,
    /// User activity events (views, clicks).
    UserActivity,
    /// System health events.
    System,
    /// Performance metric samples.
    Performance,
}

impl TopicKind {
    /// Stable name used in error messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Search => "search",
            Self::UserActivity => "user-activity",
            Self::System => "system",
            Self::Performance => "performance",
        }
    }
}

/// The set of topic names the ingestion consumer subscribes to.
///
/// Names are configurable; the defaults match the producers' conventions.
#[derive(Clone, Debug)]
pub struct TopicSet {
    /// Product lifecycle topic.
    pub product: String,
    /// Search analytics topic.
    pub search: String,
    /// User activity topic.
    pub user_activity: String,
    /// System events topic.
    pub system: String,
    /// Performance metrics topic.
    pub performance: String,
}

impl Default for TopicSet {
    fn default() -> Self {
        Self {
            product: "product-events".to_string(),
            search: "search-analytics".to_string(),
            user_activity: "user-activity".to_string(),
            system: "system-events".to_string(),
            performance: "performance-metrics".to_string(),
        }
    }
}

impl TopicSet {
    /// All five topic names, for subscription.
    #[must_use]
    pub fn names(&self) -> [&str; 5] {
        [
            &self.product,
            &self.search,
            &self.user_activity,
            &self.system,
            &self.performance,
        ]
    }

    /// Map a topic name back to its category.
    ///
    /// Returns `None` for topics outside the subscribed set.
    #[must_use]
    pub fn kind_of(&self, topic: &str) -> Option<TopicKind> {
        if topic == self.product {
            Some(TopicKind::Product)
        } else if topic == self.search {
            Some(TopicKind::Search)
        } else if topic == self.user_activity {
            Some(TopicKind::UserActivity)
        } else if topic == self.system {
            Some(TopicKind::System)
        } else if topic == self.performance {
            Some(TopicKind::Performance)
        } else {
            None
        }
    }
}

/// Category-specific event payload.
///
/// A closed union: each variant carries only the fields its folding
/// function reads. Shapes that match no variant are rejected at decode
/// time rather than carried around as untyped maps.
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    /// A product lifecycle event.
    Product {
        /// The product the event refers to.
        product_id: String,
    },
    /// A search performed against the catalog.
    Search {
        /// The raw query text.
        query: String,
        /// How many results the search returned.
        result_count: u64,
    },
    /// A user activity event; folding only reads the product reference.
    UserActivity {
        /// The product the activity touched, when any.
        product_id: Option<String>,
    },
    /// A system health event; folding reads only the envelope type.
    System,
    /// A performance metric sample.
    Performance {
        /// Metric name; samples without one are counted nowhere.
        metric: Option<String>,
        /// The sampled value.
        value: f64,
    },
}

#[derive(Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    version: String,
    timestamp: DateTime<Utc>,
    source: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductData {
    product_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    query: String,
    #[serde(default)]
    result_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserActivityData {
    #[serde(default)]
    product_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceData {
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    value: f64,
}

/// An immutable domain event decoded from a stream topic.
///
/// Envelope fields are kept verbatim; `data` retains the raw JSON value
/// for the rolling-log projection while `kind` carries the validated,
/// typed view the folding logic works with.
#[derive(Clone, Debug)]
pub struct Event {
    /// Producer-assigned event id.
    pub id: String,
    /// Dotted event type, e.g. `product.created`.
    pub event_type: String,
    /// Producer schema version.
    pub version: String,
    /// When the producer emitted the event.
    pub timestamp: DateTime<Utc>,
    /// The producing service.
    pub source: String,
    /// Raw `data` payload, kept for log projections.
    pub data: Value,
    /// Optional producer metadata.
    pub metadata: Option<Value>,
    /// The validated category-specific payload.
    pub kind: EventKind,
}

impl Event {
    /// Decode a JSON payload from the given topic category.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Malformed`] when the envelope is not valid
    /// JSON (or misses required envelope fields), and [`EventError::Shape`]
    /// when `data` does not match the category's payload shape.
    pub fn decode(kind: TopicKind, payload: &[u8]) -> Result<Self, EventError> {
        let envelope: Envelope =
            serde_json::from_slice(payload).map_err(|e| EventError::Malformed(e.to_string()))?;

        let shape_err = |reason: serde_json::Error| EventError::Shape {
            category: kind.as_str(),
            reason: reason.to_string(),
        };

        let decoded = match kind {
            TopicKind::Product => {
                let data: ProductData =
                    serde_json::from_value(envelope.data.clone()).map_err(shape_err)?;
                EventKind::Product {
                    product_id: data.product_id,
                }
            }
            TopicKind::Search => {
                let data: SearchData =
                    serde_json::from_value(envelope.data.clone()).map_err(shape_err)?;
                EventKind::Search {
                    query: data.query,
                    result_count: data.result_count,
                }
            }
            TopicKind::UserActivity => {
                let data: UserActivityData =
                    serde_json::from_value(envelope.data.clone()).map_err(shape_err)?;
                EventKind::UserActivity {
                    product_id: data.product_id,
                }
            }
            TopicKind::System => EventKind::System,
            TopicKind::Performance => {
                let data: PerformanceData =
                    serde_json::from_value(envelope.data.clone()).map_err(shape_err)?;
                EventKind::Performance {
                    metric: data.metric,
                    value: data.value,
                }
            }
        };

        Ok(Self {
            id: envelope.id,
            event_type: envelope.event_type,
            version: envelope.version,
            timestamp: envelope.timestamp,
            source: envelope.source,
            data: envelope.data,
            metadata: envelope.metadata,
            kind: decoded,
        })
    }
}

//! # Shopstream Ingestion
//!
//! The event ingestion consumer: subscribes to the five analytics topics
//! and folds every decodable event into the aggregate store — per-type
//! counters, per-product hashes, search distributions, performance
//! samples and the capped rolling logs.
//!
//! Failure isolation is per message: decode failures are logged and
//! dropped (malformed input is not recoverable by retrying), folding
//! failures are logged and skipped. Only subscription-level errors abort
//! the consumer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The long-lived consumer loop.
pub mod consumer;
/// Per-category folding into the aggregate store.
pub mod folding;

pub use consumer::{EventIngestionConsumer, IngestError};
pub use folding::Folder;

//! # Shopstream Runtime
//!
//! Retry/backoff policies and connection supervision for the shopstream
//! workers.
//!
//! Two recovery layers exist, and only two:
//!
//! - **Connection layer** (this crate): establishing a client connection
//!   retries with backoff up to a fixed budget, then fails the operation.
//! - **Startup layer** (the worker binary): the whole startup sequence
//!   retries on a fixed delay up to a fixed attempt count, then the
//!   process exits non-zero.
//!
//! Message-level failures are never retried here; consumers isolate them
//! per message.

/// Retry with linear or fixed backoff.
pub mod retry;

/// Connection supervision at process startup.
pub mod supervisor;

pub use retry::{BackoffStrategy, RetryPolicy, retry_with_backoff};
pub use supervisor::{ConnectionSupervisor, SupervisorError};

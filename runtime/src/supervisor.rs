//! Connection supervision at process startup.
//!
//! The supervisor owns the reconnect policy for the clients the workers
//! depend on (aggregate store, stream broker, queue broker). Connection
//! attempts back off linearly — `min(retries * 100ms, 3000ms)` — and
//! give up after more than 10 retries, surfacing a fatal error up the
//! stack. Per-message failures are never handled here.

use crate::retry::{RetryPolicy, retry_with_backoff};
use std::time::Duration;
use thiserror::Error;

/// Default per-retry increment for connection backoff.
pub const CONNECT_BACKOFF_STEP: Duration = Duration::from_millis(100);

/// Default cap on connection backoff delay.
pub const CONNECT_BACKOFF_CAP: Duration = Duration::from_millis(3000);

/// Default connection retry budget.
pub const CONNECT_MAX_RETRIES: usize = 10;

/// Fatal connection errors surfaced once the retry budget is spent.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// All connection attempts to a dependency failed.
    #[error("connection to {target} failed after {retries} retries: {reason}")]
    Exhausted {
        /// The dependency that could not be reached.
        target: String,
        /// How many retries were spent.
        retries: usize,
        /// The last connection error.
        reason: String,
    },
}

/// Owns reconnect-with-backoff for broker and store clients.
///
/// Constructed once at startup and handed to the wiring code; clients are
/// established through [`ConnectionSupervisor::establish`] rather than
/// connecting ad hoc, so every dependency shares one recovery policy.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSupervisor {
    policy: RetryPolicy,
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::linear(
                CONNECT_MAX_RETRIES,
                CONNECT_BACKOFF_STEP,
                CONNECT_BACKOFF_CAP,
            ),
        }
    }
}

impl ConnectionSupervisor {
    /// Supervisor with a custom retry policy (tests use tight delays).
    #[must_use]
    pub const fn with_policy(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Establish a connection, retrying with the supervisor's backoff.
    ///
    /// `connect` is invoked repeatedly until it succeeds or the retry
    /// budget is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Exhausted`] once the budget is spent;
    /// the caller treats this as fatal for the operation.
    pub async fn establish<T, E, F, Fut>(
        &self,
        target: &str,
        connect: F,
    ) -> Result<T, SupervisorError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        tracing::info!(dependency = %target, "establishing connection");

        retry_with_backoff(self.policy, connect)
            .await
            .map_err(|e| SupervisorError::Exhausted {
                target: target.to_string(),
                retries: self.policy.max_retries,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn establishes_after_transient_failures() {
        let supervisor = ConnectionSupervisor::with_policy(RetryPolicy::linear(
            5,
            Duration::from_millis(1),
            Duration::from_millis(5),
        ));
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let result = supervisor
            .establish("store", || {
                let c = Arc::clone(&counter_clone);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err("connection refused".to_string())
                    } else {
                        Ok("client")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "client");
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn surfaces_fatal_error_after_budget() {
        let supervisor = ConnectionSupervisor::with_policy(RetryPolicy::linear(
            2,
            Duration::from_millis(1),
            Duration::from_millis(2),
        ));

        let result: Result<(), _> = supervisor
            .establish("store", || async { Err("connection refused".to_string()) })
            .await;

        assert!(matches!(
            result,
            Err(SupervisorError::Exhausted { retries: 2, .. })
        ));
    }
}

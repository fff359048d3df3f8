//! Retry logic with capped backoff for handling transient failures.
//!
//! Two strategies cover the workers' needs: linear backoff with a cap for
//! store/broker clients (`min(retries * step, cap)`) and a fixed delay for
//! top-level startup attempts.
//!
//! # Example
//!
//! ```rust
//! use shopstream_runtime::retry::{RetryPolicy, retry_with_backoff};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::linear(
//!     10,
//!     Duration::from_millis(100),
//!     Duration::from_secs(3),
//! );
//!
//! let result = retry_with_backoff(policy, || async {
//!     // Your fallible connect here
//!     Ok::<_, String>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// How the delay grows between retries.
#[derive(Debug, Clone, Copy)]
pub enum BackoffStrategy {
    /// The same delay before every retry.
    Fixed {
        /// Delay between attempts.
        delay: Duration,
    },
    /// Delay grows linearly with the retry count, capped.
    Linear {
        /// Per-retry increment (retry `n` waits `n * step`).
        step: Duration,
        /// Upper bound on the computed delay.
        cap: Duration,
    },
}

/// Retry policy configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Delay strategy between attempts.
    pub strategy: BackoffStrategy,
}

impl RetryPolicy {
    /// Linear backoff: retry `n` waits `min(n * step, cap)`.
    #[must_use]
    pub const fn linear(max_retries: usize, step: Duration, cap: Duration) -> Self {
        Self {
            max_retries,
            strategy: BackoffStrategy::Linear { step, cap },
        }
    }

    /// Fixed backoff: every retry waits `delay`.
    #[must_use]
    pub const fn fixed(max_retries: usize, delay: Duration) -> Self {
        Self {
            max_retries,
            strategy: BackoffStrategy::Fixed { delay },
        }
    }

    /// Delay before the given retry (1-based).
    #[must_use]
    pub fn delay_for_retry(&self, retry: usize) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed { delay } => delay,
            BackoffStrategy::Linear { step, cap } => {
                let retries = u32::try_from(retry).unwrap_or(u32::MAX);
                let delay = step.saturating_mul(retries);
                if delay > cap { cap } else { delay }
            }
        }
    }
}

/// Retry an async operation according to the policy.
///
/// The operation is attempted once, then up to `max_retries` more times
/// with the policy's delay between attempts.
///
/// # Errors
///
/// Returns the last error once the retry budget is exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retries = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if retries > 0 {
                    tracing::info!(retries, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if retries >= policy.max_retries {
                    tracing::error!(
                        retries,
                        error = %err,
                        "operation failed after max retries"
                    );
                    return Err(err);
                }

                retries += 1;
                let delay = policy.delay_for_retry(retries);
                tracing::warn!(
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "operation failed, retrying"
                );

                sleep(delay).await;
            }
        }
    }
}

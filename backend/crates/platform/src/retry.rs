//! Retry Policy
//!
//! Fixed-backoff retry for fallible async operations. Shared by every
//! component that talks to a remote store and must ride out short outages.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (0 is treated as 1)
    pub max_attempts: u32,
    /// Delay between two consecutive attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Single attempt, no delay
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Effective number of attempts
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned
    /// when every attempt fails. No delay follows the final attempt.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(operation, op, |_| true).await
    }

    /// Like [`RetryPolicy::run`], but an error for which `retryable` returns
    /// false is returned at once without further attempts.
    pub async fn run_if<T, E, F, Fut, R>(
        &self,
        operation: &str,
        mut op: F,
        retryable: R,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        R: Fn(&E) -> bool,
    {
        let max = self.attempts();
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max && retryable(&e) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = max,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "Giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

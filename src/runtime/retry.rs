use std::future::Future;
use std::time::Duration;

use super::{Error, Result};

/// Bounded exponential backoff for calls against the docker engine.
///
/// Only transport failures are retried. Once `max_attempts` calls have failed
/// the error is escalated to [`Error::Unreachable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, after `failed_attempts` consecutive failures.
    ///
    /// The delay doubles with every failure and is capped at `max_backoff`.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is exhausted.
    ///
    /// # Errors
    ///
    /// * [`Error::Api`] as soon as the engine rejects the call.
    /// * [`Error::Unreachable`] once `max_attempts` transport failures occurred.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, bollard::errors::Error>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let source = match call().await {
                Ok(value) => return Ok(value),
                Err(source) => source,
            };

            let err = Error::classify(operation, source);
            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                let Error::Connection { source, .. } = err else {
                    return Err(err);
                };
                return Err(Error::Unreachable {
                    operation,
                    attempts: attempt,
                    source,
                });
            }

            let delay = self.backoff(attempt);
            log::warn!(
                "{} (attempt {}/{}), retrying in {:?}",
                err,
                attempt,
                self.max_attempts,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

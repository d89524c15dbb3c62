// retry.rs

use std::future::Future;
use std::time::Duration;

use crate::error::AIError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Pause taken after the failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Every pause a fully rate-limited call sits through. None after the last attempt.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(|attempt| self.delay_for(attempt))
    }
}

/// How one attempt ended, as far as retrying is concerned.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    Transient(AIError),
    Terminal(AIError),
}

impl<T> From<Result<T, AIError>> for Attempt<T> {
    fn from(result: Result<T, AIError>) -> Self {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(err) if err.is_rate_limit() => Attempt::Transient(err),
            Err(err) => Attempt::Terminal(err),
        }
    }
}

/// Run `operation` until it succeeds, fails for good, or runs out of attempts.
///
/// Only rate limits are retried. `on_retry(next_attempt, delay)` fires before
/// each pause; `next_attempt` is 1-based.
pub async fn retry_with_backoff<T, F, Fut, R>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: R,
) -> Result<T, AIError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AIError>>,
    R: FnMut(u32, Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match Attempt::from(operation(attempt).await) {
            Attempt::Success(value) => return Ok(value),
            Attempt::Transient(err) if attempt + 1 < max_attempts => {
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "Rate limited on attempt {}/{}: {}. Retrying in {:?}",
                    attempt + 1,
                    max_attempts,
                    err,
                    delay
                );
                on_retry(attempt + 1, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Attempt::Transient(err) => {
                log::error!("Rate limited on final attempt {}: {}", attempt + 1, err);
                return Err(err);
            }
            Attempt::Terminal(err) => return Err(err),
        }
    }
}

//! Bounded retry with a fixed delay
//!
//! Only errors selected by the caller's predicate are retried; anything else
//! returns immediately. Once the budget is spent the last retryable error is
//! returned unchanged so the caller can still recognise it.

use crate::common::{Result, SagaConfig};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, so `max_retries + 1` attempts in total
    pub max_retries: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }
}

impl From<&SagaConfig> for RetryPolicy {
    fn from(config: &SagaConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SagaConfig::default())
    }
}

/// Re-invoke `f` while it fails with an error matching `should_retry`
pub async fn retry_on<F, Fut, T, P>(
    policy: RetryPolicy,
    label: &str,
    should_retry: P,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&crate::Error) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if should_retry(&e) && attempt <= policy.max_retries => {
                tracing::warn!(
                    "Retrying {}: attempt {} failed ({}), next in {:?}",
                    label,
                    attempt,
                    e,
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                if should_retry(&e) {
                    tracing::warn!(
                        "Giving up retrying {} after {} retries",
                        label,
                        policy.max_retries
                    );
                }
                return Err(e);
            }
        }
    }
}

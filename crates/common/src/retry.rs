//! Bounded retry with exponential backoff.

use std::{fmt::Display, future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::*;

/// Retry policy handed to components that talk to the node or the store.
///
/// `max_retries` counts retries after the first attempt, so an operation runs at most
/// `max_retries + 1` times. A policy with `max_retries == 0` fails on the first error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,

    /// Delay before the first retry.
    pub base_delay_ms: u64,

    /// Growth factor applied per retry.
    pub multiplier: f64,

    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn calculate_delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::from_millis(self.base_delay_ms);
        }

        let delay = self.base_delay_ms as f64 * self.multiplier.powi(retry_count as i32);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }
}

/// Runs `op` until it succeeds or the policy is exhausted, returning the last error.
pub async fn retry_async<T, E, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_async_when(policy, label, |_| true, op).await
}

/// Like [`retry_async`] but only retries errors accepted by `is_retryable`.
pub async fn retry_async_when<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut retry_count = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) if is_retryable(&err) && policy.should_retry(retry_count) => {
                let delay = policy.calculate_delay(retry_count);
                warn!(
                    %label,
                    %err,
                    retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

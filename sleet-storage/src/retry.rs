//! Transient-failure retry with linear backoff.
//!
//! Retries happen inside the storage layer; the engine only observes the
//! final outcome.

use crate::{StorageError, StorageResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry budget for a single storage operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Backoff grows linearly from this base.
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_ms: 120,
        }
    }
}

impl RetryPolicy {
    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(attempt as u64))
    }
}

/// Runs `operation`, retrying transient failures per `policy`.
/// Non-transient failures are returned immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: F) -> StorageResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!("transient storage failure (attempt {attempt}): {e}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

use async_trait::async_trait;
use shortify_core::sequence::Result;
use shortify_core::{AllocatorError, SequenceAllocator};
use std::time::Duration;
use tracing::warn;

/// Retry behaviour for transient allocator failures, with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single backoff.
    pub max_backoff: Duration,
    /// Multiplier applied to the backoff after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// A policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// A policy for quick transient failures such as a dropped connection.
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }

    /// A policy that rides out short backend failovers.
    pub fn standard() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }

    /// Backoff before retry number `attempt` (0-indexed).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        self.initial_backoff
            .mul_f64(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fast()
    }
}

/// Wraps an allocator and retries [`AllocatorError::Unavailable`] failures.
///
/// Only the increment itself is retried. A value that was issued but whose
/// response was lost is simply skipped, which leaves a gap and never a
/// duplicate. `Exhausted` is returned immediately.
#[derive(Debug, Clone)]
pub struct Retrying<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A: SequenceAllocator> Retrying<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<A: SequenceAllocator> SequenceAllocator for Retrying<A> {
    async fn next(&self) -> Result<u64> {
        let mut attempt = 0;
        loop {
            match self.inner.next().await {
                Ok(value) => return Ok(value),
                Err(AllocatorError::Unavailable(message)) if attempt < self.policy.max_attempts => {
                    let backoff = self.policy.backoff_duration(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %message,
                        "sequence allocator unavailable, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

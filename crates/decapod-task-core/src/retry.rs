//! Bounded retry of transient store errors.
//!
//! Wraps a single store round trip; everything above this layer sees a
//! deterministic outcome — either the operation eventually succeeded, or it
//! exhausted its retry budget and the caller gets
//! [`crate::error::TaskQueueError::InternalStoreError`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::TransientError;

/// Retry policy for a single store operation. Mirrors the client-side retry
/// configuration convention used elsewhere in this lineage: attempt count,
/// exponential delay with a cap, and jitter to avoid thundering-herd
/// reconnects across many watchers.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// No retries: the first error is final. Used by the in-memory backend,
    /// which has no transient failure mode to retry around.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        }
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        let mut delay_ms = base.min(self.max_delay.as_millis() as f64);
        if self.jitter > 0.0 {
            let jitter_ms = delay_ms * self.jitter;
            delay_ms += rand::rng().random::<f64>() * jitter_ms;
        }
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as f64) as u64)
    }
}

/// Run `op` until it succeeds, it returns a non-transient error, or the
/// retry budget is exhausted.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: TransientError,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !err.is_transient() || !policy.should_retry(attempt) {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
            }
        }
    }
}

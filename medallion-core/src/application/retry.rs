// medallion-core/src/application/retry.rs

use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::domain::project::IngestionConfig;
use crate::error::MedallionError;

/// Bounded retry with exponential backoff: `base`, `2 * base`, `4 * base`, ...
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &IngestionConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
        )
    }

    /// Wait after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

/// What happened on one attempt, handed to the observer before any sleep.
pub enum AttemptOutcome<'a, T> {
    Succeeded(&'a T),
    Retrying(&'a MedallionError, Duration),
    Failed(&'a MedallionError),
}

/// Runs `op` until it succeeds, fails permanently, or the policy runs out.
///
/// Only transient errors (see `MedallionError::is_transient`) are retried.
/// `observe` is called once per attempt, whatever the outcome.
pub async fn with_retry<T, F, Fut, O>(
    policy: &RetryPolicy,
    mut op: F,
    mut observe: O,
) -> Result<T, MedallionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, MedallionError>>,
    O: FnMut(u32, AttemptOutcome<'_, T>),
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                observe(attempt, AttemptOutcome::Succeeded(&value));
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(attempt, ?delay, "⏳ Transient failure, retrying: {}", e);
                observe(attempt, AttemptOutcome::Retrying(&e, delay));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                observe(attempt, AttemptOutcome::Failed(&e));
                if e.is_transient() {
                    error!(attempt, "❌ Giving up: {}", e);
                    return Err(MedallionError::RetriesExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                error!(attempt, "❌ Permanent failure, not retried: {}", e);
                return Err(e);
            }
        }
    }
}

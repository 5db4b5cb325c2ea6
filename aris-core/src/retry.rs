//! ABOUTME: Exponential backoff with full jitter for retriable provider errors
//! ABOUTME: Classifies errors via ArisError::is_retriable and caps attempts at a configurable maximum

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::ArisError;

/// Retry policy: exponential backoff with full jitter, max 3 attempts by
/// default.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let capped = exp.min(self.max_delay);
        let jitter_ms = rand::thread_rng().gen_range(0..=capped.as_millis().max(1) as u64);
        Duration::from_millis(jitter_ms)
    }

    /// Runs `op` up to `max_attempts` times. Non-retriable errors (per
    /// `ArisError::is_retriable`) fail immediately. Exhausting all attempts
    /// on a retriable error reclassifies it as `ProviderUnavailable`.
    pub async fn run<T, F, Fut>(&self, provider: &str, mut op: F) -> Result<T, ArisError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ArisError>>,
    {
        let mut last_err: Option<ArisError> = None;
        for attempt in 0..self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retriable() => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        provider,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "retriable provider error, backing off"
                    );
                    last_err = Some(err);
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(ArisError::ProviderUnavailable {
            provider: provider.to_string(),
            message: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "retries exhausted".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5));
        let result: Result<u32, ArisError> = policy.run("search", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_retriable_errors_then_reclassifies_as_unavailable() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5));
        let calls = AtomicU32::new(0);
        let result: Result<u32, ArisError> = policy
            .run("search", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ArisError::ProviderRetriable {
                        provider: "search".into(),
                        message: "timeout".into(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ArisError::ProviderUnavailable { .. })));
    }

    #[tokio::test]
    async fn non_retriable_error_fails_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<u32, ArisError> = policy
            .run("reasoning", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ArisError::ProviderFatal {
                        provider: "reasoning".into(),
                        message: "bad key".into(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ArisError::ProviderFatal { .. })));
    }
}

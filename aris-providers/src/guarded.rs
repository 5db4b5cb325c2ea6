//! ABOUTME: Wraps a provider call with circuit breaking then retry/backoff
//! ABOUTME: The breaker is consulted before every attempt inside the retry loop, so an open circuit fails fast without burning retry attempts on I/O

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use aris_breaker::{BreakerConfig, CircuitBreaker};
use aris_core::{ArisError, RetryPolicy};

/// Runs `op` through the named provider's circuit breaker, retrying
/// retriable failures per `retry_policy`. Each call is wrapped by the
/// breaker; retry with exponential backoff applies only to retriable
/// errors.
pub async fn call_guarded<T, F, Fut>(
    breaker: &Arc<CircuitBreaker>,
    retry_policy: &RetryPolicy,
    provider_name: &str,
    mut op: F,
) -> Result<T, ArisError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ArisError>>,
{
    retry_policy
        .run(provider_name, || {
            let started = Instant::now();
            let breaker = breaker.clone();
            let provider_name = provider_name.to_string();
            let fut = op();
            async move {
                if !breaker.can_execute() {
                    return Err(ArisError::ProviderUnavailable {
                        provider: provider_name,
                        message: "circuit breaker open".to_string(),
                    });
                }

                match fut.await {
                    Ok(value) => {
                        breaker.record_success(started.elapsed());
                        Ok(value)
                    }
                    Err(err) => {
                        breaker.record_failure(&anyhow::anyhow!(err.to_string()));
                        Err(err)
                    }
                }
            }
        })
        .await
}

#[must_use]
pub fn default_breaker_config() -> BreakerConfig {
    BreakerConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn open_breaker_fails_fast_without_calling_op() {
        let breaker = Arc::new(CircuitBreaker::with_config(
            "test".to_string(),
            BreakerConfig {
                failure_threshold: 1,
                open_duration: Duration::from_secs(60),
                ..BreakerConfig::default()
            },
        ));
        breaker.record_failure(&anyhow::anyhow!("boom"));
        assert!(!breaker.can_execute());

        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1));
        let result: Result<(), ArisError> = call_guarded(&breaker, &policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_call_records_success_on_breaker() {
        let breaker = Arc::new(CircuitBreaker::new("test".to_string()));
        let policy = RetryPolicy::default();
        let result: Result<u32, ArisError> =
            call_guarded(&breaker, &policy, "test", || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}

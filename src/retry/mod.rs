//! Bounded retries with jittered exponential backoff.
//!
//! Every call to an external capability goes through this module. The generic
//! [`with_retry`] primitive knows nothing about providers; [`Retrier`] binds it
//! to [`ProviderError`] classification, a per-attempt timeout, structured
//! logging and metrics.
//!
//! # Example
//!
//! ```ignore
//! use reelforge::retry::{Retrier, RetryPolicy};
//!
//! let retrier = Retrier::new(RetryPolicy::new(4));
//! let url = retrier.call("render", || renderer.render(&manifest)).await?;
//! ```

pub mod policy;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::ProviderError;
use crate::metrics::MetricsCollector;

pub use policy::{FixedJitter, JitterSource, RandomJitter, RetryPolicy};

/// Runs `operation` until it succeeds, the attempt budget is spent, or
/// `is_retryable` rejects the error.
///
/// On a retryable failure the delay is computed from the current backoff and
/// a jitter sample, `on_retry(attempt, &error, delay)` is invoked, the task
/// sleeps, and the backoff grows. The last error is returned unchanged; no
/// delay follows the final attempt.
pub async fn with_retry<T, E, F, Fut, C, H>(
    policy: &RetryPolicy,
    jitter: &dyn JitterSource,
    mut operation: F,
    is_retryable: C,
    mut on_retry: H,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    H: FnMut(u32, &E, Duration),
{
    let max_attempts = policy.attempts();
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !is_retryable(&err) {
                    return Err(err);
                }

                let delay = policy.delay_for(backoff, jitter.sample());
                on_retry(attempt, &err, delay);
                tokio::time::sleep(delay).await;

                backoff = policy.next_backoff(backoff);
                attempt += 1;
            }
        }
    }
}

/// Provider-aware retry runner shared by the orchestrator, selector and
/// notifiers.
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    jitter: Arc<dyn JitterSource>,
    call_timeout: Option<Duration>,
    metrics: MetricsCollector,
}

impl Retrier {
    /// Creates a retrier with random jitter and no per-attempt timeout.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            jitter: Arc::new(RandomJitter::new()),
            call_timeout: None,
            metrics: MetricsCollector::new(),
        }
    }

    /// Replaces the jitter source.
    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Bounds every individual attempt; an elapsed deadline becomes
    /// [`ProviderError::Timeout`], which is retryable.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Returns the underlying policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Calls a provider operation with the default retry classification.
    pub async fn call<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.call_with(operation, op, ProviderError::is_retryable)
            .await
    }

    /// Calls a provider operation with a custom retry classifier.
    pub async fn call_with<T, F, Fut, C>(
        &self,
        operation: &str,
        mut op: F,
        is_retryable: C,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
        C: Fn(&ProviderError) -> bool,
    {
        let call_timeout = self.call_timeout;
        let metrics = self.metrics;

        with_retry(
            &self.policy,
            self.jitter.as_ref(),
            || {
                let fut = op();
                async move {
                    match call_timeout {
                        Some(limit) => match tokio::time::timeout(limit, fut).await {
                            Ok(result) => result,
                            Err(_) => Err(ProviderError::Timeout(limit)),
                        },
                        None => fut.await,
                    }
                }
            },
            is_retryable,
            |attempt, err, delay| {
                metrics.record_retry(operation);
                warn!(
                    operation = operation,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Provider call failed, retrying"
                );
            },
        )
        .await
    }
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_initial_backoff(Duration::from_millis(1))
            .with_max_backoff(Duration::from_millis(4))
    }

    /// Fails `failures` times with the given error, then returns the call number.
    async fn flaky(calls: &AtomicU32, failures: u32, err: ProviderError) -> Result<u32, ProviderError> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= failures {
            Err(err)
        } else {
            Ok(n)
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_k_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(
            &fast_policy(5),
            &FixedJitter(0.0),
            || flaky(&calls, 3, ProviderError::http(503, "busy")),
            ProviderError::is_retryable,
            |_, _, _| {},
        )
        .await;

        assert_eq!(result, Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_rethrow_original_error() {
        let calls = AtomicU32::new(0);
        let original = ProviderError::Network("connection reset".into());
        let result = with_retry(
            &fast_policy(3),
            &FixedJitter(0.0),
            || flaky(&calls, 3, original.clone()),
            ProviderError::is_retryable,
            |_, _, _| {},
        )
        .await;

        assert_eq!(result, Err(original));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let calls = AtomicU32::new(0);
        let retries = AtomicU32::new(0);
        let result = with_retry(
            &fast_policy(5),
            &FixedJitter(0.0),
            || flaky(&calls, 10, ProviderError::http(400, "bad prompt")),
            ProviderError::is_retryable,
            |_, _, _| {
                retries.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert!(matches!(result, Err(ProviderError::Http { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(retries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_on_retry_receives_attempts_and_growing_delays() {
        let calls = AtomicU32::new(0);
        let seen: Mutex<Vec<(u32, Duration)>> = Mutex::new(Vec::new());
        let policy = RetryPolicy::new(4)
            .with_initial_backoff(Duration::from_millis(2))
            .with_max_backoff(Duration::from_millis(5))
            .with_multiplier(2.0);

        let _ = with_retry(
            &policy,
            &FixedJitter(0.0),
            || flaky(&calls, 10, ProviderError::http(429, "rate limited")),
            ProviderError::is_retryable,
            |attempt, _, delay| {
                seen.lock().expect("lock not poisoned").push((attempt, delay));
            },
        )
        .await;

        let seen = seen.into_inner().expect("lock not poisoned");
        let attempts: Vec<u32> = seen.iter().map(|(a, _)| *a).collect();
        let delays: Vec<u128> = seen.iter().map(|(_, d)| d.as_millis()).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        assert_eq!(delays, vec![2, 4, 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retrier_call_timeout_is_retryable() {
        let calls = AtomicU32::new(0);
        let retrier = Retrier::new(fast_policy(2))
            .with_jitter(Arc::new(FixedJitter(0.0)))
            .with_call_timeout(Duration::from_millis(10));

        let result: Result<u32, ProviderError> = retrier
            .call("slow", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retrier_custom_classifier() {
        let calls = AtomicU32::new(0);
        let retrier = Retrier::new(fast_policy(3)).with_jitter(Arc::new(FixedJitter(0.0)));

        let result = retrier
            .call_with(
                "segments",
                || flaky(&calls, 1, ProviderError::Malformed("count".into())),
                |err| matches!(err, ProviderError::Malformed(_)),
            )
            .await;

        assert_eq!(result, Ok(2));
    }
}

//! Retry policy for per-chunk embedding calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{RagError, Result};

/// Bounded retry with a delay that grows linearly with the attempt number.
///
/// After failed attempt `n` the policy waits `base_delay × n` before trying
/// again. Errors for which [`RagError::is_retryable`] is false stop the loop
/// immediately.
///
/// # Example
///
/// ```rust,ignore
/// use rag_engine::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(500));
/// let vector = policy.run(|attempt| client.embed(text)).await?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    /// Maximum number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt budget is spent.
    ///
    /// The closure receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// - The operation's own error, unchanged, if it is not retryable.
    /// - [`RagError::ExhaustedRetries`] wrapping the last error once every
    ///   attempt has failed.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => error,
            };

            if attempt >= self.max_attempts {
                return Err(RagError::ExhaustedRetries {
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }

            let delay = self.delay_for(attempt);
            warn!(attempt, max_attempts = self.max_attempts, ?delay, error = %error, "retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn delay_grows_linearly() {
        let policy = RetryPolicy::new(5, Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(600));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_last_allowed_attempt() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        let value = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 { Err(RagError::transport("mock", "down")) } else { Ok(attempt) }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms after attempt 1, 200ms after attempt 2
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let err = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RagError::format("mock", "garbage")) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            RagError::ExhaustedRetries { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last_error, RagError::Format { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(60));

        let err = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RagError::Validation("empty".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::Validation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

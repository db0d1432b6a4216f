use std::future::Future;

// ============================================================================
// Bounded Retry
// ============================================================================
//
// Runs an operation up to `max_attempts` times, retrying only errors that
// classify themselves as retryable. There is no delay between attempts:
// callers run inside an open transaction and must not sleep while holding it.
//
// ============================================================================

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

/// Result of a retry operation
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded on attempt number `attempts`
    Success { value: T, attempts: u32 },
    /// Every attempt failed with a retryable error; holds the last one
    Exhausted(E),
    /// Operation failed with an error that must not be retried
    PermanentFailure(E),
}

/// Whether an error is worth another attempt
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for crate::db::PersistenceError {
    fn is_retryable(&self) -> bool {
        self.is_unique_violation()
    }
}

/// Execute `operation(attempt)` with `attempt` counting from 1.
pub async fn retry_bounded<F, Fut, T, E>(policy: RetryPolicy, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + Retryable,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return RetryResult::Success { value, attempts: attempt };
            }
            Err(error) => {
                if !error.is_retryable() {
                    tracing::debug!(
                        attempt = attempt,
                        error = %error,
                        "Permanent failure detected, not retrying"
                    );
                    return RetryResult::PermanentFailure(error);
                }

                if attempt >= policy.max_attempts {
                    tracing::debug!(
                        attempt = attempt,
                        error = %error,
                        "Operation failed after all attempts"
                    );
                    return RetryResult::Exhausted(error);
                }

                tracing::debug!(
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "Retryable failure, trying again"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (retryable: {})", self.retryable)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_bounded(RetryPolicy::default(), |_attempt| {
            let counter = counter_clone.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(TestError { retryable: true })
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert!(matches!(
            result,
            RetryResult::Success { value: "success", attempts: 3 }
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_after_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_bounded(RetryPolicy::with_max_attempts(2), |_attempt| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError { retryable: true })
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Exhausted(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_bounded(RetryPolicy::default(), |_attempt| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError { retryable: false })
            }
        })
        .await;

        assert!(matches!(result, RetryResult::PermanentFailure(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_numbers_start_at_one() {
        let mut seen = Vec::new();

        let _ = retry_bounded(RetryPolicy::default(), |attempt| {
            seen.push(attempt);
            async move { Err::<(), _>(TestError { retryable: true }) }
        })
        .await;

        assert_eq!(seen, vec![1, 2, 3]);
    }
}

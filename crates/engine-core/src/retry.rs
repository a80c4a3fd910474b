use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was classified as fatal and was not retried.
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded { attempts: usize, last: E },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` means no retry.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// A single attempt; the first failure is returned as is.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// `retries` additional attempts after the first, backing off from `base_delay`.
    pub fn with_retries(retries: usize, base_delay: Duration) -> Self {
        Self::new(retries + 1, base_delay, Duration::from_secs(5))
    }

    /// Executes the operation with the configured retry policy.
    ///
    /// `on_retry` is invoked with the attempt number that just failed before sleeping.
    pub async fn run<F, Fut, T, E, Classifier, OnRetry>(
        &self,
        mut op: F,
        classify: Classifier,
        mut on_retry: OnRetry,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
        OnRetry: FnMut(usize, &E),
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded {
                                attempts: attempt + 1,
                                last: err,
                            });
                        }

                        on_retry(attempt + 1, &err);
                        let delay = self.backoff_delay(attempt);
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying after failure"
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                },
            }
        }
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }

        let factor = 1u128 << attempt.min(6);
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(attempts: usize) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let mut retries = Vec::new();

        let result: Result<u32, RetryError<&str>> = fast(3)
            .run(
                move || async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("busy")
                    } else {
                        Ok(7)
                    }
                },
                |_| RetryDisposition::Retry,
                |attempt, _| retries.push(attempt),
            )
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries, vec![1, 2]);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), RetryError<&str>> = fast(5)
            .run(
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("conflict")
                },
                |_| RetryDisposition::Stop,
                |_, _| {},
            )
            .await;

        assert!(matches!(result, Err(RetryError::Fatal("conflict"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_retry_policy_makes_one_attempt() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), RetryError<&str>> = RetryPolicy::no_retry()
            .run(
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("down")
                },
                |_| RetryDisposition::Retry,
                |_, _| {},
            )
            .await;

        match result {
            Err(RetryError::AttemptsExceeded { attempts, last }) => {
                assert_eq!(attempts, 1);
                assert_eq!(last, "down");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(350));
    }
}

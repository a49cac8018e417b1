//! Async retry utilities with exponential backoff

use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff schedule
///
/// `max_attempts` counts the first try. The delay before attempt `n + 1` is
/// `initial_delay * 2^(n - 1)`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// Backoff to wait after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(2_u32.pow(exponent))
            .min(self.max_delay)
    }
}

/// Retry an async operation with exponential backoff.
///
/// Only errors accepted by `is_retryable` are retried; any other error is
/// returned immediately. No backoff is applied after the final attempt.
///
/// Returns `Ok((value, attempts))` on success, or `Err((error, attempts))` with
/// the last error unchanged on failure.
pub async fn retry_with_backoff_async<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> Result<(T, u32), (E, u32)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match operation(attempts).await {
            Ok(value) => return Ok((value, attempts)),
            Err(e) => {
                if !is_retryable(&e) || attempts >= policy.max_attempts {
                    return Err((e, attempts));
                }
                let delay = policy.delay_after(attempts);
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
        assert_eq!(policy.delay_after(4), Duration::from_secs(8));
        assert_eq!(policy.delay_after(5), Duration::from_secs(10));
        assert_eq!(policy.delay_after(40), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1));
        assert_eq!(policy.max_attempts, 1);
    }

    #[tokio::test]
    async fn test_success_on_first_try() {
        let result =
            retry_with_backoff_async(&fast_policy(), |_: &&str| true, |_| async { Ok::<_, &str>(7) })
                .await;
        assert_eq!(result, Ok((7, 1)));
    }

    #[tokio::test]
    async fn test_success_after_retry() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff_async(
            &fast_policy(),
            |_: &&str| true,
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err("transient error")
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(("done", 3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_after_max_retries() {
        let result = retry_with_backoff_async(
            &fast_policy(),
            |_: &&str| true,
            |_| async { Err::<(), _>("persistent error") },
        )
        .await;
        let (error, attempts) = result.unwrap_err();
        assert_eq!(error, "persistent error");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff_async(
            &fast_policy(),
            |e: &&str| *e != "terminal",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("terminal") }
            },
        )
        .await;
        assert_eq!(result, Err(("terminal", 1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_number_passed_to_operation() {
        let seen = parking_lot::Mutex::new(Vec::new());
        let _ = retry_with_backoff_async(
            &fast_policy(),
            |_: &&str| true,
            |attempt| {
                seen.lock().push(attempt);
                async { Err::<(), _>("boom") }
            },
        )
        .await;
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }
}

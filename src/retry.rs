//! Bounded retry with exponential backoff, and the injectable delay used for it.
//!
//! Only the bulk upstream calls go through [`call_with_retry`]. Per-publication
//! detail fetches degrade instead of retrying.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, warn};

/// Something that can wait. Production code sleeps on the tokio timer,
/// tests record the requested delays instead.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records every requested delay and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(duration);
        }
    }
}

/// Retry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before the retry that follows the failed attempt `attempt_index` (0-based).
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt_index))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// Run `operation` up to `policy.max_attempts` times.
///
/// Sleeps `base_delay * 2^attempt` between attempts, no jitter. A policy with
/// zero attempts still runs the operation once.
///
/// # Arguments
///
/// * `policy` - Attempt count and base delay
/// * `sleeper` - Where the waits between attempts go
/// * `label` - Operation name used in log lines
/// * `operation` - Closure producing a fresh future per attempt
///
/// # Returns
///
/// The first successful value
///
/// # Errors
///
/// The last error once attempts are exhausted
pub async fn call_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = label,
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs_f64(),
                    error = %e,
                    "Attempt failed, retrying"
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(operation = label, attempts = max_attempts, error = %e, "All attempts failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result: Result<&str, String> =
            call_with_retry(&RetryPolicy::default(), &sleeper, "flaky", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(format!("failure {}", n))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.calls(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), String> =
            call_with_retry(&RetryPolicy::default(), &sleeper, "down", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {}", n)) }
            })
            .await;

        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // No sleep after the final attempt
        assert_eq!(sleeper.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_single_attempt_never_sleeps() {
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(1, Duration::from_secs(5));

        let result: Result<(), &str> =
            call_with_retry(&policy, &sleeper, "strict", || async { Err("boom") }).await;

        assert_eq!(result, Err("boom"));
        assert!(sleeper.calls().is_empty());
    }
}

//! Retry policies for executor calls.
//!
//! Device transports fail transiently; every executor call the engine makes
//! goes through a [`RetryPolicy`]: a bounded number of attempts with
//! configurable backoff and optional jitter. Exhausting the policy surfaces
//! as a distinct error so callers can tell "the device could not be reached"
//! from "your input was bad".

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for calculating delay between retries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,

    /// Linear backoff: delay = initial_delay * (attempt + 1)
    Linear,

    /// Exponential backoff: delay = initial_delay * multiplier^attempt
    Exponential {
        /// Multiplier for exponential growth (default: 2.0)
        multiplier: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential { multiplier: 2.0 }
    }
}

impl BackoffStrategy {
    /// Calculates the delay for a given attempt number (0-indexed).
    pub fn calculate_delay(&self, attempt: u32, initial_delay: Duration) -> Duration {
        let base_millis = initial_delay.as_millis() as f64;

        let delay_millis = match self {
            Self::Constant => base_millis,
            Self::Linear => base_millis * (attempt as f64 + 1.0),
            Self::Exponential { multiplier } => base_millis * multiplier.powf(attempt as f64),
        };

        Duration::from_millis(delay_millis as u64)
    }
}

/// Jitter strategy for adding randomness to delays, preventing many clients
/// from retrying at exactly the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter - use the exact calculated delay.
    None,

    /// Full jitter: random value between 0 and the calculated delay.
    Full,
}

impl Default for JitterStrategy {
    fn default() -> Self {
        Self::Full
    }
}

impl JitterStrategy {
    /// Applies jitter to a calculated delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Self::None => delay,
            Self::Full => {
                let delay_millis = delay.as_millis() as f64;
                if delay_millis > 0.0 {
                    let mut rng = rand::thread_rng();
                    Duration::from_millis(rng.gen_range(0.0..delay_millis) as u64)
                } else {
                    Duration::ZERO
                }
            }
        }
    }
}

/// Retry policy: attempt cap, delays, backoff, and jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 means no retries, just the
    /// initial attempt).
    pub max_retries: u32,

    /// Initial delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (caps exponential growth).
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Backoff strategy for calculating delays.
    pub backoff: BackoffStrategy,

    /// Jitter strategy for adding randomness.
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Creates a policy with constant delay retries.
    pub fn constant(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            max_delay: delay,
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
        }
    }

    /// Creates a policy with exponential backoff and full jitter.
    pub fn exponential(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff: BackoffStrategy::Exponential { multiplier: 2.0 },
            jitter: JitterStrategy::Full,
        }
    }

    /// Calculates the delay for a given attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.backoff.calculate_delay(attempt, self.initial_delay);
        self.jitter.apply(base_delay.min(self.max_delay))
    }

    /// Checks whether another attempt is allowed.
    pub fn should_continue(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Executes an async operation with retry logic.
    ///
    /// Returns the first success, or a [`RetryError`] wrapping the last
    /// error once the attempt cap is reached.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_continue(attempt) {
                        return Err(RetryError {
                            attempts: attempt + 1,
                            last_error: error,
                        });
                    }

                    let delay = self.delay_for_attempt(attempt);
                    warn!(attempt = attempt + 1, %error, ?delay, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// All retry attempts were exhausted.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Number of attempts made.
    pub attempts: u32,
    /// The last error encountered.
    pub last_error: E,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "retries exhausted after {} attempts, last error: {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_constant() {
        let strategy = BackoffStrategy::Constant;
        let initial = Duration::from_secs(1);

        assert_eq!(strategy.calculate_delay(0, initial), Duration::from_secs(1));
        assert_eq!(strategy.calculate_delay(5, initial), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_exponential() {
        let strategy = BackoffStrategy::Exponential { multiplier: 2.0 };
        let initial = Duration::from_secs(1);

        assert_eq!(strategy.calculate_delay(0, initial), Duration::from_secs(1));
        assert_eq!(strategy.calculate_delay(1, initial), Duration::from_secs(2));
        assert_eq!(strategy.calculate_delay(3, initial), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff: BackoffStrategy::Exponential { multiplier: 2.0 },
            jitter: JitterStrategy::None,
        };
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
    }

    #[test]
    fn test_full_jitter_stays_in_range() {
        let jitter = JitterStrategy::Full;
        let delay = Duration::from_secs(10);
        for _ in 0..100 {
            assert!(jitter.apply(delay) <= delay);
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let policy = RetryPolicy::constant(3, Duration::from_millis(5));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<i32, RetryError<&str>> = policy
            .execute(|| {
                let c = counter_clone.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient error")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let policy = RetryPolicy::constant(2, Duration::from_millis(5));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<i32, RetryError<&str>> = policy
            .execute(|| {
                let c = counter_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("persistent error")
                }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let policy = RetryPolicy::no_retry();
        let result: Result<(), RetryError<&str>> =
            policy.execute(|| async { Err("boom") }).await;
        assert_eq!(result.unwrap_err().attempts, 1);
    }
}

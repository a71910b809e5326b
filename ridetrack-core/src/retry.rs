//! Bounded retry with exponential backoff for optimistic-concurrency writes.
//!
//! A write that loses a compare-and-swap race is re-read and re-attempted a
//! few times. When the attempts run out the caller receives
//! [`BookingError::Conflict`] and decides whether to try again.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::{BookingError, BookingResult};

/// Retry policy for lost compare-and-swap races.
///
/// # Default Values
///
/// - `max_attempts`: 5 (first try included)
/// - `initial_delay`: 5ms
/// - `max_delay`: 200ms
/// - `multiplier`: 2.0
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits between attempts.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (0-based), capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let factor = self.multiplier.powi(attempt.min(32) as i32);
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }

    /// Run `attempt` until it commits.
    ///
    /// The closure returns `Ok(Some(value))` when its write committed,
    /// `Ok(None)` when it lost the race, and `Err` for failures that must not
    /// be retried (validation, missing records, store outages).
    pub async fn run<T, F, Fut>(&self, label: &str, mut attempt: F) -> BookingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BookingResult<Option<T>>>,
    {
        let attempts = self.max_attempts.max(1);
        for n in 0..attempts {
            if let Some(value) = attempt().await? {
                return Ok(value);
            }
            if n + 1 < attempts {
                let delay = self.delay_for_attempt(n);
                warn!("{}: lost concurrent update (attempt {}), retrying in {:?}", label, n + 1, delay);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
        }
        Err(BookingError::Conflict { attempts })
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_delay_is_exponential_and_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(5));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_run_retries_until_commit() {
        let calls = AtomicUsize::new(0);
        let result = RetryPolicy::immediate(5)
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(if n < 2 { None } else { Some(n) })
            })
            .await
            .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_surfaces_conflict_after_last_attempt() {
        let calls = AtomicUsize::new(0);
        let err = RetryPolicy::immediate(3)
            .run::<(), _, _>("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Conflict { attempts: 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_errors() {
        let calls = AtomicUsize::new(0);
        let err = RetryPolicy::immediate(3)
            .run::<(), _, _>("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BookingError::InvalidRequest("bad".to_string()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::InvalidRequest(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_deserializes_from_millis() {
        let policy: RetryPolicy = serde_json::from_str(
            r#"{"max_attempts": 4, "initial_delay": 10, "max_delay": 100, "multiplier": 3.0}"#,
        )
        .unwrap();
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(30));
    }
}

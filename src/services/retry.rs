//! Retry policy shared by the evaluator gateway and history appends.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::{Classify, FailureKind};
use crate::domain::models::RetryConfig;

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// Calls made, including the first.
    pub attempts: u32,
}

/// Jittered exponential backoff over transient failure kinds.
///
/// `should_retry` is the only place that decides whether a failure is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64, jitter: f64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
            jitter: jitter.clamp(0.0, 0.99),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, 0, 0, 0.0)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
            config.jitter,
        )
    }

    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Retry only transient kinds, and only while retries remain.
    /// Unclassified errors are never retried.
    pub fn should_retry(&self, kind: Option<FailureKind>, retries_done: u32) -> bool {
        retries_done < self.max_retries && kind.is_some_and(FailureKind::is_transient)
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.initial_backoff_ms))
            .with_randomization_factor(self.jitter)
            .with_multiplier(2.0)
            .with_max_interval(Duration::from_millis(self.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build()
    }

    /// Upper bound on total sleep time across all retries.
    pub fn max_total_delay(&self) -> Duration {
        let mut total = 0.0_f64;
        let mut interval = self.initial_backoff_ms as f64;
        for _ in 0..self.max_retries {
            let capped = interval.min(self.max_backoff_ms as f64);
            total += capped * (1.0 + self.jitter);
            interval *= 2.0;
        }
        Duration::from_millis(total.ceil() as u64)
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let mut backoff = self.backoff();
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(retries, "operation succeeded after retries");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: retries + 1,
                    };
                }
                Err(err) => {
                    let kind = err.failure_kind();
                    if self.should_retry(kind, retries) {
                        let delay = backoff
                            .next_backoff()
                            .unwrap_or_else(|| Duration::from_millis(self.max_backoff_ms));
                        warn!(
                            attempt = retries + 1,
                            kind = ?kind,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "transient failure, retrying"
                        );
                        sleep(delay).await;
                        retries += 1;
                    } else {
                        if retries >= self.max_retries && kind.is_some_and(FailureKind::is_transient) {
                            warn!(attempts = retries + 1, error = %err, "retries exhausted");
                        } else {
                            debug!(error = %err, "permanent failure, not retrying");
                        }
                        return RetryOutcome {
                            result: Err(err),
                            attempts: retries + 1,
                        };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, 1, 2, 0.0)
    }

    #[test]
    fn test_should_retry_only_transient() {
        let policy = fast(3);
        assert!(policy.should_retry(Some(FailureKind::Timeout), 0));
        assert!(policy.should_retry(Some(FailureKind::InfrastructureError), 2));
        assert!(!policy.should_retry(Some(FailureKind::Timeout), 3));
        assert!(!policy.should_retry(Some(FailureKind::SolverDivergence), 0));
        assert!(!policy.should_retry(Some(FailureKind::InvalidGeometry), 0));
        assert!(!policy.should_retry(None, 0));
    }

    #[test]
    fn test_max_total_delay_caps_each_interval() {
        let policy = RetryPolicy::new(3, 100, 150, 0.0);
        assert_eq!(policy.max_total_delay(), Duration::from_millis(100 + 150 + 150));
        assert_eq!(RetryPolicy::none().max_total_delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_execute_retries_transient_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let outcome = fast(3)
            .execute(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DomainError::StoreUnavailable("busy".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(outcome.result.unwrap(), 7);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_execute_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let outcome: RetryOutcome<(), _> = fast(2)
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DomainError::StoreUnavailable("down".to_string()))
            })
            .await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_does_not_retry_permanent_errors() {
        let outcome: RetryOutcome<(), _> = fast(5)
            .execute(|| async {
                Err(DomainError::IterationConflict {
                    attempted: 1,
                    last: Some(1),
                })
            })
            .await;
        assert_eq!(outcome.attempts, 1);
    }
}

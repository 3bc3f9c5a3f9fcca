//! Bounded retry as an explicit state machine.
//!
//! A transfer moves through `Attempting -> Verifying -> {Succeeded | Retrying | Exhausted}`.
//! `Retrying` waits for the next interval of the policy's backoff and goes back to
//! `Attempting`; nothing recurses and nothing is retried by unwinding an error.

use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;
use tokio_retry2::strategy::FixedInterval;
use tracing::{debug, error, warn};

/// How many times a transfer may be attempted, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// A policy of at least one attempt.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// One pause per retry, i.e. `max_attempts - 1` intervals.
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        FixedInterval::from_millis(self.delay.as_millis() as u64)
            .take(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// A transfer that can be attempted and then verified.
#[async_trait]
pub(crate) trait AttemptTask: Send {
    /// Evidence produced by a transfer and checked by `verify`.
    type Receipt: Send;

    /// Short name used in log lines.
    fn label(&self) -> String;

    async fn transfer(&mut self, attempt: u32) -> Result<Self::Receipt, FetchError>;

    async fn verify(&mut self, receipt: Self::Receipt) -> Result<(), FetchError>;
}

/// States of one bounded transfer.
#[derive(Debug)]
pub(crate) enum AttemptState<R> {
    Attempting { attempt: u32 },
    Verifying { attempt: u32, receipt: R },
    Retrying { attempt: u32, error: FetchError },
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32, error: FetchError },
}

/// Terminal result of [`run_attempts`].
#[derive(Debug)]
pub struct AttemptReport {
    pub attempts: u32,
    /// The error of the final attempt when the budget was exhausted.
    pub error: Option<FetchError>,
}

impl AttemptReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

fn after_failure<R>(attempt: u32, error: FetchError, policy: &RetryPolicy) -> AttemptState<R> {
    if attempt < policy.max_attempts {
        AttemptState::Retrying { attempt, error }
    } else {
        AttemptState::Exhausted {
            attempts: attempt,
            error,
        }
    }
}

/// Drives `task` until it verifies or runs out of attempts.
pub(crate) async fn run_attempts<T>(task: &mut T, policy: &RetryPolicy) -> AttemptReport
where
    T: AttemptTask + ?Sized,
{
    let label = task.label();
    let mut backoff = policy.backoff();
    let mut state: AttemptState<T::Receipt> = AttemptState::Attempting { attempt: 1 };

    loop {
        state = match state {
            AttemptState::Attempting { attempt } => {
                debug!("{}: attempt {}/{}", label, attempt, policy.max_attempts);
                match task.transfer(attempt).await {
                    Ok(receipt) => AttemptState::Verifying { attempt, receipt },
                    Err(e) => after_failure(attempt, e, policy),
                }
            }
            AttemptState::Verifying { attempt, receipt } => {
                debug!("{}: verifying attempt {}", label, attempt);
                match task.verify(receipt).await {
                    Ok(()) => AttemptState::Succeeded { attempts: attempt },
                    Err(e) => after_failure(attempt, e, policy),
                }
            }
            AttemptState::Retrying { attempt, error } => {
                warn!(
                    "{}: attempt {}/{} failed: {}",
                    label, attempt, policy.max_attempts, error
                );
                if let Some(delay) = backoff.next() {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                AttemptState::Attempting {
                    attempt: attempt + 1,
                }
            }
            AttemptState::Succeeded { attempts } => {
                debug!("{}: succeeded after {} attempt(s)", label, attempts);
                return AttemptReport {
                    attempts,
                    error: None,
                };
            }
            AttemptState::Exhausted { attempts, error } => {
                error!("{}: giving up after {} attempt(s): {}", label, attempts, error);
                return AttemptReport {
                    attempts,
                    error: Some(error),
                };
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails `transfer_failures` transfers, then `verify_failures` verifications.
    struct Scripted {
        transfer_failures: u32,
        verify_failures: u32,
        transfers: u32,
    }

    impl Scripted {
        fn new(transfer_failures: u32, verify_failures: u32) -> Self {
            Self {
                transfer_failures,
                verify_failures,
                transfers: 0,
            }
        }
    }

    #[async_trait]
    impl AttemptTask for Scripted {
        type Receipt = u32;

        fn label(&self) -> String {
            "scripted".to_string()
        }

        async fn transfer(&mut self, attempt: u32) -> Result<u32, FetchError> {
            self.transfers += 1;
            if self.transfer_failures > 0 {
                self.transfer_failures -= 1;
                return Err(FetchError::UnexpectedStatus {
                    url: "http://localhost".to_string(),
                    status: 503,
                });
            }
            Ok(attempt)
        }

        async fn verify(&mut self, receipt: u32) -> Result<(), FetchError> {
            if self.verify_failures > 0 {
                self.verify_failures -= 1;
                return Err(FetchError::LengthMismatch {
                    expected: 10,
                    actual: u64::from(receipt),
                });
            }
            Ok(())
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_first_attempt_succeeds() {
        let mut task = Scripted::new(0, 0);
        let report = run_attempts(&mut task, &policy(3)).await;
        assert!(report.succeeded());
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_k_failures() {
        for k in 0..3 {
            let mut task = Scripted::new(0, k);
            let report = run_attempts(&mut task, &policy(3)).await;
            assert!(report.succeeded(), "k = {}", k);
            assert_eq!(report.attempts, k + 1);
        }
    }

    #[tokio::test]
    async fn test_mixed_failures_share_one_budget() {
        let mut task = Scripted::new(1, 1);
        let report = run_attempts(&mut task, &policy(3)).await;
        assert!(report.succeeded());
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let mut task = Scripted::new(0, 3);
        let report = run_attempts(&mut task, &policy(3)).await;
        assert!(!report.succeeded());
        assert_eq!(report.attempts, 3);
        assert!(matches!(
            report.error,
            Some(FetchError::LengthMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_never_exceeds_budget() {
        let mut task = Scripted::new(10, 0);
        let report = run_attempts(&mut task, &policy(2)).await;
        assert_eq!(report.attempts, 2);
        assert_eq!(task.transfers, 2);
    }

    #[test]
    fn test_policy_has_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_backoff_has_one_pause_per_retry() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let pauses: Vec<Duration> = policy.backoff().collect();
        assert_eq!(pauses, vec![Duration::from_millis(10); 2]);
    }
}

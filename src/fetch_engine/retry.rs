//! Shared retry policy with exponential backoff.
//!
//! Every network-facing operation in the crate (page fetch tasks, listing
//! and detail queries, document downloads) goes through one [`RetryPolicy`]
//! instead of carrying its own ad hoc loop.

use log::{debug, info, warn};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::fetch_types::{ErrorKind, FetchError};

/// Predicate deciding whether an error kind earns another attempt.
pub type RetryablePredicate = Arc<dyn Fn(ErrorKind) -> bool + Send + Sync>;

/// Retry parameters `(max_attempts, base, retryable)`.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    retryable: RetryablePredicate,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::utils::DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(crate::utils::DEFAULT_BACKOFF_BASE_MS),
        )
    }
}

impl RetryPolicy {
    /// Policy retrying the kinds [`ErrorKind::is_retryable`] accepts.
    ///
    /// `max_attempts` counts the first try; values below 1 are raised to 1.
    #[must_use]
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            retryable: Arc::new(|kind: ErrorKind| kind.is_retryable()),
        }
    }

    /// Replace the retryable predicate.
    #[must_use]
    pub fn with_predicate(
        mut self,
        predicate: impl Fn(ErrorKind) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retryable = Arc::new(predicate);
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn base(&self) -> Duration {
        self.base
    }

    #[must_use]
    pub fn is_retryable(&self, error: &FetchError) -> bool {
        (self.retryable)(error.kind())
    }

    /// Wait before the `retry`-th retry (1-based): `base * 2^(retry-1)`.
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base.saturating_mul(1u32 << exponent)
    }

    /// Drive `operation` until it succeeds, fails fatally, or runs out of attempts.
    ///
    /// `operation` receives the 1-based attempt number. The policy never
    /// panics or propagates: the terminal state is returned as a [`RetryResult`].
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> RetryResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut state = RetryState::new(self.max_attempts);
        debug!("{label}: {:?}", AttemptPhase::Pending);

        loop {
            state.attempt += 1;
            debug!(
                "{label}: {:?} (attempt {}/{})",
                AttemptPhase::Fetching,
                state.attempt,
                state.max_attempts
            );

            match operation(state.attempt).await {
                Ok(value) => {
                    debug!(
                        "{label}: {:?} after {} attempt(s)",
                        AttemptPhase::Succeeded,
                        state.attempt
                    );
                    return RetryResult::Succeeded {
                        value,
                        attempts: state.attempt,
                    };
                }
                Err(error) => {
                    if !self.is_retryable(&error) {
                        warn!(
                            "{label}: fatal {} on attempt {}: {error}",
                            error.kind(),
                            state.attempt
                        );
                        return RetryResult::Exhausted {
                            error,
                            attempts: state.attempt,
                        };
                    }
                    if state.attempt >= state.max_attempts {
                        warn!(
                            "{label}: {:?} after {} attempts, last error: {error}",
                            AttemptPhase::Exhausted,
                            state.attempt
                        );
                        return RetryResult::Exhausted {
                            error,
                            attempts: state.attempt,
                        };
                    }

                    state.next_delay = self.backoff_delay(state.attempt);
                    info!(
                        "{label}: attempt {}/{} failed ({error}), {:?} in {:?}",
                        state.attempt,
                        state.max_attempts,
                        AttemptPhase::RetryScheduled,
                        state.next_delay
                    );
                    tokio::time::sleep(state.next_delay).await;
                }
            }
        }
    }
}

/// Per-execution bookkeeping. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub next_delay: Duration,
}

impl RetryState {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            next_delay: Duration::ZERO,
        }
    }
}

/// Phases a retried operation moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Pending,
    Fetching,
    RetryScheduled,
    Succeeded,
    Exhausted,
}

/// Terminal state of [`RetryPolicy::execute`].
#[derive(Debug)]
pub enum RetryResult<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { error: FetchError, attempts: u32 },
}

impl<T> RetryResult<T> {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> Result<T, FetchError> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Exhausted { error, .. } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = policy
            .execute("flaky", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(FetchError::NetworkTimeout("slow".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert!(matches!(result, RetryResult::Succeeded { value: 1, attempts: 2 }));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_skip_retries() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let start = Instant::now();

        let result: RetryResult<()> = policy
            .execute("gone", |_| async {
                Err(FetchError::ClientError {
                    status: 404,
                    url: "u".into(),
                })
            })
            .await;

        match result {
            RetryResult::Exhausted { error, attempts } => {
                assert_eq!(error.kind(), ErrorKind::ClientError);
                assert_eq!(attempts, 1);
            }
            RetryResult::Succeeded { .. } => panic!("404 must not succeed"),
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_predicate_overrides_taxonomy() {
        let policy = RetryPolicy::new(4, Duration::from_millis(10)).with_predicate(|_| false);
        let result: RetryResult<()> = policy
            .execute("never", |_| async { Err(FetchError::NetworkTimeout("x".into())) })
            .await;
        assert_eq!(result.attempts(), 1);
    }
}

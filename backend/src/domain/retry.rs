//! Bounded retries with jittered exponential backoff.
//!
//! The helper is generic over the operation and its error. Callers decide
//! which errors are transient through a classifier, and may pass a commit
//! probe that is consulted before a non-idempotent write is re-issued.

use std::fmt;
use std::future::{Future, ready};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use rand::Rng;
use tracing::{debug, warn};

/// Retry bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts per operation, including the first call.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for the un-jittered delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay after `attempt` failed: `initial * 2^(attempt-1)`,
    /// capped at `max_backoff`.
    ///
    /// ```
    /// # use accounts_backend::domain::retry::RetryPolicy;
    /// # use std::time::Duration;
    /// let policy = RetryPolicy {
    ///     max_attempts: 5,
    ///     initial_backoff: Duration::from_millis(100),
    ///     max_backoff: Duration::from_millis(300),
    /// };
    /// assert_eq!(policy.base_delay(1), Duration::from_millis(100));
    /// assert_eq!(policy.base_delay(2), Duration::from_millis(200));
    /// assert_eq!(policy.base_delay(3), Duration::from_millis(300));
    /// ```
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let base_ms = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(u64::from(exponent)).min(max_ms))
    }
}

/// Whether a failed attempt should be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Transient failure; try again if attempts remain.
    Retry,
    /// Permanent failure; surface it immediately.
    Abort,
}

impl RetryDisposition {
    /// Map a boolean "is transient" classification.
    pub const fn from_retryable(retryable: bool) -> Self {
        if retryable { Self::Retry } else { Self::Abort }
    }
}

/// Async sleeping abstraction so tests can retry without real delays.
#[async_trait]
pub trait RetrySleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Jitter applied on top of the exponential base delay.
pub trait BackoffJitter: Send + Sync {
    /// Return the delay to sleep before attempt `attempt + 1`.
    fn jittered_delay(&self, base: Duration, attempt: u32, now: DateTime<Utc>) -> Duration;
}

/// Tokio-based sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl RetrySleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Adds a uniformly random extra of up to 25% of the base delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl BackoffJitter for RandomJitter {
    fn jittered_delay(&self, base: Duration, _attempt: u32, _now: DateTime<Utc>) -> Duration {
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let max_extra = base_ms / 4;
        let extra = rand::thread_rng().gen_range(0..=max_extra);
        Duration::from_millis(base_ms.saturating_add(extra))
    }
}

/// Sleep and jitter strategies used by [`Retrier`].
#[derive(Clone)]
pub struct RetryRuntime {
    /// Async sleep implementation.
    pub sleeper: Arc<dyn RetrySleeper>,
    /// Jitter strategy for retry delays.
    pub jitter: Arc<dyn BackoffJitter>,
}

impl Default for RetryRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(RandomJitter),
        }
    }
}

/// Executes operations under a [`RetryPolicy`].
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    runtime: RetryRuntime,
    clock: Arc<dyn Clock>,
}

impl Retrier {
    /// Build a retrier.
    pub fn new(policy: RetryPolicy, runtime: RetryRuntime, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            runtime,
            clock,
        }
    }

    /// The policy in force.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `op` until it succeeds, `classify` aborts, or attempts run out.
    ///
    /// The last error is returned when retries are exhausted.
    pub async fn run<T, E, Op, Fut, C>(&self, operation: &'static str, op: Op, classify: C) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> RetryDisposition,
        E: fmt::Display,
    {
        self.run_with_probe(operation, op, classify, || ready(Ok(None)))
            .await
    }

    /// Like [`Retrier::run`], but consults `probe` before every re-issue.
    ///
    /// A probe returning `Ok(Some(value))` means the previous attempt did
    /// commit even though its reply was lost; that value is returned without
    /// calling `op` again. Probe failures are logged and the retry proceeds.
    pub async fn run_with_probe<T, E, Op, Fut, C, P, PFut>(
        &self,
        operation: &'static str,
        mut op: Op,
        classify: C,
        mut probe: P,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> RetryDisposition,
        P: FnMut() -> PFut,
        PFut: Future<Output = Result<Option<T>, E>>,
        E: fmt::Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            if classify(&error) == RetryDisposition::Abort || attempt >= max_attempts {
                return Err(error);
            }

            let delay = self.runtime.jitter.jittered_delay(
                self.policy.base_delay(attempt),
                attempt,
                self.clock.utc(),
            );
            debug!(
                operation,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                %error,
                "retrying after transient failure"
            );
            self.runtime.sleeper.sleep(delay).await;

            match probe().await {
                Ok(Some(value)) => {
                    debug!(operation, attempt, "previous attempt had committed");
                    return Ok(value);
                }
                Ok(None) => {}
                Err(probe_error) => {
                    warn!(operation, attempt, error = %probe_error, "commit probe failed");
                }
            }
            attempt += 1;
        }
    }
}

/// Bound `future` by `limit`, mapping expiry through `on_elapsed`.
pub async fn within<T, E, F>(
    limit: Duration,
    future: F,
    on_elapsed: impl FnOnce() -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(on_elapsed()),
    }
}

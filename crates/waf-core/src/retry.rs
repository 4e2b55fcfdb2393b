//! Retry budget, backoff and cancellation.
//!
//! [`with_retry`] re-runs a whole request chain while the outcome is a
//! transient failure or a connectivity error. Every other outcome is returned
//! after the first attempt. The caller's [`OperationContext`] is honored
//! around each attempt and during every backoff wait.

use crate::classify::Outcome;
use crate::error::{Error, Failure, Result};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default number of attempts, counting the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default initial retry delay in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Default maximum retry delay in milliseconds (for exponential backoff)
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5000;

/// Delay schedule between attempts.
#[derive(Clone)]
pub enum Backoff {
    /// Same delay before every retry
    Constant(Duration),
    /// `initial * multiplier^(retry - 1)`, capped at `max`
    Exponential {
        /// Delay before the first retry
        initial: Duration,
        /// Growth factor per retry
        multiplier: u32,
        /// Upper bound
        max: Duration,
    },
    /// Caller-supplied function of the retry number (starting at 1)
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Backoff {
    /// Raw delay before retry number `retry`. May decrease for custom
    /// functions; [`RetryBudget`] flattens it.
    #[must_use]
    pub fn raw_delay(&self, retry: u32) -> Duration {
        match self {
            Self::Constant(delay) => *delay,
            Self::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let factor = multiplier.saturating_pow(retry.saturating_sub(1));
                initial.saturating_mul(factor).min(*max)
            }
            Self::Custom(delay_fn) => delay_fn(retry),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            initial: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            multiplier: 2,
            max: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(delay) => f.debug_tuple("Constant").field(delay).finish(),
            Self::Exponential {
                initial,
                multiplier,
                max,
            } => f
                .debug_struct("Exponential")
                .field("initial", initial)
                .field("multiplier", multiplier)
                .field("max", max)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Attempt limit plus backoff schedule for one logical operation.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryBudget {
    /// Default budget: 3 attempts, exponential backoff from 500ms capped at 5s.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
        }
    }

    /// A single attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Constant(Duration::ZERO),
        }
    }

    /// Set the attempt limit. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the backoff schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Use a custom delay function.
    #[must_use]
    pub fn with_backoff_fn<F>(self, delay_fn: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.with_backoff(Backoff::Custom(Arc::new(delay_fn)))
    }

    /// Maximum number of attempts, always at least 1.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The backoff schedule.
    #[must_use]
    pub const fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Delays between consecutive attempts, `max_attempts - 1` of them.
    ///
    /// The sequence never decreases, whatever the backoff function returns.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).scan(Duration::ZERO, |floor, retry| {
            *floor = (*floor).max(self.backoff.raw_delay(retry));
            Some(*floor)
        })
    }

    /// Delay before retry number `retry` (1 is the wait after the first attempt).
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        (1..=retry)
            .map(|n| self.backoff.raw_delay(n))
            .max()
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-supplied deadline and cancellation for one operation.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl OperationContext {
    /// No deadline, no cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop at an absolute instant.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop after `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Stop when the token is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once the deadline passed or the token was cancelled.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run `fut` unless the context expires first; `None` on expiry.
    pub async fn guard<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => None,
            () = expired => None,
            output = fut => Some(output),
        }
    }

    /// Sleep for `delay`. Returns false if the context expired first.
    pub async fn sleep(&self, delay: Duration) -> bool {
        self.guard(tokio::time::sleep(delay)).await.is_some()
    }
}

fn deadline_exceeded(endpoint: &str, attempts: u32) -> Error {
    Error::DeadlineExceeded {
        endpoint: endpoint.to_string(),
        attempts,
    }
}

fn is_retryable(result: &Result<Outcome>) -> bool {
    match result {
        Ok(outcome) => matches!(outcome, Outcome::TransientFailure(_)),
        Err(err) => matches!(err, Error::Connectivity(_)),
    }
}

/// Turn the last retryable result into a terminal permanent failure.
fn exhausted(result: Result<Outcome>, endpoint: &str, attempts: u32) -> Result<Outcome> {
    let mut failure = match result {
        Ok(Outcome::TransientFailure(failure)) => failure,
        Err(Error::Connectivity(message)) => Failure::new(endpoint, message),
        other => return other,
    };
    failure.attempts = attempts;
    failure.retries_exhausted = true;
    Ok(Outcome::PermanentFailure(failure))
}

/// Run `call` under `budget`, retrying transient failures and connectivity
/// errors with backoff.
///
/// `call` receives the 1-based attempt number. When the budget runs out the
/// last failure comes back as [`Outcome::PermanentFailure`] with the attempt
/// count recorded.
///
/// # Errors
///
/// Returns [`Error::DeadlineExceeded`] when the context expires before or
/// during an attempt or a backoff wait; no further attempt is issued.
/// Non-retryable errors from `call` are returned unchanged.
pub async fn with_retry<F, Fut>(
    budget: &RetryBudget,
    ctx: &OperationContext,
    endpoint: &str,
    mut call: F,
) -> Result<Outcome>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Outcome>>,
{
    let mut attempt: u32 = 0;

    loop {
        if ctx.is_expired() {
            return Err(deadline_exceeded(endpoint, attempt));
        }

        attempt += 1;
        debug!(endpoint, attempt, "Dispatching request");

        let Some(result) = ctx.guard(call(attempt)).await else {
            return Err(deadline_exceeded(endpoint, attempt));
        };

        if !is_retryable(&result) {
            return result.map(|outcome| outcome.with_attempts(attempt));
        }

        if attempt >= budget.max_attempts() {
            warn!(endpoint, attempts = attempt, "Retry budget exhausted");
            return exhausted(result, endpoint, attempt);
        }

        let delay = budget.delay_for_retry(attempt);
        warn!(
            endpoint,
            attempt,
            ?delay,
            reason = %retry_reason(&result),
            "Transient failure, retrying"
        );

        if !ctx.sleep(delay).await {
            return Err(deadline_exceeded(endpoint, attempt));
        }
    }
}

fn retry_reason(result: &Result<Outcome>) -> String {
    match result {
        Ok(outcome) => outcome
            .failure()
            .map_or_else(String::new, ToString::to_string),
        Err(err) => err.to_string(),
    }
}

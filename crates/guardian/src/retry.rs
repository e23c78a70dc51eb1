//! Retry policy for the transport layer.
//!
//! Retries here are strictly network-layer: the predicate handed to
//! [`with_retry`] decides which errors qualify, and HTTP status codes never
//! reach it (a non-2xx response is a successful transport exchange).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::clock::Clock;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Delay before the first retry; each later retry doubles it.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(10);

/// Upper bound on a single retry delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(40);

/// Bounded exponential backoff.
///
/// The defaults reproduce the schedule 10s, 20s, 40s: three retries, so a
/// request is attempted at most four times.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub factor: f32,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Whether to randomize delays.
    pub with_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            factor: 2.0,
            max_delay: DEFAULT_MAX_DELAY,
            with_jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// The deterministic delay schedule (ignoring jitter).
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        let mut delays = Vec::with_capacity(self.max_retries);
        let mut next = self.initial_delay;
        for _ in 0..self.max_retries {
            delays.push(next.min(self.max_delay));
            next = next.mul_f32(self.factor);
        }
        delays
    }

    /// Build an exponential backoff strategy from this policy.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Sleeps through a [`Clock`].
///
/// A named type rather than a closure inside [`with_retry`]: backon requires
/// sleepers to be `'static`, and a closure would inherit `with_retry`'s
/// borrowed lifetimes, which makes the retry future fail `Send` checks.
struct ClockSleeper(Arc<dyn Clock>);

impl backon::Sleeper for ClockSleeper {
    type Sleep = Pin<Box<dyn Future<Output = ()> + Send>>;

    fn sleep(&self, delay: Duration) -> Self::Sleep {
        let clock = Arc::clone(&self.0);
        Box::pin(async move { clock.sleep(delay).await })
    }
}

/// Execute an operation, retrying errors accepted by `is_retryable`.
///
/// Sleeps go through `clock`, so tests drive the schedule with a manual
/// clock instead of waiting. `label` identifies the operation in logs.
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    operation: F,
    policy: &RetryPolicy,
    clock: Arc<dyn Clock>,
    is_retryable: IsRetryable,
    label: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error,
    IsRetryable: FnMut(&E) -> bool,
{
    let attempt = AtomicU32::new(0);
    let mut operation = operation;

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    let sleeper = ClockSleeper(clock);

    retry_op
        .retry(policy.clone().into_backoff())
        .sleep(sleeper)
        .when(is_retryable)
        .notify(|err, delay| {
            tracing::warn!(
                operation = label,
                attempt = attempt.load(Ordering::SeqCst),
                retry_in = ?delay,
                error = %err,
                "Transient failure, retrying"
            );
        })
        .await
}

//! Process-wide admission control for GraphQL requests.
//!
//! Two layers share one budget:
//!
//! - **Proactive**: when the API reports fewer than
//!   [`RateLimitPolicy::low_water_mark`] remaining requests, callers wait
//!   until the reported reset time plus a safety margin.
//! - **Reactive**: any failed response opens a backoff window that every
//!   caller honors, not only the one that saw the failure.
//!
//! All reads and writes of the budget happen under one `tokio::sync::Mutex`.
//! `admit` keeps the guard while it sleeps, so callers arriving during a
//! wait queue behind it and re-check the budget afterwards instead of each
//! computing its own wait.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};

/// Defaults for [`RateLimitPolicy`].
pub mod rate_limits {
    use std::time::Duration;

    /// Below this many remaining requests, wait for the reset.
    pub const LOW_WATER_MARK: u32 = 15;
    /// Extra wait past the reported reset time.
    pub const RESET_MARGIN: Duration = Duration::from_secs(5);
    /// Global backoff after a non-2xx response.
    pub const STATUS_BACKOFF: Duration = Duration::from_secs(120);
    /// Global backoff after a transport failure survives local retries.
    pub const TRANSPORT_BACKOFF: Duration = Duration::from_secs(60);
    /// Hourly GraphQL point budget for an authenticated user.
    pub const GRAPHQL_HOURLY_LIMIT: u32 = 5000;
}

/// Tunables for [`RateLimiter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub low_water_mark: u32,
    pub reset_margin: Duration,
    pub status_backoff: Duration,
    pub transport_backoff: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            low_water_mark: rate_limits::LOW_WATER_MARK,
            reset_margin: rate_limits::RESET_MARGIN,
            status_backoff: rate_limits::STATUS_BACKOFF,
            transport_backoff: rate_limits::TRANSPORT_BACKOFF,
        }
    }
}

/// The `rateLimit` object embedded in every query response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitTelemetry {
    pub limit: Option<u32>,
    pub cost: Option<u32>,
    pub remaining: Option<u32>,
    /// ISO-8601 timestamp with a `Z` suffix, e.g. `2025-08-11T07:33:48Z`.
    pub reset_at: Option<String>,
}

impl RateLimitTelemetry {
    /// Extract telemetry from a response `data` object, if present.
    #[must_use]
    pub fn from_data(data: &serde_json::Value) -> Option<Self> {
        data.get("rateLimit")
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Parse `reset_at`. `None` when absent; `Some(Err)` when unparseable.
    pub fn parse_reset_at(&self) -> Option<Result<DateTime<Utc>, chrono::ParseError>> {
        self.reset_at.as_deref().map(|raw| {
            DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
        })
    }
}

/// What happened to a request, as far as the budget is concerned.
#[derive(Debug, Clone, Copy)]
pub enum ResponseOutcome<'a> {
    /// 2xx response without query errors.
    Success(Option<&'a RateLimitTelemetry>),
    /// 2xx response reporting GraphQL errors.
    QueryError(Option<&'a RateLimitTelemetry>),
    /// Any non-2xx HTTP status.
    ApiError { status: u16 },
    /// Connection or read failure after transport retries were exhausted.
    TransportFailure,
}

/// Shared request budget. Only reachable through [`RateLimiter`].
#[derive(Debug, Default)]
struct RateBudget {
    remaining: Option<u32>,
    reset_at: Option<DateTime<Utc>>,
    error_backoff_until: Option<DateTime<Utc>>,
}

impl RateBudget {
    fn refresh(&mut self, telemetry: &RateLimitTelemetry) {
        let previous = self.remaining;
        self.remaining = telemetry.remaining;
        self.reset_at = match telemetry.parse_reset_at() {
            Some(Ok(reset_at)) => Some(reset_at),
            Some(Err(e)) => {
                tracing::warn!(
                    reset_at = ?telemetry.reset_at,
                    error = %e,
                    "Unparseable rate limit reset time; proactive throttling disabled until next refresh"
                );
                None
            }
            None => None,
        };

        tracing::debug!(
            remaining = ?self.remaining,
            limit = ?telemetry.limit,
            cost = ?telemetry.cost,
            reset_at = ?self.reset_at,
            "Rate limit refreshed"
        );

        if let Some(remaining) = self.remaining
            && remaining % 100 == 0
            && previous != Some(remaining)
        {
            tracing::info!(
                remaining,
                limit = telemetry.limit.unwrap_or(rate_limits::GRAPHQL_HOURLY_LIMIT),
                "Rate limit status"
            );
        }
    }
}

/// Global admission gate shared by every worker.
///
/// Cloning is cheap and yields a handle to the same budget.
#[derive(Clone)]
pub struct RateLimiter {
    budget: Arc<Mutex<RateBudget>>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), RateLimitPolicy::default())
    }
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, policy: RateLimitPolicy) -> Self {
        Self {
            budget: Arc::new(Mutex::new(RateBudget::default())),
            clock,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Wait until it is safe to send a request.
    ///
    /// Never fails: an unusable budget (unparseable reset time) only
    /// disables the proactive wait.
    pub async fn admit(&self) {
        let budget = self.budget.lock().await;
        let task = tokio::task::try_id();

        if let Some(remaining) = budget.remaining
            && remaining < self.policy.low_water_mark
            && let Some(reset_at) = budget.reset_at
            && let Some(resume_at) = after(reset_at, self.policy.reset_margin)
            && let Some(wait) = until(self.clock.now(), resume_at)
        {
            tracing::warn!(
                task = ?task,
                remaining,
                sleep_secs = wait.as_secs_f64(),
                "Rate limit nearly exhausted, sleeping until reset"
            );
            self.clock.sleep(wait).await;
        }

        if let Some(backoff_until) = budget.error_backoff_until
            && let Some(wait) = until(self.clock.now(), backoff_until)
        {
            tracing::warn!(
                task = ?task,
                sleep_secs = wait.as_secs_f64(),
                "Error backoff active, sleeping"
            );
            self.clock.sleep(wait).await;
        }

        drop(budget);
    }

    /// Fold a response outcome into the shared budget.
    pub async fn record(&self, outcome: ResponseOutcome<'_>) {
        let mut budget = self.budget.lock().await;
        let task = tokio::task::try_id();

        match outcome {
            ResponseOutcome::Success(telemetry) => {
                budget.error_backoff_until = None;
                if let Some(telemetry) = telemetry {
                    budget.refresh(telemetry);
                }
            }
            ResponseOutcome::QueryError(telemetry) => {
                if let Some(telemetry) = telemetry {
                    budget.refresh(telemetry);
                }
            }
            ResponseOutcome::ApiError { status } => {
                budget.error_backoff_until = after(self.clock.now(), self.policy.status_backoff);
                tracing::warn!(
                    task = ?task,
                    status,
                    backoff_secs = self.policy.status_backoff.as_secs(),
                    "API error response, all workers backing off"
                );
            }
            ResponseOutcome::TransportFailure => {
                budget.error_backoff_until =
                    after(self.clock.now(), self.policy.transport_backoff);
                tracing::warn!(
                    task = ?task,
                    backoff_secs = self.policy.transport_backoff.as_secs(),
                    "Persistent connection failure, all workers backing off"
                );
            }
        }
    }
}

fn after(instant: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| instant.checked_add_signed(d))
}

/// Positive time remaining from `now` until `deadline`.
fn until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Option<Duration> {
    (deadline - now).to_std().ok().filter(|d| !d.is_zero())
}

//! Time source used by the retry and rate-limit layers.
//!
//! Both layers compare against wall-clock timestamps reported by the API
//! (`resetAt`) and sleep for computed durations, so they take the clock as
//! an injected dependency instead of calling `Utc::now()` and
//! `tokio::time::sleep` directly.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Wall-clock reads and cooperative sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// The real clock: `chrono::Utc::now` and `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub use manual::ManualClock;

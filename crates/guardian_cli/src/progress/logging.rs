use guardian::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::ListingMembers { organizations } => {
                tracing::info!(organizations, "Listing organization members");
            }

            SyncProgress::OrganizationListed {
                organization,
                members,
            } => {
                tracing::info!(organization = %organization, members, "Listed organization");
            }

            SyncProgress::OrganizationFailed {
                organization,
                error,
            } => {
                // The library warns with the cause; this only marks the skip.
                tracing::info!(organization = %organization, error = %error, "Skipping organization");
            }

            SyncProgress::MembersDiscovered { total } => {
                tracing::info!(total, "Members discovered");
            }

            SyncProgress::FetchingSnapshots { members, workers } => {
                tracing::info!(members, workers, "Fetching member snapshots");
            }

            SyncProgress::MemberFetched {
                member,
                repositories,
                branches,
                completed,
                total,
            } => {
                tracing::info!(
                    member = %member,
                    repositories,
                    branches,
                    progress = %percent(completed, total),
                    "Fetched member"
                );
            }

            SyncProgress::MemberFailed {
                member,
                completed,
                total,
            } => {
                tracing::info!(
                    member = %member,
                    progress = %percent(completed, total),
                    "Member left out of snapshot"
                );
            }

            SyncProgress::FetchComplete { succeeded, failed } => {
                tracing::info!(succeeded, failed, "Fetch complete");
            }

            other => {
                tracing::debug!(event = ?other, "Progress");
            }
        }
    }
}

fn percent(completed: usize, total: usize) -> String {
    if total == 0 {
        return "100.0%".to_string();
    }
    format!("{:.1}%", completed as f64 * 100.0 / total as f64)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing::Level;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    use super::*;

    /// Counts events at WARN or above.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let level = *event.metadata().level();
            if level == Level::WARN || level == Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn percent_formats_one_decimal() {
        assert_eq!(percent(1, 3), "33.3%");
        assert_eq!(percent(3, 3), "100.0%");
        assert_eq!(percent(0, 0), "100.0%");
    }

    #[test]
    fn handles_every_event_without_a_subscriber() {
        let reporter = LoggingReporter::new();
        reporter.handle(SyncProgress::ListingMembers { organizations: 2 });
        reporter.handle(SyncProgress::MemberFetched {
            member: "alice".to_string(),
            repositories: 3,
            branches: 7,
            completed: 1,
            total: 2,
        });
        reporter.handle(SyncProgress::MemberFailed {
            member: "bob".to_string(),
            completed: 2,
            total: 2,
        });
        reporter.handle(SyncProgress::FetchComplete {
            succeeded: 1,
            failed: 1,
        });
    }

    #[test]
    fn failures_are_not_warned_twice() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber =
            tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));

        tracing::subscriber::with_default(subscriber, || {
            let reporter = LoggingReporter::new();
            reporter.handle(SyncProgress::OrganizationFailed {
                organization: "acme".to_string(),
                error: "HTTP 502".to_string(),
            });
            reporter.handle(SyncProgress::MemberFailed {
                member: "bob".to_string(),
                completed: 1,
                total: 1,
            });
        });

        assert_eq!(warnings.load(Ordering::SeqCst), 0);
    }
}

//! Notifier that writes to the log.

use async_trait::async_trait;

use guardian::scan::{Finding, Notifier, NotifyError};

/// Reports notifications as `warn!` lines, one per item.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_new_repositories(&self, urls: &[String]) -> Result<(), NotifyError> {
        for url in urls {
            tracing::warn!(repository_url = %url, "New public repository");
        }
        tracing::info!(count = urls.len(), "Reported new repositories");
        Ok(())
    }

    async fn notify_findings(&self, findings: &[Finding]) -> Result<(), NotifyError> {
        for finding in findings {
            tracing::warn!(
                detector = %finding.detector_name,
                repository_url = %finding.repository_url,
                branch = ?finding.branch,
                commit = ?finding.commit,
                link = %finding.link,
                "Secret found"
            );
        }
        Ok(())
    }
}

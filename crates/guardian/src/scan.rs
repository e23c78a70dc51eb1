//! Hand-off to the secret scanner and the notifier.
//!
//! Only the interfaces live here. Running a scanner binary and delivering
//! webhooks belong to implementations of [`SecretScanner`] and [`Notifier`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::{ChangeSet, CommitHash};

/// Something the scanner should look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanTarget {
    /// Commits on `branch` after `since`.
    SinceCommit {
        repository_url: String,
        branch: String,
        since: CommitHash,
    },
    /// A whole repository.
    Repository { repository_url: String },
    /// A whole branch.
    Branch {
        repository_url: String,
        branch: String,
    },
}

impl ScanTarget {
    #[must_use]
    pub fn repository_url(&self) -> &str {
        match self {
            Self::SinceCommit { repository_url, .. }
            | Self::Repository { repository_url }
            | Self::Branch { repository_url, .. } => repository_url,
        }
    }
}

/// Scan targets for a change set: updated commits, then new repositories
/// (one per repository), then new branches.
#[must_use]
pub fn scan_targets(changes: &ChangeSet) -> Vec<ScanTarget> {
    let updated = changes
        .updated_commits
        .iter()
        .map(|(key, update)| ScanTarget::SinceCommit {
            repository_url: key.repository_url(),
            branch: key.branch().to_string(),
            since: update.previous.clone(),
        });

    let repositories = new_repository_urls(changes)
        .into_iter()
        .map(|repository_url| ScanTarget::Repository { repository_url });

    let branches = changes.new_branches.keys().map(|key| ScanTarget::Branch {
        repository_url: key.repository_url(),
        branch: key.branch().to_string(),
    });

    updated.chain(repositories).chain(branches).collect()
}

/// URLs of newly discovered repositories, de-duplicated, in key order.
#[must_use]
pub fn new_repository_urls(changes: &ChangeSet) -> Vec<String> {
    let mut seen = BTreeSet::new();
    changes
        .new_repositories
        .keys()
        .filter(|key| seen.insert((key.member(), key.repository())))
        .map(|key| key.repository_url())
        .collect()
}

/// A secret reported by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub detector_name: String,
    /// Link to the offending line or commit.
    pub link: String,
    pub repository_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

#[derive(Debug, Error)]
#[error("secret scan failed for {target}: {message}")]
pub struct ScanError {
    pub target: String,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait SecretScanner: Send + Sync {
    async fn scan(&self, targets: &[ScanTarget]) -> Result<Vec<Finding>, ScanError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_new_repositories(&self, urls: &[String]) -> Result<(), NotifyError>;

    async fn notify_findings(&self, findings: &[Finding]) -> Result<(), NotifyError>;
}

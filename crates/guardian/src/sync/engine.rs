//! Member discovery and the snapshot fan-out.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{FetchOptions, FetchOutcome, FetchSummary};
use crate::github::{GraphQlClient, list_org_members};
use crate::snapshot::{MemberSnapshot, Snapshot};

/// Produces one member's snapshot.
///
/// `None` means the member could not be fully retrieved. Implementations
/// log their own failures.
#[async_trait]
pub trait MemberSource: Send + Sync {
    async fn fetch_member(&self, member: &str) -> Option<MemberSnapshot>;
}

/// Fetch every member through a bounded worker pool.
///
/// At most `options.workers` members are in flight at once. Results are
/// merged in completion order; a member whose fetch fails is left out of
/// the snapshot and never affects the others. Duplicate logins are fetched
/// once.
#[tracing::instrument(skip_all, fields(member_count = members.len(), workers = options.workers))]
pub async fn fetch_all<S: MemberSource + Clone + 'static>(
    source: &S,
    members: &[String],
    options: &FetchOptions,
    on_progress: Option<&ProgressCallback>,
) -> FetchOutcome {
    let mut seen = HashSet::new();
    let members: Vec<&String> = members.iter().filter(|m| seen.insert(*m)).collect();
    let total = members.len();
    let workers = options.workers.max(1);

    emit(
        on_progress,
        SyncProgress::FetchingSnapshots {
            members: total,
            workers,
        },
    );

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();
    let mut logins = HashMap::with_capacity(total);

    for member in members {
        let login = member.clone();
        let source = source.clone();
        let semaphore = Arc::clone(&semaphore);

        let handle = tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                tracing::error!(member = %login, "Worker pool closed unexpectedly");
                return (login, None);
            };
            let snapshot = source.fetch_member(&login).await;
            (login, snapshot)
        });
        logins.insert(handle.id(), member.clone());
    }

    let mut snapshot = Snapshot::new();
    let mut summary = FetchSummary {
        total,
        ..FetchSummary::default()
    };
    let mut completed = 0;

    while let Some(joined) = tasks.join_next_with_id().await {
        completed += 1;

        let (member, member_snapshot) = match joined {
            Ok((_, result)) => result,
            Err(e) => {
                // A task that panicked never returns its login.
                let member = logins.remove(&e.id()).unwrap_or_default();
                tracing::error!(member = %member, error = %e, "Member fetch task panicked");
                (member, None)
            }
        };

        match member_snapshot {
            Some(member_snapshot) => {
                summary.succeeded += 1;
                emit(
                    on_progress,
                    SyncProgress::MemberFetched {
                        member: member.clone(),
                        repositories: member_snapshot.repository_count(),
                        branches: member_snapshot.branch_count(),
                        completed,
                        total,
                    },
                );
                snapshot.insert(member, member_snapshot);
            }
            None => {
                summary.failed += 1;
                emit(
                    on_progress,
                    SyncProgress::MemberFailed {
                        member: member.clone(),
                        completed,
                        total,
                    },
                );
                summary.failed_members.push(member);
            }
        }
    }

    emit(
        on_progress,
        SyncProgress::FetchComplete {
            succeeded: summary.succeeded,
            failed: summary.failed,
        },
    );

    FetchOutcome { snapshot, summary }
}

/// Unique, sorted logins of every member of `organizations`.
///
/// An organization whose listing fails is logged and skipped.
#[tracing::instrument(skip_all, fields(organization_count = organizations.len()))]
pub async fn fetch_all_members(
    client: &GraphQlClient,
    organizations: &[String],
    on_progress: Option<&ProgressCallback>,
) -> Vec<String> {
    emit(
        on_progress,
        SyncProgress::ListingMembers {
            organizations: organizations.len(),
        },
    );

    let mut members = BTreeSet::new();
    for organization in organizations {
        match list_org_members(client, organization).await {
            Ok(logins) => {
                emit(
                    on_progress,
                    SyncProgress::OrganizationListed {
                        organization: organization.clone(),
                        members: logins.len(),
                    },
                );
                members.extend(logins);
            }
            Err(e) => {
                tracing::warn!(
                    organization = %organization,
                    kind = e.kind(),
                    error = %e,
                    "Failed to list organization members, skipping"
                );
                emit(
                    on_progress,
                    SyncProgress::OrganizationFailed {
                        organization: organization.clone(),
                        error: e.to_string(),
                    },
                );
            }
        }
    }

    let members: Vec<String> = members.into_iter().collect();
    emit(
        on_progress,
        SyncProgress::MembersDiscovered {
            total: members.len(),
        },
    );
    members
}

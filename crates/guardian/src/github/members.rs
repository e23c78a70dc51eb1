//! Organization member listing.

use super::client::GraphQlClient;
use super::error::GitHubError;
use super::pagination::{PaginatedQuery, Paginator};

/// Logins of every member of `org`, in API order.
#[tracing::instrument(skip(client), fields(task = ?tokio::task::try_id()))]
pub async fn list_org_members(
    client: &GraphQlClient,
    org: &str,
) -> Result<Vec<String>, GitHubError> {
    let members = Paginator::new(client, PaginatedQuery::org_members(org))
        .collect()
        .await?;
    tracing::debug!(count = members.len(), "Listed organization members");
    Ok(members.into_iter().map(|m| m.login).collect())
}

//! GraphQL documents.
//!
//! Every document selects `rateLimit` so each response refreshes the shared
//! budget. Cursor variables are nullable; `null` requests the first page.

/// Budget-only query used by `guardian limits`.
pub const RATE_LIMIT: &str = r#"
query {
  rateLimit { limit cost remaining resetAt }
}
"#;

/// Members of an organization, 100 per page.
pub const ORG_MEMBERS: &str = r#"
query($org: String!, $cursor: String) {
  organization(login: $org) {
    membersWithRole(first: 100, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes { login }
    }
  }
  rateLimit { limit cost remaining resetAt }
}
"#;

/// Public, non-archived repositories owned by a user, each with the first
/// 100 branches inline.
pub const USER_REPOSITORIES: &str = r#"
query($login: String!, $repoCursor: String) {
  user(login: $login) {
    repositories(
      first: 100
      after: $repoCursor
      isArchived: false
      privacy: PUBLIC
      ownerAffiliations: [OWNER]
    ) {
      nodes {
        name
        url
        refs(refPrefix: "refs/heads/", first: 100) {
          nodes {
            name
            target { ... on Commit { oid } }
          }
          pageInfo { hasNextPage endCursor }
        }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
  rateLimit { limit cost remaining resetAt }
}
"#;

/// Further branch pages of one repository.
pub const REPOSITORY_BRANCHES: &str = r#"
query($owner: String!, $repo: String!, $branchCursor: String) {
  repository(owner: $owner, name: $repo) {
    refs(refPrefix: "refs/heads/", first: 100, after: $branchCursor) {
      nodes {
        name
        target { ... on Commit { oid } }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
  rateLimit { limit cost remaining resetAt }
}
"#;

//! Typed shapes of the GraphQL responses this crate consumes.

use std::fmt;

use serde::Deserialize;

/// One entry of a response's top-level `errors` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    /// GitHub's error classification, e.g. `NOT_FOUND` or `RATE_LIMITED`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
}

impl fmt::Display for GraphQlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{kind}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Relay-style `pageInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// A page info marking the end of a sequence.
    #[must_use]
    pub fn last() -> Self {
        Self::default()
    }
}

/// A `{ nodes, pageInfo }` connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
    #[serde(default)]
    pub page_info: PageInfo,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            page_info: PageInfo::default(),
        }
    }
}

/// An organization member.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemberNode {
    pub login: String,
}

/// A repository together with the first page of its branches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryNode {
    pub name: String,
    pub url: String,
    /// `null` for repositories GitHub cannot list refs for.
    #[serde(default)]
    pub refs: Option<Connection<RefNode>>,
}

/// A branch ref.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefNode {
    pub name: String,
    #[serde(default)]
    pub target: Option<RefTarget>,
}

impl RefNode {
    /// Head commit of the branch, if the ref points at a commit.
    #[must_use]
    pub fn commit_oid(&self) -> Option<&str> {
        self.target.as_ref().and_then(|t| t.oid.as_deref())
    }
}

/// The `target { ... on Commit { oid } }` selection.
///
/// Non-commit targets come back as an empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RefTarget {
    #[serde(default)]
    pub oid: Option<String>,
}

// Response `data` envelopes, one per query document.

#[derive(Debug, Deserialize)]
pub(crate) struct OrgMembersData {
    pub organization: Option<OrgMembers>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrgMembers {
    pub members_with_role: Connection<MemberNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserRepositoriesData {
    pub user: Option<UserRepositories>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserRepositories {
    pub repositories: Connection<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryRefsData {
    pub repository: Option<RepositoryRefs>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryRefs {
    pub refs: Option<Connection<RefNode>>,
}

//! Cursor-following pagination over [`GraphQlClient`].
//!
//! A [`PaginatedQuery`] describes one query family: the document, its fixed
//! variables, the name of its cursor variable and how to pull a page out of
//! the response. A [`Paginator`] drives it page by page. Cursors never leave
//! their paginator, so a cursor is only ever sent back to the query family
//! that produced it.
//!
//! Nested pagination (repositories carrying an inline first page of
//! branches) is expressed by starting a second paginator with
//! [`Paginator::resume`] from the inline page's [`PageInfo`].

use serde_json::{Map, Value, json};

use super::client::GraphQlClient;
use super::error::GitHubError;
use super::queries;
use super::types::{
    Connection, MemberNode, OrgMembersData, PageInfo, RefNode, RepositoryNode, RepositoryRefsData,
    UserRepositoriesData,
};

/// Items of one page plus its continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> From<Connection<T>> for Page<T> {
    fn from(connection: Connection<T>) -> Self {
        Self {
            items: connection.nodes,
            page_info: connection.page_info,
        }
    }
}

type Extractor<T> = Box<dyn Fn(Value) -> Result<Page<T>, GitHubError> + Send + Sync>;

/// One paginated query family.
pub struct PaginatedQuery<T> {
    /// Entity description for logs and `NotFound` errors.
    pub label: String,
    pub document: &'static str,
    pub variables: Map<String, Value>,
    pub cursor_variable: &'static str,
    pub extract: Extractor<T>,
}

impl<T> PaginatedQuery<T> {
    fn variables_for(&self, cursor: Option<&str>) -> Value {
        let mut variables = self.variables.clone();
        variables.insert(self.cursor_variable.to_string(), json!(cursor));
        Value::Object(variables)
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl PaginatedQuery<MemberNode> {
    /// Members of `org`, 100 per page.
    pub fn org_members(org: &str) -> Self {
        let label = format!("organization {org}");
        let not_found = label.clone();
        Self {
            label,
            document: queries::ORG_MEMBERS,
            variables: object(json!({ "org": org })),
            cursor_variable: "cursor",
            extract: Box::new(move |data| {
                let data: OrgMembersData = serde_json::from_value(data)?;
                let org = data
                    .organization
                    .ok_or_else(|| GitHubError::NotFound(not_found.clone()))?;
                Ok(org.members_with_role.into())
            }),
        }
    }
}

impl PaginatedQuery<RepositoryNode> {
    /// Public repositories owned by `login`, each with its first branch page.
    pub fn member_repositories(login: &str) -> Self {
        let label = format!("user {login}");
        let not_found = label.clone();
        Self {
            label,
            document: queries::USER_REPOSITORIES,
            variables: object(json!({ "login": login })),
            cursor_variable: "repoCursor",
            extract: Box::new(move |data| {
                let data: UserRepositoriesData = serde_json::from_value(data)?;
                let user = data
                    .user
                    .ok_or_else(|| GitHubError::NotFound(not_found.clone()))?;
                Ok(user.repositories.into())
            }),
        }
    }
}

impl PaginatedQuery<RefNode> {
    /// Branches of `owner/repo`.
    pub fn repository_branches(owner: &str, repo: &str) -> Self {
        let label = format!("repository {owner}/{repo}");
        let not_found = label.clone();
        Self {
            label,
            document: queries::REPOSITORY_BRANCHES,
            variables: object(json!({ "owner": owner, "repo": repo })),
            cursor_variable: "branchCursor",
            extract: Box::new(move |data| {
                let data: RepositoryRefsData = serde_json::from_value(data)?;
                let repository = data
                    .repository
                    .ok_or_else(|| GitHubError::NotFound(not_found.clone()))?;
                Ok(repository.refs.unwrap_or_default().into())
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CursorState {
    Start,
    After(String),
    Done,
}

impl CursorState {
    fn from_page_info(page_info: &PageInfo) -> Result<Self, GitHubError> {
        match (page_info.has_next_page, &page_info.end_cursor) {
            (false, _) => Ok(Self::Done),
            (true, Some(cursor)) => Ok(Self::After(cursor.clone())),
            (true, None) => Err(GitHubError::MissingCursor),
        }
    }
}

/// Drives one [`PaginatedQuery`] to completion.
pub struct Paginator<'c, T> {
    client: &'c GraphQlClient,
    query: PaginatedQuery<T>,
    state: CursorState,
    pages: u32,
}

impl<'c, T> Paginator<'c, T> {
    /// Start from the first page.
    pub fn new(client: &'c GraphQlClient, query: PaginatedQuery<T>) -> Self {
        Self {
            client,
            query,
            state: CursorState::Start,
            pages: 0,
        }
    }

    /// Continue after a page that was fetched elsewhere, e.g. inline in a
    /// parent query.
    pub fn resume(
        client: &'c GraphQlClient,
        query: PaginatedQuery<T>,
        after: &PageInfo,
    ) -> Result<Self, GitHubError> {
        Ok(Self {
            client,
            query,
            state: CursorState::from_page_info(after)?,
            pages: 1,
        })
    }

    /// Whether the last page has been consumed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == CursorState::Done
    }

    /// Pages consumed so far, counting an inline page passed to `resume`.
    #[must_use]
    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Fetch the next page. `Ok(None)` once the sequence is exhausted.
    ///
    /// Any error ends the sequence; later calls return `Ok(None)`.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, GitHubError> {
        let cursor = match &self.state {
            CursorState::Done => return Ok(None),
            CursorState::Start => None,
            CursorState::After(cursor) => Some(cursor.as_str()),
        };
        let variables = self.query.variables_for(cursor);

        let page = match self
            .client
            .execute(self.query.document, variables)
            .await
            .into_data()
            .and_then(|data| (self.query.extract)(data))
        {
            Ok(page) => page,
            Err(e) => {
                self.state = CursorState::Done;
                return Err(e);
            }
        };

        self.pages += 1;
        self.state = match CursorState::from_page_info(&page.page_info) {
            Ok(state) => state,
            Err(e) => {
                self.state = CursorState::Done;
                return Err(e);
            }
        };

        tracing::trace!(
            entity = %self.query.label,
            page = self.pages,
            items = page.items.len(),
            has_next = !self.is_done(),
            "Fetched page"
        );

        Ok(Some(page.items))
    }

    /// Every remaining item, in encounter order.
    ///
    /// All or nothing: if any page fails, items from earlier pages are
    /// dropped and the error is returned.
    pub async fn collect(mut self) -> Result<Vec<T>, GitHubError> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::test_support::{ENDPOINT, mock_client, ok_body};
    use crate::http::{HttpError, HttpMethod};

    fn members_page(logins: &[&str], next: Option<&str>) -> Value {
        let nodes: Vec<Value> = logins.iter().map(|l| json!({ "login": l })).collect();
        ok_body(json!({
            "organization": {
                "membersWithRole": {
                    "nodes": nodes,
                    "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next }
                }
            }
        }))
    }

    #[tokio::test]
    async fn collect_follows_cursors_until_last_page() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(ENDPOINT, members_page(&["a", "b"], Some("c1")));
        transport.push_json(ENDPOINT, members_page(&["c", "d"], Some("c2")));
        transport.push_json(ENDPOINT, members_page(&["e"], None));

        let mut paginator = Paginator::new(&client, PaginatedQuery::org_members("acme"));
        let mut sizes = Vec::new();
        let mut all = Vec::new();
        while let Some(page) = paginator.next_page().await.expect("page") {
            sizes.push(page.len());
            all.extend(page);
        }

        assert!(paginator.is_done());
        assert_eq!(paginator.pages(), 3);
        assert_eq!(all.len(), sizes.iter().sum::<usize>());
        let logins: Vec<_> = all.iter().map(|m| m.login.as_str()).collect();
        assert_eq!(logins, ["a", "b", "c", "d", "e"]);

        let cursors: Vec<_> = transport
            .request_bodies()
            .iter()
            .map(|b| b["variables"]["cursor"].clone())
            .collect();
        assert_eq!(cursors, vec![Value::Null, json!("c1"), json!("c2")]);
        assert!(
            transport
                .request_bodies()
                .iter()
                .all(|b| b["variables"]["org"] == "acme")
        );
    }

    #[tokio::test]
    async fn failure_mid_sequence_discards_earlier_pages() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(ENDPOINT, members_page(&["a", "b"], Some("c1")));
        transport.push_json(
            ENDPOINT,
            json!({ "errors": [{ "message": "Something went wrong" }] }),
        );

        let err = Paginator::new(&client, PaginatedQuery::org_members("acme"))
            .collect()
            .await
            .expect_err("second page fails");
        assert!(matches!(err, GitHubError::Query(_)));
    }

    #[tokio::test]
    async fn transport_failure_ends_the_sequence() {
        let (client, transport, _clock) = mock_client();
        for _ in 0..4 {
            transport.push_error(HttpMethod::Post, ENDPOINT, HttpError::Timeout("read".into()));
        }

        let mut paginator = Paginator::new(&client, PaginatedQuery::org_members("acme"));
        let err = paginator.next_page().await.expect_err("fails");
        assert_eq!(err.kind(), "transport_failure");
        assert!(paginator.is_done());
        assert!(paginator.next_page().await.expect("fused").is_none());
    }

    #[tokio::test]
    async fn has_next_without_cursor_is_an_error() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(
            ENDPOINT,
            ok_body(json!({
                "organization": {
                    "membersWithRole": {
                        "nodes": [{ "login": "a" }],
                        "pageInfo": { "hasNextPage": true, "endCursor": null }
                    }
                }
            })),
        );

        let err = Paginator::new(&client, PaginatedQuery::org_members("acme"))
            .collect()
            .await
            .expect_err("missing cursor");
        assert!(matches!(err, GitHubError::MissingCursor));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn null_organization_is_not_found() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(ENDPOINT, ok_body(json!({ "organization": null })));

        let err = Paginator::new(&client, PaginatedQuery::org_members("ghost-org"))
            .collect()
            .await
            .expect_err("not found");
        assert_eq!(err.to_string(), "organization ghost-org not found");
    }

    #[tokio::test]
    async fn resume_continues_from_inline_cursor_with_its_own_variables() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(
            ENDPOINT,
            ok_body(json!({
                "repository": {
                    "refs": {
                        "nodes": [{ "name": "feature", "target": { "oid": "f".repeat(40) } }],
                        "pageInfo": { "hasNextPage": false, "endCursor": "b2" }
                    }
                }
            })),
        );

        let inline = PageInfo {
            has_next_page: true,
            end_cursor: Some("b1".to_string()),
        };
        let paginator = Paginator::resume(
            &client,
            PaginatedQuery::repository_branches("alice", "tools"),
            &inline,
        )
        .expect("cursor present");
        assert_eq!(paginator.pages(), 1);

        let refs = paginator.collect().await.expect("branches");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "feature");

        let body = &transport.request_bodies()[0];
        assert_eq!(body["variables"]["owner"], "alice");
        assert_eq!(body["variables"]["repo"], "tools");
        assert_eq!(body["variables"]["branchCursor"], "b1");
    }

    #[tokio::test]
    async fn resume_after_last_page_sends_nothing() {
        let (client, transport, _clock) = mock_client();
        let paginator = Paginator::resume(
            &client,
            PaginatedQuery::repository_branches("alice", "tools"),
            &PageInfo::last(),
        )
        .expect("done");
        assert!(paginator.is_done());
        assert!(paginator.collect().await.expect("empty").is_empty());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn resume_rejects_has_next_without_cursor() {
        let (client, _transport, _clock) = mock_client();
        let result = Paginator::resume(
            &client,
            PaginatedQuery::repository_branches("alice", "tools"),
            &PageInfo {
                has_next_page: true,
                end_cursor: None,
            },
        );
        assert!(matches!(result, Err(GitHubError::MissingCursor)));
    }
}

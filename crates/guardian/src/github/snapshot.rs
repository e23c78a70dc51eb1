//! Per-member snapshot acquisition.

use async_trait::async_trait;

use super::client::GraphQlClient;
use super::error::GitHubError;
use super::pagination::{PaginatedQuery, Paginator};
use super::types::{PageInfo, RefNode};
use crate::snapshot::{BranchHeads, CommitHash, MemberSnapshot};
use crate::sync::MemberSource;

/// Fetches one member's repositories and branch heads.
///
/// The repository query carries each repository's first branch page inline;
/// only repositories with more branches than fit on that page cost extra
/// requests. Every repository page is collected before any branch
/// pagination resumes, so a failed repository page costs no branch
/// requests.
#[derive(Clone)]
pub struct SnapshotFetcher {
    client: GraphQlClient,
}

impl SnapshotFetcher {
    pub fn new(client: GraphQlClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &GraphQlClient {
        &self.client
    }

    /// Everything `member` owns, or `None` if any page failed.
    ///
    /// Never returns a partially populated member.
    #[tracing::instrument(skip(self), fields(task = ?tokio::task::try_id()))]
    pub async fn fetch_member(&self, member: &str) -> Option<MemberSnapshot> {
        match self.try_fetch_member(member).await {
            Ok(snapshot) => {
                tracing::debug!(
                    repositories = snapshot.repository_count(),
                    branches = snapshot.branch_count(),
                    "Fetched member snapshot"
                );
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!(
                    kind = e.kind(),
                    error = %e,
                    "Member fetch failed, omitting member from snapshot"
                );
                None
            }
        }
    }

    async fn try_fetch_member(&self, member: &str) -> Result<MemberSnapshot, GitHubError> {
        let repositories = Paginator::new(&self.client, PaginatedQuery::member_repositories(member))
            .collect()
            .await?;

        let mut snapshot = MemberSnapshot::new();
        for repository in repositories {
            let (inline, page_info) = match repository.refs {
                Some(refs) => (refs.nodes, refs.page_info),
                None => (Vec::new(), PageInfo::last()),
            };

            let mut heads = BranchHeads::new();
            merge_refs(&mut heads, &repository.name, inline);

            if page_info.has_next_page {
                tracing::debug!(
                    repository = %repository.name,
                    inline_branches = heads.len(),
                    "Resuming branch pagination"
                );
                let rest = Paginator::resume(
                    &self.client,
                    PaginatedQuery::repository_branches(member, &repository.name),
                    &page_info,
                )?
                .collect()
                .await?;
                merge_refs(&mut heads, &repository.name, rest);
            }

            snapshot.insert_repository(repository.name, heads);
        }
        Ok(snapshot)
    }
}

fn merge_refs(heads: &mut BranchHeads, repository: &str, refs: Vec<RefNode>) {
    for node in refs {
        match node.commit_oid() {
            Some(oid) => {
                let oid = CommitHash::new(oid);
                if !oid.is_full_sha() {
                    tracing::debug!(
                        repository,
                        branch = %node.name,
                        oid = %oid,
                        "Branch head is not a full SHA, keeping it verbatim"
                    );
                }
                heads.insert(node.name, oid);
            }
            None => tracing::debug!(
                repository,
                branch = %node.name,
                "Skipping branch whose head is not a commit"
            ),
        }
    }
}

#[async_trait]
impl MemberSource for SnapshotFetcher {
    async fn fetch_member(&self, member: &str) -> Option<MemberSnapshot> {
        SnapshotFetcher::fetch_member(self, member).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::github::RefTarget;
    use crate::github::client::test_support::{ENDPOINT, mock_client, ok_body};
    use crate::http::{HttpMethod, HttpResponse};

    fn sha(c: char) -> String {
        c.to_string().repeat(40)
    }

    fn branch(name: &str, oid: &str) -> Value {
        json!({ "name": name, "target": { "oid": oid } })
    }

    fn refs(nodes: Vec<Value>, next: Option<&str>) -> Value {
        json!({
            "nodes": nodes,
            "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next }
        })
    }

    fn repo(name: &str, refs: Value) -> Value {
        json!({ "name": name, "url": format!("https://github.com/alice/{name}"), "refs": refs })
    }

    fn repos_page(nodes: Vec<Value>, next: Option<&str>) -> Value {
        ok_body(json!({
            "user": {
                "repositories": {
                    "nodes": nodes,
                    "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next }
                }
            }
        }))
    }

    fn branches_page(nodes: Vec<Value>, next: Option<&str>) -> Value {
        ok_body(json!({ "repository": { "refs": refs(nodes, next) } }))
    }

    #[tokio::test]
    async fn fetches_repositories_across_pages_with_inline_branches() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(
            ENDPOINT,
            repos_page(
                vec![repo("r1", refs(vec![branch("main", &sha('a'))], None))],
                Some("repo-c1"),
            ),
        );
        transport.push_json(
            ENDPOINT,
            repos_page(
                vec![repo(
                    "r2",
                    refs(
                        vec![branch("main", &sha('b')), branch("dev", &sha('c'))],
                        None,
                    ),
                )],
                None,
            ),
        );

        let fetcher = SnapshotFetcher::new(client);
        let snapshot = fetcher.fetch_member("alice").await.expect("member present");

        assert_eq!(snapshot.repository_count(), 2);
        assert_eq!(snapshot.branch_count(), 3);
        assert_eq!(
            snapshot.repository("r2").expect("r2")["dev"],
            CommitHash::new(sha('c'))
        );

        let bodies = transport.request_bodies();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[1]["variables"]["repoCursor"], "repo-c1");
    }

    #[tokio::test]
    async fn resumes_branch_pagination_for_large_repositories() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(
            ENDPOINT,
            repos_page(
                vec![
                    repo("big", refs(vec![branch("b1", &sha('1'))], Some("br-c1"))),
                    repo("small", refs(vec![branch("main", &sha('2'))], None)),
                ],
                None,
            ),
        );
        transport.push_json(
            ENDPOINT,
            branches_page(vec![branch("b2", &sha('3'))], Some("br-c2")),
        );
        transport.push_json(ENDPOINT, branches_page(vec![branch("b3", &sha('4'))], None));

        let snapshot = SnapshotFetcher::new(client)
            .fetch_member("alice")
            .await
            .expect("member present");

        let big = snapshot.repository("big").expect("big");
        assert_eq!(
            big.keys().map(String::as_str).collect::<Vec<_>>(),
            ["b1", "b2", "b3"]
        );
        assert_eq!(snapshot.repository("small").expect("small").len(), 1);

        let bodies = transport.request_bodies();
        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies[1]["variables"]["owner"], "alice");
        assert_eq!(bodies[1]["variables"]["repo"], "big");
        assert_eq!(bodies[1]["variables"]["branchCursor"], "br-c1");
        assert_eq!(bodies[2]["variables"]["branchCursor"], "br-c2");
    }

    #[tokio::test]
    async fn failed_branch_page_drops_the_whole_member() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(
            ENDPOINT,
            repos_page(
                vec![
                    repo("fine", refs(vec![branch("main", &sha('a'))], None)),
                    repo("big", refs(vec![branch("b1", &sha('b'))], Some("br-c1"))),
                ],
                None,
            ),
        );
        transport.push_response(
            HttpMethod::Post,
            ENDPOINT,
            HttpResponse {
                status: 502,
                headers: Vec::new(),
                body: b"bad gateway".to_vec(),
            },
        );

        assert!(SnapshotFetcher::new(client).fetch_member("alice").await.is_none());
    }

    #[tokio::test]
    async fn failed_repository_page_drops_the_whole_member() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(
            ENDPOINT,
            repos_page(
                vec![repo("r1", refs(vec![branch("main", &sha('a'))], None))],
                Some("repo-c1"),
            ),
        );
        transport.push_json(
            ENDPOINT,
            json!({ "errors": [{ "type": "INTERNAL", "message": "timeout" }] }),
        );

        assert!(SnapshotFetcher::new(client).fetch_member("alice").await.is_none());
    }

    #[tokio::test]
    async fn repository_gone_during_resume_drops_the_member() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(
            ENDPOINT,
            repos_page(
                vec![repo("big", refs(vec![branch("b1", &sha('b'))], Some("br-c1")))],
                None,
            ),
        );
        transport.push_json(ENDPOINT, ok_body(json!({ "repository": null })));

        assert!(SnapshotFetcher::new(client).fetch_member("alice").await.is_none());
    }

    #[tokio::test]
    async fn unknown_user_is_absent() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(ENDPOINT, ok_body(json!({ "user": null })));
        assert!(SnapshotFetcher::new(client).fetch_member("ghost").await.is_none());
    }

    #[tokio::test]
    async fn non_commit_refs_and_empty_repositories() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(
            ENDPOINT,
            repos_page(
                vec![
                    repo(
                        "mixed",
                        refs(
                            vec![
                                branch("main", &sha('a')),
                                json!({ "name": "odd", "target": {} }),
                            ],
                            None,
                        ),
                    ),
                    repo("empty", refs(vec![], None)),
                    json!({ "name": "norefs", "url": "https://github.com/alice/norefs", "refs": null }),
                ],
                None,
            ),
        );

        let snapshot = SnapshotFetcher::new(client)
            .fetch_member("alice")
            .await
            .expect("member present");
        assert_eq!(snapshot.repository_count(), 3);
        assert_eq!(snapshot.branch_count(), 1);
        assert!(snapshot.repository("empty").expect("empty").is_empty());
    }

    #[tokio::test]
    async fn member_with_no_repositories_is_present_and_empty() {
        let (client, transport, _clock) = mock_client();
        transport.push_json(ENDPOINT, repos_page(vec![], None));
        let snapshot = SnapshotFetcher::new(client)
            .fetch_member("newbie")
            .await
            .expect("member present");
        assert_eq!(snapshot, MemberSnapshot::new());
    }

    #[test]
    fn abbreviated_oids_are_kept_verbatim() {
        let mut heads = BranchHeads::new();
        merge_refs(
            &mut heads,
            "legacy",
            vec![
                RefNode {
                    name: "main".to_string(),
                    target: Some(RefTarget {
                        oid: Some("abc1234".to_string()),
                    }),
                },
                RefNode {
                    name: "dev".to_string(),
                    target: Some(RefTarget {
                        oid: Some(sha('d')),
                    }),
                },
            ],
        );

        assert_eq!(heads.len(), 2);
        assert_eq!(heads["main"].as_str(), "abc1234");
        assert!(!heads["main"].is_full_sha());
        assert!(heads["dev"].is_full_sha());
    }
}

//! Snapshot comparison.

use crate::snapshot::{ChangeSet, CommitUpdate, Snapshot};

/// Classify every branch of `current` against `previous`.
///
/// A branch missing from `previous` is a new repository when its
/// (member, repository) pair was not in `previous` either, otherwise a new
/// branch. A branch present in both with a different head is an updated
/// commit. Branches only in `previous` are ignored.
///
/// An empty `current` yields an empty change set without looking at
/// `previous`, so a run that acquired nothing never reports everything as
/// new.
#[must_use]
pub fn diff(current: &Snapshot, previous: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();
    if current.is_empty() {
        tracing::warn!("Current snapshot is empty, skipping comparison");
        return changes;
    }

    let previous_flat = previous.flatten();
    // A repository seen with no branches still counts as seen.
    let previous_repositories = previous.repository_keys();

    for (key, current_hash) in current.flatten() {
        match previous_flat.get(&key) {
            None => {
                let repository = (key.member().to_string(), key.repository().to_string());
                if previous_repositories.contains(&repository) {
                    tracing::info!(
                        member = key.member(),
                        repository = key.repository(),
                        branch = key.branch(),
                        "New branch"
                    );
                    changes.new_branches.insert(key, current_hash);
                } else {
                    tracing::info!(
                        member = key.member(),
                        repository = key.repository(),
                        branch = key.branch(),
                        "New repository"
                    );
                    changes.new_repositories.insert(key, current_hash);
                }
            }
            Some(previous_hash) if *previous_hash != current_hash => {
                changes.updated_commits.insert(
                    key,
                    CommitUpdate {
                        previous: previous_hash.clone(),
                        current: current_hash,
                    },
                );
            }
            Some(_) => {}
        }
    }

    tracing::info!(
        updated_commits = changes.updated_commits.len(),
        new_repositories = changes.new_repositories.len(),
        new_branches = changes.new_branches.len(),
        "Snapshot comparison complete"
    );
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{CommitHash, FlatKey, MemberSnapshot};

    fn snapshot(entries: &[(&str, &str, &str, &str)]) -> Snapshot {
        let mut members: std::collections::BTreeMap<String, Vec<(String, Vec<(String, String)>)>> =
            Default::default();
        for (member, repo, branch, hash) in entries {
            let repos = members.entry(member.to_string()).or_default();
            match repos.iter_mut().find(|(r, _)| r.as_str() == *repo) {
                Some((_, branches)) => branches.push((branch.to_string(), hash.to_string())),
                None => repos.push((
                    repo.to_string(),
                    vec![(branch.to_string(), hash.to_string())],
                )),
            }
        }
        members
            .into_iter()
            .map(|(member, repos)| (member, MemberSnapshot::from_iter(repos)))
            .collect()
    }

    fn key(s: &str) -> FlatKey {
        s.parse().expect("valid key")
    }

    #[test]
    fn updated_commit_and_new_repository() {
        let previous = snapshot(&[("alice", "r1", "main", "aaa")]);
        let current = snapshot(&[
            ("alice", "r1", "main", "bbb"),
            ("alice", "r2", "main", "ccc"),
        ]);

        let changes = diff(&current, &previous);
        assert_eq!(changes.updated_commits.len(), 1);
        assert_eq!(
            changes.updated_commits[&key("alice::r1::main")],
            CommitUpdate {
                previous: "aaa".into(),
                current: "bbb".into()
            }
        );
        assert_eq!(changes.new_repositories.len(), 1);
        assert_eq!(
            changes.new_repositories[&key("alice::r2::main")],
            CommitHash::from("ccc")
        );
        assert!(changes.new_branches.is_empty());
    }

    #[test]
    fn new_branch_in_existing_repository() {
        let previous = snapshot(&[("alice", "r1", "main", "aaa")]);
        let current = snapshot(&[("alice", "r1", "main", "aaa"), ("alice", "r1", "dev", "ddd")]);

        let changes = diff(&current, &previous);
        assert!(changes.updated_commits.is_empty());
        assert!(changes.new_repositories.is_empty());
        assert_eq!(
            changes.new_branches.into_iter().collect::<Vec<_>>(),
            vec![(key("alice::r1::dev"), CommitHash::from("ddd"))]
        );
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let s = snapshot(&[
            ("alice", "r1", "main", "aaa"),
            ("alice", "r1", "dev", "ddd"),
            ("bob", "tools", "main", "eee"),
        ]);
        assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn empty_current_short_circuits() {
        let previous = snapshot(&[("alice", "r1", "main", "aaa")]);
        assert!(diff(&Snapshot::new(), &previous).is_empty());
        assert!(diff(&Snapshot::new(), &Snapshot::new()).is_empty());
    }

    #[test]
    fn deletions_are_not_reported() {
        let previous = snapshot(&[
            ("alice", "r1", "main", "aaa"),
            ("alice", "gone", "main", "bbb"),
        ]);
        let current = snapshot(&[("alice", "r1", "main", "aaa")]);
        assert!(diff(&current, &previous).is_empty());
    }

    #[test]
    fn empty_previous_reports_every_branch_as_new_repository() {
        let current = snapshot(&[("alice", "r1", "main", "aaa"), ("alice", "r1", "dev", "bbb")]);
        let changes = diff(&current, &Snapshot::new());
        assert_eq!(changes.new_repositories.len(), 2);
        assert!(changes.new_branches.is_empty());
    }

    #[test]
    fn previously_empty_repository_gets_new_branch_not_new_repository() {
        let mut alice = MemberSnapshot::new();
        alice.insert_repository("r1", Default::default());
        let previous: Snapshot = [("alice".to_string(), alice)].into_iter().collect();
        let current = snapshot(&[("alice", "r1", "main", "aaa")]);

        let changes = diff(&current, &previous);
        assert!(changes.new_repositories.is_empty());
        assert_eq!(changes.new_branches.len(), 1);
    }

    #[test]
    fn same_repository_name_under_another_member_is_new() {
        let previous = snapshot(&[("alice", "r1", "main", "aaa")]);
        let current = snapshot(&[("alice", "r1", "main", "aaa"), ("bob", "r1", "main", "aaa")]);
        let changes = diff(&current, &previous);
        assert_eq!(
            changes.new_repositories.keys().collect::<Vec<_>>(),
            vec![&key("bob::r1::main")]
        );
    }
}

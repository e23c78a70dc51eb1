//! Point-in-time snapshot of member → repository → branch → head commit,
//! and the change set produced by diffing two of them.
//!
//! Maps are `BTreeMap`s so serialized snapshots and change sets are stable
//! and diffable on disk.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Separator between the components of a [`FlatKey`]'s string form.
pub const FLAT_KEY_DELIMITER: &str = "::";

/// Head commit of a branch. Opaque; normally 40 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitHash(String);

impl CommitHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this looks like a full SHA-1 object id.
    #[must_use]
    pub fn is_full_sha(&self) -> bool {
        self.0.len() == 40 && self.0.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitHash {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

impl From<String> for CommitHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

/// Branch name → head commit for one repository.
pub type BranchHeads = BTreeMap<String, CommitHash>;

/// Every public repository of one member, fully retrieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberSnapshot {
    repositories: BTreeMap<String, BranchHeads>,
}

impl MemberSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a repository. A repository with no branches is still recorded.
    pub fn insert_repository(&mut self, name: impl Into<String>, branches: BranchHeads) {
        self.repositories.insert(name.into(), branches);
    }

    #[must_use]
    pub fn repository(&self, name: &str) -> Option<&BranchHeads> {
        self.repositories.get(name)
    }

    pub fn repositories(&self) -> impl Iterator<Item = (&String, &BranchHeads)> {
        self.repositories.iter()
    }

    #[must_use]
    pub fn repository_count(&self) -> usize {
        self.repositories.len()
    }

    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.repositories.values().map(BTreeMap::len).sum()
    }
}

impl<R, B, H> FromIterator<(R, B)> for MemberSnapshot
where
    R: Into<String>,
    B: IntoIterator<Item = (String, H)>,
    H: Into<CommitHash>,
{
    fn from_iter<I: IntoIterator<Item = (R, B)>>(iter: I) -> Self {
        Self {
            repositories: iter
                .into_iter()
                .map(|(repo, branches)| {
                    (
                        repo.into(),
                        branches
                            .into_iter()
                            .map(|(branch, hash)| (branch, hash.into()))
                            .collect(),
                    )
                })
                .collect(),
        }
    }
}

/// member → repository → branch → head commit.
///
/// A member is either present with everything that was retrieved for it, or
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    members: BTreeMap<String, MemberSnapshot>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, member: impl Into<String>, snapshot: MemberSnapshot) {
        self.members.insert(member.into(), snapshot);
    }

    #[must_use]
    pub fn member(&self, login: &str) -> Option<&MemberSnapshot> {
        self.members.get(login)
    }

    pub fn members(&self) -> impl Iterator<Item = (&String, &MemberSnapshot)> {
        self.members.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn repository_count(&self) -> usize {
        self.members.values().map(MemberSnapshot::repository_count).sum()
    }

    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.members.values().map(MemberSnapshot::branch_count).sum()
    }

    /// Every (member, repository, branch) with its head commit.
    ///
    /// Triples that cannot form a valid [`FlatKey`] are logged and left out.
    #[must_use]
    pub fn flatten(&self) -> BTreeMap<FlatKey, CommitHash> {
        let mut flat = BTreeMap::new();
        for (member, repos) in &self.members {
            for (repo, branches) in &repos.repositories {
                for (branch, hash) in branches {
                    match FlatKey::new(member.as_str(), repo.as_str(), branch.as_str()) {
                        Ok(key) => {
                            flat.insert(key, hash.clone());
                        }
                        Err(e) => tracing::warn!(
                            member = %member,
                            repository = %repo,
                            branch = %branch,
                            error = %e,
                            "Skipping branch that cannot be keyed"
                        ),
                    }
                }
            }
        }
        flat
    }

    /// Every (member, repository) pair, including repositories without
    /// branches.
    #[must_use]
    pub fn repository_keys(&self) -> BTreeSet<(String, String)> {
        self.members
            .iter()
            .flat_map(|(member, repos)| {
                repos
                    .repositories
                    .keys()
                    .map(move |repo| (member.clone(), repo.clone()))
            })
            .collect()
    }
}

impl FromIterator<(String, MemberSnapshot)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, MemberSnapshot)>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlatKeyError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{component} {value:?} contains the key delimiter \"::\"")]
    ContainsDelimiter {
        component: &'static str,
        value: String,
    },

    #[error("expected member::repository::branch, got {0:?}")]
    Malformed(String),
}

/// Identifies one branch of one repository of one member.
///
/// Structured internally; the string form `member::repository::branch` is
/// only produced by `Display` and read back by `FromStr`. Construction
/// rejects components containing `::`, so the string form always splits
/// back into the same three components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlatKey {
    member: String,
    repository: String,
    branch: String,
}

impl FlatKey {
    pub fn new(
        member: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
    ) -> Result<Self, FlatKeyError> {
        let key = Self {
            member: member.into(),
            repository: repository.into(),
            branch: branch.into(),
        };
        for (component, value) in [
            ("member", &key.member),
            ("repository", &key.repository),
            ("branch", &key.branch),
        ] {
            if value.is_empty() {
                return Err(FlatKeyError::Empty(component));
            }
            if value.contains(FLAT_KEY_DELIMITER) {
                return Err(FlatKeyError::ContainsDelimiter {
                    component,
                    value: value.clone(),
                });
            }
        }
        Ok(key)
    }

    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// `https://github.com/<member>/<repository>`.
    #[must_use]
    pub fn repository_url(&self) -> String {
        format!("https://github.com/{}/{}", self.member, self.repository)
    }
}

impl fmt::Display for FlatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{FLAT_KEY_DELIMITER}{}{FLAT_KEY_DELIMITER}{}",
            self.member, self.repository, self.branch
        )
    }
}

impl FromStr for FlatKey {
    type Err = FlatKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, FLAT_KEY_DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(member), Some(repository), Some(branch)) => {
                Self::new(member, repository, branch)
            }
            _ => Err(FlatKeyError::Malformed(s.to_string())),
        }
    }
}

impl Serialize for FlatKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FlatKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Old and new head of a branch whose commit changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitUpdate {
    #[serde(rename = "previous_commit_hash")]
    pub previous: CommitHash,
    #[serde(rename = "current_commit_hash")]
    pub current: CommitHash,
}

/// Classified differences between two snapshots.
///
/// Deletions are not represented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub updated_commits: BTreeMap<FlatKey, CommitUpdate>,
    /// Branches of repositories absent from the previous snapshot.
    pub new_repositories: BTreeMap<FlatKey, CommitHash>,
    /// New branches of repositories that already existed.
    pub new_branches: BTreeMap<FlatKey, CommitHash>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated_commits.is_empty()
            && self.new_repositories.is_empty()
            && self.new_branches.is_empty()
    }

    /// Total number of classified keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.updated_commits.len() + self.new_repositories.len() + self.new_branches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> FlatKey {
        s.parse().expect("valid key")
    }

    #[test]
    fn flat_key_display_and_parse_agree() {
        let k = FlatKey::new("alice", "dotfiles", "feature/x").expect("valid");
        assert_eq!(k.to_string(), "alice::dotfiles::feature/x");
        assert_eq!(key("alice::dotfiles::feature/x"), k);
        assert_eq!(k.repository_url(), "https://github.com/alice/dotfiles");
    }

    #[test]
    fn flat_key_rejects_delimiter_in_components() {
        let err = FlatKey::new("alice", "a::b", "main").expect_err("delimiter");
        assert_eq!(
            err,
            FlatKeyError::ContainsDelimiter {
                component: "repository",
                value: "a::b".to_string()
            }
        );

        // The third component keeps any trailing delimiters and is rejected.
        assert!(matches!(
            "alice::repo::main::extra".parse::<FlatKey>(),
            Err(FlatKeyError::ContainsDelimiter {
                component: "branch",
                ..
            })
        ));
    }

    #[test]
    fn flat_key_rejects_missing_or_empty_components() {
        assert!(matches!(
            "alice::repo".parse::<FlatKey>(),
            Err(FlatKeyError::Malformed(_))
        ));
        assert_eq!(
            "::repo::main".parse::<FlatKey>(),
            Err(FlatKeyError::Empty("member"))
        );
        assert_eq!(
            FlatKey::new("alice", "", "main"),
            Err(FlatKeyError::Empty("repository"))
        );
    }

    #[test]
    fn flat_key_single_colons_are_allowed() {
        let k = FlatKey::new("alice", "repo", "fix:typo").expect("single colon");
        assert_eq!(key(&k.to_string()), k);
    }

    #[test]
    fn snapshot_serializes_as_nested_maps() {
        let mut member = MemberSnapshot::new();
        member.insert_repository(
            "r1",
            BranchHeads::from([("main".to_string(), CommitHash::from("aaa"))]),
        );
        let mut snapshot = Snapshot::new();
        snapshot.insert("alice", member);

        let value = serde_json::to_value(&snapshot).expect("serializes");
        assert_eq!(value, serde_json::json!({"alice": {"r1": {"main": "aaa"}}}));

        let back: Snapshot = serde_json::from_value(value).expect("deserializes");
        assert_eq!(back, snapshot);
    }

    #[test]
    fn snapshot_counts_and_keys() {
        let snapshot: Snapshot = [
            (
                "alice".to_string(),
                MemberSnapshot::from_iter([
                    ("r1", vec![("main".to_string(), "aaa"), ("dev".to_string(), "bbb")]),
                    ("empty", vec![]),
                ]),
            ),
            (
                "bob".to_string(),
                MemberSnapshot::from_iter([("r1", vec![("main".to_string(), "ccc")])]),
            ),
        ]
        .into_iter()
        .collect();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.repository_count(), 3);
        assert_eq!(snapshot.branch_count(), 3);

        let flat = snapshot.flatten();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[&key("alice::r1::dev")], CommitHash::from("bbb"));

        let repos = snapshot.repository_keys();
        assert!(repos.contains(&("alice".to_string(), "empty".to_string())));
        assert_eq!(repos.len(), 3);
    }

    #[test]
    fn change_set_serializes_with_flat_string_keys() {
        let mut changes = ChangeSet::default();
        changes.updated_commits.insert(
            key("alice::r1::main"),
            CommitUpdate {
                previous: "aaa".into(),
                current: "bbb".into(),
            },
        );

        let value = serde_json::to_value(&changes.updated_commits).expect("serializes");
        assert_eq!(
            value,
            serde_json::json!({
                "alice::r1::main": {
                    "previous_commit_hash": "aaa",
                    "current_commit_hash": "bbb"
                }
            })
        );
        assert_eq!(changes.len(), 1);
        assert!(!changes.is_empty());
    }

    #[test]
    fn commit_hash_full_sha_check() {
        assert!(CommitHash::from("a".repeat(40)).is_full_sha());
        assert!(!CommitHash::from("abc").is_full_sha());
        assert!(!CommitHash::from("g".repeat(40)).is_full_sha());
    }
}

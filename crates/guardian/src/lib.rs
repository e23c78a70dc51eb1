//! Guardian - periodic snapshots of organization members' public repositories.
//!
//! This library fetches every public repository and branch head owned by the
//! members of a set of GitHub organizations, diffs the result against the
//! previous run and derives what a secret scanner should look at.
//!
//! # Example
//!
//! ```ignore
//! use guardian::github::{ClientOptions, GraphQlClient, SnapshotFetcher};
//! use guardian::store::ScanStore;
//! use guardian::sync::{FetchOptions, fetch_all, fetch_all_members};
//!
//! let client = GraphQlClient::new(ClientOptions::new(token))?;
//! let members = fetch_all_members(&client, &orgs, None).await;
//! let outcome = fetch_all(&SnapshotFetcher::new(client), &members, &FetchOptions::default(), None).await;
//!
//! let store = ScanStore::new("scan_results");
//! let previous = store.load_latest_snapshot()?.unwrap_or_default();
//! let changes = guardian::diff(&outcome.snapshot, &previous);
//! let targets = guardian::scan::scan_targets(&changes);
//! ```

pub mod clock;
pub mod diff;
pub mod github;
pub mod http;
pub mod retry;
pub mod scan;
pub mod snapshot;
pub mod store;
pub mod sync;

pub use diff::diff;
pub use snapshot::{
    BranchHeads, ChangeSet, CommitHash, CommitUpdate, FlatKey, FlatKeyError, MemberSnapshot,
    Snapshot,
};

//! Snapshot acquisition across many members.
//!
//! # Module Structure
//!
//! - [`types`] - `FetchOptions`, `FetchOutcome`, `FetchSummary`, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`engine`] - `MemberSource`, `fetch_all()`, `fetch_all_members()`
//!
//! # Example
//!
//! ```ignore
//! use guardian::github::{ClientOptions, GraphQlClient, SnapshotFetcher};
//! use guardian::sync::{FetchOptions, fetch_all, fetch_all_members};
//!
//! let client = GraphQlClient::new(ClientOptions::new(token))?;
//! let members = fetch_all_members(&client, &orgs, None).await;
//! let fetcher = SnapshotFetcher::new(client);
//! let outcome = fetch_all(&fetcher, &members, &FetchOptions::default(), None).await;
//! println!("{} members fetched", outcome.summary.succeeded);
//! ```

pub mod engine;
mod progress;
mod types;

pub use types::{DEFAULT_WORKERS, FetchOptions, FetchOutcome, FetchSummary};

pub use progress::{ProgressCallback, SyncProgress, emit};

pub use engine::{MemberSource, fetch_all, fetch_all_members};

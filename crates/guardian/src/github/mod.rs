//! GitHub GraphQL acquisition.
//!
//! # Module Structure
//!
//! - [`rate_limit`] - Shared request budget: `RateLimiter`, `RateLimitPolicy`
//! - `client` - `GraphQlClient::execute` and its `QueryResult`
//! - `pagination` - Cursor-following `Paginator` over `PaginatedQuery` families
//! - `members` - Organization member listing
//! - `snapshot` - `SnapshotFetcher`, one member's repositories and branches
//! - [`queries`] - GraphQL documents
//! - `types` / `error` - Response shapes and `GitHubError`

pub(crate) mod client;
mod error;
mod members;
mod pagination;
pub mod queries;
pub mod rate_limit;
mod snapshot;
mod types;

pub use error::GitHubError;

pub use client::{
    ClientOptions, DEFAULT_GRAPHQL_URL, GraphQlClient, QueryFailure, QueryResult,
};

pub use rate_limit::{
    RateLimitPolicy, RateLimitTelemetry, RateLimiter, ResponseOutcome, rate_limits,
};

pub use pagination::{Page, PaginatedQuery, Paginator};

pub use members::list_org_members;

pub use snapshot::SnapshotFetcher;

pub use types::{
    Connection, GraphQlError, MemberNode, PageInfo, RefNode, RefTarget, RepositoryNode,
};

//! GitHub GraphQL error types.

use thiserror::Error;

use super::client::QueryFailure;
use super::types::GraphQlError;

/// Errors that end a page sequence.
///
/// None of these escape the public acquisition entry points: a member whose
/// fetch hits one is reported absent, an organization whose listing hits one
/// is skipped.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The request was accepted but the API reported GraphQL errors.
    #[error("GraphQL query error: {}", summarize(.0))]
    Query(Vec<GraphQlError>),

    /// Non-2xx status, exhausted transport retries, or an unreadable body.
    #[error(transparent)]
    Failure(#[from] QueryFailure),

    /// `data` did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    /// The API returned `null` for the queried organization, user or repository.
    #[error("{0} not found")]
    NotFound(String),

    /// A page claimed more results but carried no cursor to fetch them.
    #[error("page reports hasNextPage without an endCursor")]
    MissingCursor,
}

impl GitHubError {
    /// Short failure kind for structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Query(_) => "query_error",
            Self::Failure(QueryFailure::Status { .. }) => "api_error",
            Self::Failure(QueryFailure::Transport(_)) => "transport_failure",
            Self::Failure(QueryFailure::Malformed(_)) => "malformed_response",
            Self::Decode(_) => "decode_error",
            Self::NotFound(_) => "not_found",
            Self::MissingCursor => "missing_cursor",
        }
    }
}

fn summarize(errors: &[GraphQlError]) -> String {
    match errors {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (+{} more)", rest.len()),
    }
}

//! GraphQL client: rate-limit admission, transport and response classification.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use super::error::GitHubError;
use super::rate_limit::{RateLimitPolicy, RateLimitTelemetry, RateLimiter, ResponseOutcome};
use super::types::GraphQlError;
use crate::clock::{Clock, SystemClock};
use crate::http::reqwest_transport::PoolOptions;
use crate::http::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_CONNECTION_MULTIPLIER, DEFAULT_REQUEST_TIMEOUT, HttpError,
    HttpMethod, HttpRequest, TransportSession,
};
use crate::retry::RetryPolicy;

/// GitHub's GraphQL endpoint.
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Longest response body excerpt kept in a [`QueryFailure::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Construction parameters for [`GraphQlClient::new`].
#[derive(Clone)]
pub struct ClientOptions {
    pub endpoint: String,
    pub token: String,
    /// Number of concurrent workers the connection pool is sized for.
    pub workers: usize,
    pub connection_multiplier: f64,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimitPolicy,
}

impl ClientOptions {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_GRAPHQL_URL.to_string(),
            token: token.into(),
            workers: crate::sync::DEFAULT_WORKERS,
            connection_multiplier: DEFAULT_CONNECTION_MULTIPLIER,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            rate_limit: RateLimitPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_connection_multiplier(mut self, multiplier: f64) -> Self {
        self.connection_multiplier = multiplier;
        self
    }

    fn pool(&self) -> PoolOptions {
        PoolOptions {
            workers: self.workers,
            connection_multiplier: self.connection_multiplier,
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("workers", &self.workers)
            .field("connection_multiplier", &self.connection_multiplier)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

/// Why a request produced no usable response.
#[derive(Debug, Error)]
pub enum QueryFailure {
    /// Any non-2xx status.
    #[error("API returned HTTP {status}")]
    Status { status: u16, body: String },

    /// Connection or read failure that survived transport retries.
    #[error("transport failure: {0}")]
    Transport(#[from] HttpError),

    /// 2xx response that is not a GraphQL response.
    #[error("malformed response body: {0}")]
    Malformed(String),
}

/// Outcome of one [`GraphQlClient::execute`] call.
#[derive(Debug)]
pub enum QueryResult {
    /// The response's `data` object.
    Success(Value),
    /// The API accepted the request but reported errors.
    QueryError(Vec<GraphQlError>),
    Failure(QueryFailure),
}

impl QueryResult {
    /// `data` on success, otherwise the error that ends a page sequence.
    pub fn into_data(self) -> Result<Value, GitHubError> {
        match self {
            Self::Success(data) => Ok(data),
            Self::QueryError(errors) => Err(GitHubError::Query(errors)),
            Self::Failure(failure) => Err(GitHubError::Failure(failure)),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

/// The only component that talks to the network.
///
/// Every request goes through the shared [`RateLimiter`] first; the limiter
/// lock is released before the request is sent, so only the budget
/// bookkeeping is serialized across workers. Cloning shares the session and
/// the budget.
#[derive(Clone)]
pub struct GraphQlClient {
    endpoint: String,
    token: Arc<str>,
    session: TransportSession,
    limiter: RateLimiter,
}

impl GraphQlClient {
    /// A client over a pooled reqwest transport on the system clock.
    pub fn new(options: ClientOptions) -> Result<Self, HttpError> {
        let session = TransportSession::new(&options.pool(), options.retry.clone())?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let limiter = RateLimiter::new(clock, options.rate_limit.clone());
        Ok(Self::with_parts(
            options.endpoint,
            options.token,
            session,
            limiter,
        ))
    }

    /// Assemble a client from an existing session and limiter.
    pub fn with_parts(
        endpoint: impl Into<String>,
        token: impl AsRef<str>,
        session: TransportSession,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: Arc::from(token.as_ref()),
            session,
            limiter,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    fn request(&self, query: &str, variables: &Value) -> HttpRequest {
        let body = json!({ "query": query, "variables": variables });
        HttpRequest {
            method: HttpMethod::Post,
            url: self.endpoint.clone(),
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {}", self.token)),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body: body.to_string().into_bytes(),
        }
    }

    /// Run one query.
    ///
    /// Never retries a [`QueryResult::Failure`]; transport-level retries
    /// happen inside the session and the caller decides what a failure means.
    pub async fn execute(&self, query: &str, variables: Value) -> QueryResult {
        self.limiter.admit().await;

        let task = tokio::task::try_id();
        let response = match self.session.send(self.request(query, &variables)).await {
            Ok(response) => response,
            Err(e) => {
                self.limiter.record(ResponseOutcome::TransportFailure).await;
                tracing::warn!(
                    task = ?task,
                    variables = %variables,
                    kind = "transport_failure",
                    error = %e,
                    "GraphQL request failed after transport retries"
                );
                return QueryResult::Failure(QueryFailure::Transport(e));
            }
        };

        if !response.is_success() {
            let status = response.status;
            self.limiter
                .record(ResponseOutcome::ApiError { status })
                .await;
            let body = excerpt(&response.body);
            tracing::warn!(
                task = ?task,
                variables = %variables,
                kind = "api_error",
                status,
                body = %body,
                "GraphQL request returned an error status"
            );
            return QueryResult::Failure(QueryFailure::Status { status, body });
        }

        let parsed: GraphQlResponse = match serde_json::from_slice(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    task = ?task,
                    variables = %variables,
                    kind = "malformed_response",
                    error = %e,
                    "GraphQL response body is not valid JSON"
                );
                return QueryResult::Failure(QueryFailure::Malformed(e.to_string()));
            }
        };

        let telemetry = parsed.data.as_ref().and_then(RateLimitTelemetry::from_data);

        match (parsed.data, parsed.errors) {
            (_, Some(errors)) if !errors.is_empty() => {
                self.limiter
                    .record(ResponseOutcome::QueryError(telemetry.as_ref()))
                    .await;
                tracing::warn!(
                    task = ?task,
                    variables = %variables,
                    kind = "query_error",
                    errors = errors.len(),
                    first = %errors[0],
                    "GraphQL query reported errors"
                );
                QueryResult::QueryError(errors)
            }
            (Some(data), _) if !data.is_null() => {
                self.limiter
                    .record(ResponseOutcome::Success(telemetry.as_ref()))
                    .await;
                QueryResult::Success(data)
            }
            _ => {
                tracing::warn!(
                    task = ?task,
                    variables = %variables,
                    kind = "malformed_response",
                    "GraphQL response carries neither data nor errors"
                );
                QueryResult::Failure(QueryFailure::Malformed(
                    "response has neither data nor errors".to_string(),
                ))
            }
        }
    }

    /// Current budget as reported by the API.
    pub async fn rate_limit(&self) -> Result<RateLimitTelemetry, GitHubError> {
        let data = self
            .execute(super::queries::RATE_LIMIT, json!({}))
            .await
            .into_data()?;
        RateLimitTelemetry::from_data(&data)
            .ok_or_else(|| GitHubError::NotFound("rateLimit".to_string()))
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::retry::{RetryPolicy, with_retry};

/// Default connect timeout for a single attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read timeout for a single attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default ratio of pooled connections to workers.
pub const DEFAULT_CONNECTION_MULTIPLIER: f64 = 2.0;

/// Methods this crate sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// Header name/value pairs in wire order. Lookups ignore name case.
pub type HttpHeaders = Vec<(String, String)>;

/// A minimal HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("http transport error: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

impl HttpError {
    /// Whether a fresh attempt of the same request could succeed.
    ///
    /// Only network-layer failures qualify. Malformed requests and missing
    /// test fixtures fail the same way every time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_) | Self::Transport(_))
    }
}

/// Everything that touches the network goes through this trait.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// First value for `name`, ignoring case.
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Connection-pool sizing for `workers` concurrent callers.
///
/// Never below one connection per worker.
#[must_use]
pub fn pool_size(workers: usize, connection_multiplier: f64) -> usize {
    let workers = workers.max(1);
    let scaled = (workers as f64 * connection_multiplier).floor() as usize;
    scaled.max(workers)
}

pub mod reqwest_transport {
    use super::*;

    /// Settings for the pooled reqwest client.
    #[derive(Debug, Clone)]
    pub struct PoolOptions {
        pub workers: usize,
        pub connection_multiplier: f64,
        pub connect_timeout: Duration,
        pub request_timeout: Duration,
    }

    impl Default for PoolOptions {
        fn default() -> Self {
            Self {
                workers: crate::sync::DEFAULT_WORKERS,
                connection_multiplier: DEFAULT_CONNECTION_MULTIPLIER,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            }
        }
    }

    /// Transport over a pooled `reqwest::Client`.
    ///
    /// The underlying client is cheap to clone and shares one connection
    /// pool across all clones.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        /// Build a client whose idle pool holds enough keep-alive
        /// connections for every worker.
        pub fn pooled(options: &PoolOptions) -> Result<Self, HttpError> {
            let pool = pool_size(options.workers, options.connection_multiplier);
            tracing::info!(
                pool_size = pool,
                workers = options.workers,
                "Configuring connection pool"
            );

            let client = reqwest::Client::builder()
                .pool_max_idle_per_host(pool)
                .connect_timeout(options.connect_timeout)
                .timeout(options.request_timeout)
                .tcp_keepalive(Duration::from_secs(60))
                .user_agent(concat!("guardian/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
            Ok(Self { client })
        }
    }

    fn classify(e: reqwest::Error) -> HttpError {
        if e.is_builder() {
            HttpError::InvalidRequest(e.to_string())
        } else if e.is_timeout() {
            HttpError::Timeout(e.to_string())
        } else if e.is_connect() {
            HttpError::Connect(e.to_string())
        } else {
            HttpError::Transport(e.to_string())
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
            };

            let mut builder = self.client.request(method, &request.url);
            for (k, v) in request.headers {
                builder = builder.header(&k, &v);
            }

            if !request.body.is_empty() {
                builder = builder.body(request.body);
            }

            let resp = builder.send().await.map_err(classify)?;

            let status = resp.status().as_u16();
            let mut headers: HttpHeaders = Vec::new();
            for (name, value) in resp.headers().iter() {
                headers.push((
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                ));
            }

            let body = resp.bytes().await.map_err(classify)?.to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

/// Shared, retrying HTTP session.
///
/// Wraps a transport with the network-layer retry policy. Every request this
/// crate sends is a single self-contained GraphQL query, so replaying one
/// after a connection or read failure is safe. Status codes are returned
/// untouched; interpreting them is the caller's job.
#[derive(Clone)]
pub struct TransportSession {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl TransportSession {
    /// A pooled reqwest session on the system clock.
    pub fn new(
        options: &reqwest_transport::PoolOptions,
        policy: RetryPolicy,
    ) -> Result<Self, HttpError> {
        let transport = reqwest_transport::ReqwestTransport::pooled(options)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            policy,
            Arc::new(SystemClock),
        ))
    }

    pub fn with_transport(
        transport: Arc<dyn HttpTransport>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            policy,
            clock,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send a request, retrying transport failures per the policy.
    ///
    /// Returns the last transport error once retries are exhausted.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let label = format!("{} {}", request.method.as_str(), request.url);
        with_retry(
            || {
                let transport = Arc::clone(&self.transport);
                let request = request.clone();
                async move { transport.send(request).await }
            },
            &self.policy,
            Arc::clone(&self.clock),
            HttpError::is_retryable,
            &label,
        )
        .await
    }
}

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::Mutex;

/// Scripted transport for unit tests.
///
/// Responses are queued per method and URL; every request is logged.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<(HttpMethod, String), VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for a method + URL.
    ///
    /// If multiple responses are registered for the same key, they are returned
    /// in FIFO order.
    pub fn push_response(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        response: HttpResponse,
    ) {
        self.push_result(method, url, Ok(response));
    }

    /// Register a transport failure for a method + URL.
    pub fn push_error(&self, method: HttpMethod, url: impl Into<String>, error: HttpError) {
        self.push_result(method, url, Err(error));
    }

    /// Register a 200 response with a JSON body.
    pub fn push_json(&self, url: impl Into<String>, body: serde_json::Value) {
        self.push_response(
            HttpMethod::Post,
            url,
            HttpResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: serde_json::to_vec(&body).expect("serializable body"),
            },
        );
    }

    fn push_result(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        result: Result<HttpResponse, HttpError>,
    ) {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner
            .routes
            .entry((method, url.into()))
            .or_default()
            .push_back(result);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner.requests.clone()
    }

    /// Request bodies decoded as JSON, in send order.
    #[must_use]
    pub fn request_bodies(&self) -> Vec<serde_json::Value> {
        self.requests()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).expect("request body is JSON"))
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");

        let key = (request.method, request.url.clone());
        inner.requests.push(request);

        match inner.routes.get_mut(&key).and_then(|q| q.pop_front()) {
            Some(result) => result,
            None => Err(HttpError::NoMockResponse {
                method: key.0.as_str().to_string(),
                url: key.1,
            }),
        }
    }
}

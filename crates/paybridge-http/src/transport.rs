//! HTTP transport abstraction
//!
//! The pipeline never talks to sockets itself. It hands each request to a
//! [`Transport`], which lets tests inject [`MockTransport`] and lets
//! applications supply their own client.
//!
//! # Example
//!
//! ```no_run
//! use paybridge_http::transport::{ReqwestTransport, Transport, TransportConfig};
//! use paybridge_http::HttpRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ReqwestTransport::new(TransportConfig::new("https://api.example.com/v1"))?;
//! let response = transport.send(&HttpRequest::get("/health")).await?;
//! println!("{} {}", response.status, response.body);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use paybridge_types::TransportError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::request::{HttpRequest, HttpResponse};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default user agent
pub const DEFAULT_USER_AGENT: &str = concat!("paybridge-sdk-rs/", env!("CARGO_PKG_VERSION"));

/// Trait for HTTP transport abstraction
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return whatever status came back
    ///
    /// Only failures where no response arrived are errors.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Base URL requests are resolved against
    fn base_url(&self) -> &str;
}

/// Settings for [`ReqwestTransport`]
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// `false` accepts invalid certificates (sandbox environments only)
    pub verify_ssl: bool,
    pub user_agent: String,
    /// Sent with every request
    pub default_headers: BTreeMap<String, String>,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            verify_ssl: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: BTreeMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }
}

/// Real HTTP transport using reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build the underlying client
    ///
    /// Fails if a default header is not a valid HTTP header.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(format!("header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        debug!(base_url = %config.base_url, verify_ssl = config.verify_ssl, "Created HTTP transport");

        Ok(Self {
            client,
            base_url: config.base_url,
            timeout: config.timeout,
        })
    }

    async fn perform(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let url = request.url(&self.base_url);
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .timeout(timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let timeout = request.timeout.unwrap_or(self.timeout);

        match &request.cancellation {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(TransportError::Cancelled),
                    result = self.perform(request, timeout) => result,
                }
            }
            None => self.perform(request, timeout).await,
        }
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else if error.is_body() || error.is_decode() {
        TransportError::Body(error.to_string())
    } else {
        TransportError::ConnectionFailed(error.to_string())
    }
}

/// Mock transport for testing
///
/// Returns scripted responses and records every request it receives.
/// Responses scripted for a specific path take precedence over the shared
/// queue. An exhausted script yields a connection failure.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockTransport {
    base_url: String,
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<HttpResponse, TransportError>>>,
    routes: parking_lot::Mutex<
        std::collections::HashMap<String, std::collections::VecDeque<Result<HttpResponse, TransportError>>>,
    >,
    requests: parking_lot::Mutex<Vec<HttpRequest>>,
    latency: Option<Duration>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockTransport {
    /// Create a new mock transport
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            responses: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            routes: parking_lot::Mutex::new(std::collections::HashMap::new()),
            requests: parking_lot::Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Delay every response (uses tokio time, so paused tests stay fast)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a response
    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queue a JSON response
    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push_response(HttpResponse::json(status, &body));
    }

    /// Queue a transport failure
    pub fn push_error(&self, error: TransportError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Queue a JSON response for one path only
    pub fn push_json_for(&self, path: impl Into<String>, status: u16, body: serde_json::Value) {
        self.routes
            .lock()
            .entry(path.into())
            .or_default()
            .push_back(Ok(HttpResponse::json(status, &body)));
    }

    /// Queue a transport failure for one path only
    pub fn push_error_for(&self, path: impl Into<String>, error: TransportError) {
        self.routes
            .lock()
            .entry(path.into())
            .or_default()
            .push_back(Err(error));
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Requests received for one path
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    /// Number of requests received
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_response(&self, path: &str) -> Result<HttpResponse, TransportError> {
        if let Some(queue) = self.routes.lock().get_mut(path) {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(TransportError::ConnectionFailed(format!(
                "no scripted response for {}",
                path
            )))
        })
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request.clone());

        if let Some(latency) = self.latency {
            match &request.cancellation {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => return Err(TransportError::Cancelled),
                        _ = tokio::time::sleep(latency) => {}
                    }
                }
                None => tokio::time::sleep(latency).await,
            }
        }

        self.next_response(&request.path)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

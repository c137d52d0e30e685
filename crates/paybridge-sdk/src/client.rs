//! Main client implementation

use crate::builder::PayBridgeClientBuilder;
use crate::config::ClientConfig;
use crate::endpoints::{CryptoEndpoints, DepositEndpoints, PixEndpoints, WithdrawalEndpoints};
use paybridge_auth::{Authenticator, Credentials, TokenState};
use paybridge_http::{ApiResponse, HttpRequest, Pipeline, SharedRateLimiter};
use paybridge_types::{PayBridgeError, PayBridgeResult};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// PayBridge API client
///
/// Cheap to clone; clones share the token, the pipeline and the rate limiter.
///
/// # Example
///
/// ```no_run
/// use paybridge_sdk::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), PayBridgeError> {
///     let client = PayBridgeClient::builder()
///         .with_credentials(Credentials::from_env()?)
///         .build()?;
///
///     client.login().await?;
///
///     let deposit = client
///         .deposits()
///         .create(&CreateDeposit::new("150.00", "BRL")?)
///         .await?;
///     println!("created deposit {}", deposit.data["id"]);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct PayBridgeClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    pipeline: Pipeline,
    authenticator: Authenticator,
    rate_limiter: Option<SharedRateLimiter>,
    rate_limit_key: String,
}

impl std::fmt::Debug for PayBridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayBridgeClient")
            .field("base_url", &self.base_url())
            .field("token_state", &self.token_state())
            .field("rate_limited", &self.inner.rate_limiter.is_some())
            .finish()
    }
}

impl PayBridgeClient {
    /// Create a client with the given configuration
    pub fn new(config: ClientConfig) -> PayBridgeResult<Self> {
        PayBridgeClientBuilder::from_config(config).build()
    }

    /// Create a client configured from `PAYBRIDGE_*` environment variables
    pub fn from_env() -> PayBridgeResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn builder() -> PayBridgeClientBuilder {
        PayBridgeClientBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        pipeline: Pipeline,
        authenticator: Authenticator,
        rate_limiter: Option<SharedRateLimiter>,
        rate_limit_key: String,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                pipeline,
                authenticator,
                rate_limiter,
                rate_limit_key,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn base_url(&self) -> &str {
        self.inner.pipeline.base_url()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.inner.authenticator
    }

    pub fn rate_limiter(&self) -> Option<&SharedRateLimiter> {
        self.inner.rate_limiter.as_ref()
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Log in with the configured credentials
    #[instrument(skip(self))]
    pub async fn login(&self) -> PayBridgeResult<()> {
        self.inner.authenticator.login().await?;
        Ok(())
    }

    /// Replace the credentials and log in with them
    #[instrument(skip_all)]
    pub async fn login_with(&self, credentials: Credentials) -> PayBridgeResult<()> {
        self.inner.authenticator.set_credentials(credentials);
        self.login().await
    }

    /// End the session; the local token is cleared even if the server call fails
    #[instrument(skip(self))]
    pub async fn logout(&self) -> PayBridgeResult<()> {
        self.inner.authenticator.logout().await
    }

    /// True while a non-expired token is held
    pub fn is_authenticated(&self) -> bool {
        self.inner.authenticator.token_store().has_token()
    }

    pub fn token_state(&self) -> TokenState {
        self.inner.authenticator.state()
    }

    // ========================================================================
    // Raw Requests
    // ========================================================================

    /// Send a request through the rate limiter and the pipeline
    pub async fn request(&self, request: HttpRequest) -> PayBridgeResult<ApiResponse<Value>> {
        if let Some(limiter) = &self.inner.rate_limiter {
            limiter.allow(&self.inner.rate_limit_key)?;
        }
        debug!(method = %request.method, path = %request.path, "Sending request");
        self.inner.pipeline.execute(request).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> PayBridgeResult<ApiResponse<Value>> {
        let mut request = HttpRequest::get(path);
        for (name, value) in query {
            request = request.with_query(*name, *value);
        }
        self.request(request).await
    }

    #[instrument(skip(self, body))]
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> PayBridgeResult<ApiResponse<Value>> {
        self.request(HttpRequest::post(path).with_json(to_json(body)?)).await
    }

    #[instrument(skip(self, body))]
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> PayBridgeResult<ApiResponse<Value>> {
        self.request(HttpRequest::put(path).with_json(to_json(body)?)).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> PayBridgeResult<ApiResponse<Value>> {
        self.request(HttpRequest::delete(path)).await
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    pub fn deposits(&self) -> DepositEndpoints<'_> {
        DepositEndpoints::new(self)
    }

    pub fn withdrawals(&self) -> WithdrawalEndpoints<'_> {
        WithdrawalEndpoints::new(self)
    }

    pub fn crypto(&self) -> CryptoEndpoints<'_> {
        CryptoEndpoints::new(self)
    }

    pub fn pix(&self) -> PixEndpoints<'_> {
        PixEndpoints::new(self)
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> PayBridgeResult<Value> {
    serde_json::to_value(body)
        .map_err(|e| PayBridgeError::Configuration(format!("unserializable request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paybridge_http::MockTransport;
    use paybridge_types::{MemoryCache, RateLimitConfig};
    use serde_json::json;
    use std::time::Duration;

    fn client(transport: Arc<MockTransport>) -> PayBridgeClient {
        PayBridgeClient::builder()
            .with_transport(transport)
            .with_cache(Arc::new(MemoryCache::new()))
            .with_credentials(Credentials::new("ops@example.com", "secret"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_then_authorized_get() {
        let transport = Arc::new(MockTransport::new("https://api.test/v1"));
        transport.push_json(200, json!({"token": "T1", "expires_in": 3600}));
        transport.push_json(200, json!({"data": []}));

        let client = client(transport.clone());
        client.login().await.unwrap();
        assert!(client.is_authenticated());

        client.get("/deposits", &[("status", "pending")]).await.unwrap();

        let sent = transport.requests_to("/deposits");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("authorization"), Some("Bearer T1"));
        assert_eq!(sent[0].query, vec![("status".to_string(), "pending".to_string())]);
    }

    #[tokio::test]
    async fn test_post_put_delete_methods() {
        let transport = Arc::new(MockTransport::new("https://api.test/v1"));
        transport.push_json(201, json!({"id": "a"}));
        transport.push_json(200, json!({"id": "a"}));
        transport.push_response(paybridge_http::HttpResponse::new(204, ""));

        let client = client(transport.clone());
        client.post("/things", &json!({"name": "a"})).await.unwrap();
        client.put("/things/a", &json!({"name": "b"})).await.unwrap();
        let deleted = client.delete("/things/a").await.unwrap();
        assert_eq!(deleted.data, Value::Null);

        let methods: Vec<String> = transport.requests().iter().map(|r| r.method.to_string()).collect();
        assert_eq!(methods, vec!["POST", "PUT", "DELETE"]);
        assert_eq!(transport.requests()[1].body, Some(json!({"name": "b"})));
    }

    #[tokio::test]
    async fn test_rate_limit_gate_rejects_before_sending() {
        let transport = Arc::new(MockTransport::new("https://api.test/v1"));
        transport.push_json(200, json!({}));
        transport.push_json(200, json!({}));

        let config = ClientConfig::default().with_rate_limit(RateLimitConfig::new(2, Duration::from_secs(60)));
        let client = PayBridgeClientBuilder::from_config(config)
            .with_transport(transport.clone())
            .with_cache(Arc::new(MemoryCache::new()))
            .build()
            .unwrap();

        client.get("/crypto/balances", &[]).await.unwrap();
        client.get("/crypto/balances", &[]).await.unwrap();
        let err = client.get("/crypto/balances", &[]).await.unwrap_err();

        assert!(matches!(err, PayBridgeError::RateLimited { .. }));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_logout_clears_token() {
        let transport = Arc::new(MockTransport::new("https://api.test/v1"));
        transport.push_json(200, json!({"token": "T1"}));
        transport.push_json(200, json!({}));

        let client = client(transport);
        client.login().await.unwrap();
        client.logout().await.unwrap();
        assert!(!client.is_authenticated());
        assert_eq!(client.token_state(), TokenState::NoToken);
    }

    #[test]
    fn test_clone_shares_state() {
        let transport = Arc::new(MockTransport::new("https://api.test/v1"));
        let a = client(transport);
        let b = a.clone();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }
}

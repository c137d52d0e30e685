//! Session lifecycle: login, proactive refresh, fallback to login
//!
//! ```text
//! NoToken --login--> Valid --time--> ExpiringSoon --refresh--> Valid
//!                                         |            (fails) --login--> Valid
//!                                         +--time--> Expired
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use paybridge_auth::{Authenticator, Credentials, TokenStore};
//! use paybridge_http::{Pipeline, ReqwestTransport, TransportConfig};
//! use paybridge_types::FileCache;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(ReqwestTransport::new(TransportConfig::new("https://api.example.com/v1"))?);
//! let pipeline = Pipeline::builder(transport).build();
//! let store = Arc::new(TokenStore::new(Arc::new(FileCache::new(FileCache::default_dir())?), None));
//!
//! let auth = Authenticator::new(pipeline, store, Some(Credentials::from_env()?));
//! auth.login().await?;
//! let token = auth.get_token().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use paybridge_http::{error_message, HttpRequest, HttpResponse, Pipeline, TokenSource};
use paybridge_types::{PayBridgeError, PayBridgeResult};
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::credentials::Credentials;
use crate::token_store::{TokenState, TokenStore};

/// Login endpoint
pub const LOGIN_PATH: &str = "/auth/token";
/// Refresh endpoint
pub const REFRESH_PATH: &str = "/auth/refresh";
/// Logout endpoint
pub const LOGOUT_PATH: &str = "/auth/logout";

/// Obtains, refreshes and drops access tokens
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct Authenticator {
    inner: Arc<AuthenticatorInner>,
}

struct AuthenticatorInner {
    /// Pipeline without auth middleware
    pipeline: Pipeline,
    store: Arc<TokenStore>,
    credentials: RwLock<Option<Credentials>>,
    /// Serializes refreshes so concurrent callers trigger only one
    refresh_lock: Mutex<()>,
    state_tx: watch::Sender<TokenState>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("state", &self.state())
            .field("has_credentials", &self.has_credentials())
            .finish()
    }
}

/// Token fields of a login or refresh response
struct IssuedToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

impl IssuedToken {
    fn from_body(body: &Value) -> Option<Self> {
        let access_token = body
            .get("token")
            .or_else(|| body.get("access_token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())?
            .to_string();
        let refresh_token = body
            .get("refresh_token")
            .and_then(Value::as_str)
            .map(str::to_string);
        let expires_in = match body.get("expires_in") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        Some(Self {
            access_token,
            refresh_token,
            expires_in,
        })
    }
}

impl Authenticator {
    /// `pipeline` must not contain auth middleware
    pub fn new(pipeline: Pipeline, store: Arc<TokenStore>, credentials: Option<Credentials>) -> Self {
        let (state_tx, _) = watch::channel(store.state());
        Self {
            inner: Arc::new(AuthenticatorInner {
                pipeline,
                store,
                credentials: RwLock::new(credentials),
                refresh_lock: Mutex::new(()),
                state_tx,
            }),
        }
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        *self.inner.credentials.write() = Some(credentials);
    }

    pub fn has_credentials(&self) -> bool {
        self.inner.credentials.read().is_some()
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.inner.store
    }

    pub fn state(&self) -> TokenState {
        self.inner.store.state()
    }

    /// Subscribe to session state changes
    pub fn subscribe_state(&self) -> watch::Receiver<TokenState> {
        self.inner.state_tx.subscribe()
    }

    /// Exchange the configured credentials for a token
    #[instrument(skip(self))]
    pub async fn login(&self) -> PayBridgeResult<String> {
        let body = match self.inner.credentials.read().as_ref() {
            Some(credentials) => credentials.login_body(),
            None => return Err(PayBridgeError::authentication("no credentials configured")),
        };

        let response = self
            .inner
            .pipeline
            .send(HttpRequest::post(LOGIN_PATH).with_json(body))
            .await
            .map_err(login_failure)?;

        if !response.is_success() {
            let message = response_message(&response);
            warn!(status = response.status, "Login rejected");
            return Err(PayBridgeError::Authentication {
                message,
                status: Some(response.status),
            });
        }

        let issued = parse_json(&response)
            .as_ref()
            .and_then(IssuedToken::from_body)
            .ok_or_else(|| PayBridgeError::authentication("no token in response"))?;

        let token = self.store(issued)?;
        info!("Logged in");
        Ok(token)
    }

    /// Exchange the refresh token for a new access token
    ///
    /// Falls back to [`login`](Self::login) when there is no refresh token or
    /// the refresh fails for any reason.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> PayBridgeResult<String> {
        let Some(refresh_token) = self.inner.store.refresh_token() else {
            debug!("No refresh token, logging in");
            return self.login().await;
        };

        match self.try_refresh(refresh_token).await {
            Ok(token) => {
                info!("Token refreshed");
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, falling back to login");
                self.login().await
            }
        }
    }

    async fn try_refresh(&self, refresh_token: String) -> PayBridgeResult<String> {
        let request = HttpRequest::post(REFRESH_PATH).with_json(json!({ "refresh_token": refresh_token }));
        let response = self.inner.pipeline.send(request).await?;

        if !response.is_success() {
            return Err(PayBridgeError::Authentication {
                message: response_message(&response),
                status: Some(response.status),
            });
        }

        let issued = parse_json(&response)
            .as_ref()
            .and_then(IssuedToken::from_body)
            .ok_or_else(|| PayBridgeError::authentication("no token in response"))?;
        self.store(issued)
    }

    /// Current access token, refreshed first when it is about to expire
    ///
    /// `Ok(None)` means there is no usable token; call [`login`](Self::login).
    /// That includes a renewal whose refresh and fallback login both failed
    /// after the old token lapsed. While the old token is still usable it is
    /// returned instead.
    #[instrument(skip(self))]
    pub async fn get_token(&self) -> PayBridgeResult<Option<String>> {
        if self.needs_refresh() {
            let _guard = self.inner.refresh_lock.lock().await;
            // Another caller may have refreshed while we waited
            if self.needs_refresh() {
                if let Err(e) = self.refresh().await {
                    match self.inner.store.get_token() {
                        Some(token) => {
                            warn!(error = %e, "Refresh failed, using current token until it expires");
                            self.publish_state();
                            return Ok(Some(token));
                        }
                        None => {
                            warn!(error = %e, "Token renewal failed, login required");
                            self.publish_state();
                            return Ok(None);
                        }
                    }
                }
            }
        }

        let token = self.inner.store.get_token();
        self.publish_state();
        Ok(token)
    }

    /// Token if logged in, otherwise log in first
    pub async fn ensure_token(&self) -> PayBridgeResult<String> {
        match self.get_token().await? {
            Some(token) => Ok(token),
            None => self.login().await,
        }
    }

    /// End the session
    ///
    /// The server call is best effort; the local token is always cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> PayBridgeResult<()> {
        if let Some(token) = self.inner.store.get_token() {
            let request = HttpRequest::post(LOGOUT_PATH).with_header("Authorization", format!("Bearer {}", token));
            match self.inner.pipeline.send(request).await {
                Ok(response) if !response.is_success() => {
                    debug!(status = response.status, "Logout call rejected, ignoring");
                }
                Err(e) => debug!(error = %e, "Logout call failed, ignoring"),
                Ok(_) => {}
            }
        }

        let cleared = self.inner.store.clear_token();
        self.publish_state();
        info!("Logged out");
        cleared
    }

    /// Refresh is due, or the token lapsed but can still be renewed
    fn needs_refresh(&self) -> bool {
        match self.inner.store.state() {
            TokenState::ExpiringSoon => true,
            TokenState::Expired => self.inner.store.refresh_token().is_some() || self.has_credentials(),
            TokenState::NoToken | TokenState::Valid => false,
        }
    }

    fn store(&self, issued: IssuedToken) -> PayBridgeResult<String> {
        let token = issued.access_token.clone();
        self.inner
            .store
            .set_token(issued.access_token, issued.refresh_token, issued.expires_in)?;
        self.publish_state();
        Ok(token)
    }

    fn publish_state(&self) {
        let state = self.inner.store.state();
        self.inner.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }
}

#[async_trait]
impl TokenSource for Authenticator {
    async fn current_token(&self) -> PayBridgeResult<Option<String>> {
        self.get_token().await
    }
}

fn login_failure(error: PayBridgeError) -> PayBridgeError {
    match error {
        PayBridgeError::Cancelled => PayBridgeError::Cancelled,
        other => PayBridgeError::Authentication {
            message: format!("login request failed: {}", other),
            status: other.status(),
        },
    }
}

fn parse_json(response: &HttpResponse) -> Option<Value> {
    serde_json::from_str(&response.body).ok()
}

fn response_message(response: &HttpResponse) -> String {
    parse_json(response)
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| format!("HTTP {}", response.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paybridge_http::{MockTransport, RetryPolicy, TracingSink};
    use paybridge_types::{MemoryCache, MockClock, TransportError};
    use std::time::Duration;

    const T0: i64 = 1_700_000_000;

    struct Harness {
        transport: Arc<MockTransport>,
        clock: MockClock,
        auth: Authenticator,
    }

    fn harness(credentials: Option<Credentials>) -> Harness {
        let transport = Arc::new(MockTransport::new("https://mock.test"));
        let clock = MockClock::at_unix(T0);
        let store = Arc::new(TokenStore::with_clock(
            Arc::new(MemoryCache::new()),
            Arc::new(clock.clone()),
            None,
        ));
        let pipeline = Pipeline::builder(transport.clone())
            .with_retry(RetryPolicy::disabled(), None)
            .with_logging(Arc::new(TracingSink), true)
            .build();
        Harness {
            transport,
            clock,
            auth: Authenticator::new(pipeline, store, credentials),
        }
    }

    fn creds() -> Option<Credentials> {
        Some(Credentials::new("ops@example.com", "hunter2"))
    }

    #[tokio::test]
    async fn test_login_stores_token() {
        let h = harness(creds());
        h.transport.push_json_for(
            LOGIN_PATH,
            200,
            json!({"token": "T1", "refresh_token": "R1", "expires_in": 3600}),
        );

        assert_eq!(h.auth.login().await.unwrap(), "T1");
        assert_eq!(h.auth.state(), TokenState::Valid);
        assert_eq!(h.auth.token_store().refresh_token().as_deref(), Some("R1"));

        let sent = &h.transport.requests_to(LOGIN_PATH)[0];
        let body = sent.body.as_ref().unwrap();
        assert_eq!(body["email"], "ops@example.com");
        assert_eq!(body["password"], "hunter2");
        assert!(sent.header("Authorization").is_none());
    }

    #[tokio::test]
    async fn test_login_accepts_access_token_field() {
        let h = harness(creds());
        h.transport
            .push_json_for(LOGIN_PATH, 200, json!({"access_token": "T2", "expires_in": "600"}));
        assert_eq!(h.auth.login().await.unwrap(), "T2");
        assert_eq!(h.auth.token_store().expires_at(), Some(T0 + 600));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let h = harness(creds());
        h.transport
            .push_json_for(LOGIN_PATH, 401, json!({"message": "invalid credentials"}));

        match h.auth.login().await.unwrap_err() {
            PayBridgeError::Authentication { message, status } => {
                assert_eq!(message, "invalid credentials");
                assert_eq!(status, Some(401));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.auth.state(), TokenState::NoToken);
    }

    #[tokio::test]
    async fn test_login_without_token_field() {
        let h = harness(creds());
        h.transport.push_json_for(LOGIN_PATH, 200, json!({"ok": true}));
        let err = h.auth.login().await.unwrap_err();
        assert_eq!(err.to_string(), "Authentication failed: no token in response");
    }

    #[tokio::test]
    async fn test_login_transport_failure_is_authentication() {
        let h = harness(creds());
        h.transport
            .push_error_for(LOGIN_PATH, TransportError::ConnectionFailed("refused".into()));
        assert!(h.auth.login().await.unwrap_err().requires_reauth());
    }

    #[tokio::test]
    async fn test_login_without_credentials() {
        let h = harness(None);
        assert!(h.auth.login().await.unwrap_err().requires_reauth());
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_falls_back_to_login() {
        let h = harness(creds());
        h.auth
            .token_store()
            .set_token("OLD", Some("R0".into()), Some(3600))
            .unwrap();

        h.transport
            .push_error_for(REFRESH_PATH, TransportError::ConnectionFailed("reset".into()));
        h.transport
            .push_json_for(LOGIN_PATH, 200, json!({"token": "FRESH", "expires_in": 3600}));

        assert_eq!(h.auth.refresh().await.unwrap(), "FRESH");
        assert_eq!(h.transport.requests_to(REFRESH_PATH).len(), 1);
        assert_eq!(h.transport.requests_to(LOGIN_PATH).len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_rejected_falls_back_to_login() {
        let h = harness(creds());
        h.auth
            .token_store()
            .set_token("OLD", Some("R0".into()), Some(3600))
            .unwrap();
        h.transport
            .push_json_for(REFRESH_PATH, 401, json!({"error": "refresh token revoked"}));
        h.transport
            .push_json_for(LOGIN_PATH, 200, json!({"token": "FRESH"}));

        assert_eq!(h.auth.refresh().await.unwrap(), "FRESH");
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_logs_in() {
        let h = harness(creds());
        h.transport
            .push_json_for(LOGIN_PATH, 200, json!({"token": "T", "expires_in": 3600}));
        assert_eq!(h.auth.refresh().await.unwrap(), "T");
        assert!(h.transport.requests_to(REFRESH_PATH).is_empty());
    }

    #[tokio::test]
    async fn test_get_token_refreshes_when_expiring() {
        let h = harness(creds());
        h.auth
            .token_store()
            .set_token("OLD", Some("R0".into()), Some(3600))
            .unwrap();

        assert_eq!(h.auth.get_token().await.unwrap().as_deref(), Some("OLD"));
        assert!(h.transport.requests().is_empty());

        h.clock.advance(Duration::from_secs(3400));
        h.transport.push_json_for(
            REFRESH_PATH,
            200,
            json!({"token": "NEW", "refresh_token": "R1", "expires_in": 3600}),
        );

        assert_eq!(h.auth.get_token().await.unwrap().as_deref(), Some("NEW"));
        let sent = &h.transport.requests_to(REFRESH_PATH)[0];
        assert_eq!(sent.body.as_ref().unwrap()["refresh_token"], "R0");
    }

    #[tokio::test]
    async fn test_get_token_none_when_logged_out() {
        let h = harness(None);
        assert_eq!(h.auth.get_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_token_keeps_usable_token_when_renewal_fails() {
        let h = harness(None);
        h.auth.token_store().set_token("OLD", None, Some(3600)).unwrap();
        h.clock.advance(Duration::from_secs(3400));

        assert_eq!(h.auth.get_token().await.unwrap().as_deref(), Some("OLD"));
    }

    #[tokio::test]
    async fn test_get_token_none_when_renewal_fails_after_expiry() {
        let h = harness(creds());
        h.auth
            .token_store()
            .set_token("OLD", Some("R0".into()), Some(3600))
            .unwrap();
        h.clock.advance(Duration::from_secs(3590));
        h.transport
            .push_error_for(REFRESH_PATH, TransportError::ConnectionFailed("reset".into()));
        h.transport
            .push_json_for(LOGIN_PATH, 401, json!({"message": "bad creds"}));

        assert_eq!(h.auth.get_token().await.unwrap(), None);
        assert_eq!(h.transport.requests_to(REFRESH_PATH).len(), 1);
        assert_eq!(h.transport.requests_to(LOGIN_PATH).len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_get_token_refreshes_once() {
        let h = harness(creds());
        h.auth
            .token_store()
            .set_token("OLD", Some("R0".into()), Some(3600))
            .unwrap();
        h.clock.advance(Duration::from_secs(3400));
        h.transport
            .push_json_for(REFRESH_PATH, 200, json!({"token": "NEW", "expires_in": 3600}));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let auth = h.auth.clone();
                tokio::spawn(async move { auth.get_token().await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().as_deref(), Some("NEW"));
        }
        assert_eq!(h.transport.requests_to(REFRESH_PATH).len(), 1);
    }

    #[tokio::test]
    async fn test_logout_is_best_effort() {
        let h = harness(creds());
        h.auth.token_store().set_token("T", None, Some(3600)).unwrap();
        h.transport
            .push_error_for(LOGOUT_PATH, TransportError::ConnectionFailed("down".into()));

        h.auth.logout().await.unwrap();
        assert_eq!(h.auth.state(), TokenState::NoToken);

        let sent = &h.transport.requests_to(LOGOUT_PATH)[0];
        assert_eq!(sent.header("Authorization"), Some("Bearer T"));
    }

    #[tokio::test]
    async fn test_state_changes_are_published() {
        let h = harness(creds());
        let mut rx = h.auth.subscribe_state();
        assert_eq!(*rx.borrow(), TokenState::NoToken);

        h.transport
            .push_json_for(LOGIN_PATH, 200, json!({"token": "T", "expires_in": 3600}));
        h.auth.login().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), TokenState::Valid);
    }
}

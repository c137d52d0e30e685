//! Bearer token injection

use std::sync::Arc;

use async_trait::async_trait;
use paybridge_types::PayBridgeResult;
use tracing::trace;

use super::{Middleware, Next};
use crate::request::{HttpRequest, HttpResponse};

/// Supplies the access token for outgoing requests
///
/// Implemented by the authenticator, which may refresh before answering.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Current access token, `None` when nobody is logged in
    async fn current_token(&self) -> PayBridgeResult<Option<String>>;
}

/// Fixed token (service accounts and tests)
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn current_token(&self) -> PayBridgeResult<Option<String>> {
        Ok(self.0.clone())
    }
}

/// Adds `Authorization: Bearer <token>` to every non-`/auth/` request
///
/// Never logs in by itself: without a token the request goes out bare.
pub struct AuthMiddleware {
    tokens: Arc<dyn TokenSource>,
}

impl AuthMiddleware {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn handle(&self, mut request: HttpRequest, next: Next<'_>) -> PayBridgeResult<HttpResponse> {
        if !request.is_auth_endpoint() {
            match self.tokens.current_token().await? {
                Some(token) => request.set_header("Authorization", format!("Bearer {}", token)),
                None => trace!(path = %request.path, "No access token, sending unauthenticated"),
            }
        }
        next.run(request).await
    }
}

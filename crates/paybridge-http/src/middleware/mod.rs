//! Middleware chain
//!
//! Each middleware receives the request and a [`Next`] handle to the rest of
//! the chain. It may rewrite the request, call `next.run(..)` any number of
//! times, or return without calling it. The innermost step is the transport.
//!
//! Transport failures enter the chain as [`PayBridgeError::Network`] carrying
//! the [`TransportError`](paybridge_types::TransportError), so every layer
//! sees one error type.

mod auth;
mod logging;
mod retry;
pub mod sanitize;

use std::sync::Arc;

use async_trait::async_trait;
use paybridge_types::{PayBridgeError, PayBridgeResult};

use crate::request::{HttpRequest, HttpResponse};
use crate::transport::Transport;

pub use auth::{AuthMiddleware, StaticToken, TokenSource};
pub use logging::{LogLevel, LogSink, LoggingMiddleware, TracingSink, MAX_LOGGED_BODY_BYTES};
pub use retry::{RetryHook, RetryMiddleware, RetryPolicy};

/// One step of the request pipeline
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name shown by [`Pipeline::middleware_names`](crate::Pipeline::middleware_names)
    fn name(&self) -> &'static str;

    /// Handle a request, delegating to `next` for the rest of the chain
    async fn handle(&self, request: HttpRequest, next: Next<'_>) -> PayBridgeResult<HttpResponse>;
}

/// Handle to the remainder of the chain
///
/// `Copy`, so a middleware can run the rest of the chain more than once.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    transport: &'a dyn Transport,
    middleware: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(transport: &'a dyn Transport, middleware: &'a [Arc<dyn Middleware>]) -> Self {
        Self {
            transport,
            middleware,
        }
    }

    /// Run the remaining middleware, then the transport
    pub async fn run(self, request: HttpRequest) -> PayBridgeResult<HttpResponse> {
        match self.middleware.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    transport: self.transport,
                    middleware: rest,
                };
                current.handle(request, next).await
            }
            None => self
                .transport
                .send(&request)
                .await
                .map_err(PayBridgeError::transport),
        }
    }

    /// Base URL of the underlying transport
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }
}

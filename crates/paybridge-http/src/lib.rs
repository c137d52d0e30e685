//! # paybridge-http
//!
//! Authenticated HTTP request pipeline for the PayBridge API.
//!
//! A request passes through an ordered list of middleware before reaching
//! the [`Transport`]:
//!
//! ```text
//! caller -> auth -> retry -> logging -> transport -> classify
//! ```
//!
//! - [`AuthMiddleware`] injects the bearer token from a [`TokenSource`]
//! - [`RetryMiddleware`] retries transient failures with exponential backoff
//! - [`LoggingMiddleware`] records sanitized requests and responses
//! - [`classify`] maps the raw response to a result or a typed error
//!
//! [`RateLimiter`] is a separate gate callers consult before sending.

pub mod middleware;
pub mod pipeline;
pub mod rate_limiter;
pub mod request;
pub mod response;
pub mod transport;

pub use middleware::{
    AuthMiddleware, LogLevel, LogSink, LoggingMiddleware, Middleware, Next, RetryHook, RetryMiddleware,
    RetryPolicy, StaticToken, TokenSource, TracingSink,
};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use rate_limiter::{RateLimiter, SharedRateLimiter};
pub use request::{HttpRequest, HttpResponse, Method};
pub use response::{classify, error_message, ApiResponse, Pagination};
pub use transport::{ReqwestTransport, Transport, TransportConfig};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::MockTransport;

// Re-export for callers that attach cancellation
pub use tokio_util::sync::CancellationToken;

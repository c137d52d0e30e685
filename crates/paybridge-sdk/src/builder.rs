//! Builder for PayBridgeClient
//!
//! Everything the client talks to can be swapped out here: the transport,
//! the cache, the clock, the log sink and the rate limiter. Anything left
//! unset gets the production default.

use crate::client::PayBridgeClient;
use crate::config::ClientConfig;
use paybridge_auth::{Authenticator, Credentials, TokenStore};
use paybridge_http::{
    LogSink, Pipeline, RateLimiter, ReqwestTransport, RetryHook, SharedRateLimiter, TokenSource, TracingSink,
    Transport,
};
use paybridge_types::{Cache, Clock, FileCache, PayBridgeError, PayBridgeResult, RateLimitConfig, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Rate-limit key used when none is set
pub const DEFAULT_RATE_LIMIT_KEY: &str = "default";

/// Builder for configuring and creating a [`PayBridgeClient`]
///
/// # Example
///
/// ```no_run
/// use paybridge_sdk::prelude::*;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), PayBridgeError> {
/// let client = PayBridgeClient::builder()
///     .with_base_url("https://sandbox.paybridge.com/v1")
///     .with_credentials(Credentials::new("ops@example.com", "secret"))
///     .with_timeout(Duration::from_secs(10))
///     .with_debug(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct PayBridgeClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn Cache>>,
    clock: Option<Arc<dyn Clock>>,
    log_sink: Option<Arc<dyn LogSink>>,
    rate_limiter: Option<SharedRateLimiter>,
    rate_limit_key: Option<String>,
    retry_hook: Option<RetryHook>,
}

impl std::fmt::Debug for PayBridgeClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayBridgeClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("custom_cache", &self.cache.is_some())
            .field("custom_clock", &self.clock.is_some())
            .field("rate_limiter", &self.rate_limiter.is_some())
            .finish()
    }
}

impl PayBridgeClientBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry_base_delay = delay;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.custom_headers.insert(name.into(), value.into());
        self
    }

    /// Send requests through a custom transport instead of reqwest
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Store tokens and rate-limit windows in a custom cache
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Where debug request logs go (default: `tracing`)
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Limit requests per window, tracked in the client's cache
    pub fn with_rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.config.rate_limit = Some(limit);
        self
    }

    /// Gate every request through an existing rate limiter
    pub fn with_rate_limiter(mut self, limiter: SharedRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Identifier whose window the requests count against
    pub fn with_rate_limit_key(mut self, key: impl Into<String>) -> Self {
        self.rate_limit_key = Some(key.into());
        self
    }

    /// Called before each retry with the attempt number, delay and reason
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(u32, Duration, &str) + Send + Sync + 'static,
    {
        self.retry_hook = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validate the configuration and assemble the client
    pub fn build(self) -> PayBridgeResult<PayBridgeClient> {
        self.config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let transport = ReqwestTransport::new(self.config.transport_config()).map_err(|e| {
                    PayBridgeError::Configuration(format!("failed to create HTTP client: {}", e))
                })?;
                Arc::new(transport)
            }
        };

        let cache: Arc<dyn Cache> = match self.cache {
            Some(cache) => cache,
            None => {
                let dir = self.config.cache_dir.clone().unwrap_or_else(FileCache::default_dir);
                debug!(dir = %dir.display(), "Using file cache");
                Arc::new(FileCache::new(dir)?)
            }
        };

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sink: Arc<dyn LogSink> = self.log_sink.unwrap_or_else(|| Arc::new(TracingSink));
        let retry = self.config.retry_policy();

        // The token calls go through retry and logging only
        let auth_pipeline = Pipeline::builder(transport.clone())
            .with_retry(retry.clone(), self.retry_hook.clone())
            .with_logging(sink.clone(), self.config.debug)
            .build();
        let store = Arc::new(TokenStore::with_clock(cache.clone(), clock.clone(), self.config.cache_ttl));
        let authenticator = Authenticator::new(auth_pipeline, store, self.config.credentials.clone());

        let tokens: Arc<dyn TokenSource> = Arc::new(authenticator.clone());
        let pipeline = Pipeline::builder(transport)
            .with_auth(tokens)
            .with_retry(retry, self.retry_hook)
            .with_logging(sink, self.config.debug)
            .build();

        let rate_limiter = match (self.rate_limiter, self.config.rate_limit) {
            (Some(limiter), _) => Some(limiter),
            (None, Some(limit)) => Some(Arc::new(RateLimiter::with_clock(limit, cache, clock))),
            (None, None) => None,
        };
        let rate_limit_key = self
            .rate_limit_key
            .unwrap_or_else(|| DEFAULT_RATE_LIMIT_KEY.to_string());

        info!(base_url = %pipeline.base_url(), "Created PayBridge client");

        Ok(PayBridgeClient::from_parts(
            self.config,
            pipeline,
            authenticator,
            rate_limiter,
            rate_limit_key,
        ))
    }
}

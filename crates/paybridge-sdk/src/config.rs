//! Client configuration
//!
//! Every option has a default, so `ClientConfig::default()` points at the
//! production API with the standard retry budget. Settings can also be read
//! from `PAYBRIDGE_*` environment variables with [`ClientConfig::from_env`].

use paybridge_auth::{Credentials, EMAIL_ENV, PASSWORD_ENV};
use paybridge_http::transport::DEFAULT_TIMEOUT;
use paybridge_http::{RetryPolicy, TransportConfig};
use paybridge_types::{PayBridgeError, RateLimitConfig};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://api.paybridge.com/v1";

/// Extra attempts after the first failure
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// First backoff delay; doubles per attempt
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

pub const BASE_URL_ENV: &str = "PAYBRIDGE_BASE_URL";
pub const TIMEOUT_ENV: &str = "PAYBRIDGE_TIMEOUT";
pub const RETRY_ATTEMPTS_ENV: &str = "PAYBRIDGE_RETRY_ATTEMPTS";
pub const RETRY_DELAY_ENV: &str = "PAYBRIDGE_RETRY_DELAY_MS";
pub const CACHE_TTL_ENV: &str = "PAYBRIDGE_CACHE_TTL";
pub const CACHE_DIR_ENV: &str = "PAYBRIDGE_CACHE_DIR";
pub const VERIFY_SSL_ENV: &str = "PAYBRIDGE_VERIFY_SSL";
pub const DEBUG_ENV: &str = "PAYBRIDGE_DEBUG";
pub const USER_AGENT_ENV: &str = "PAYBRIDGE_USER_AGENT";

/// Upper bound on the retry budget
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Base URL must not be empty")]
    EmptyBaseUrl,

    #[error("Invalid base URL: {url} (expected http:// or https://)")]
    InvalidBaseUrl { url: String },

    #[error("Timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Too many retry attempts: {attempts} (max {max})")]
    TooManyRetries { attempts: u32, max: u32 },

    #[error("Invalid header name: {name:?}")]
    InvalidHeader { name: String },

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Rate limit must allow at least one request per window")]
    ZeroRateLimit,
}

impl From<ConfigError> for PayBridgeError {
    fn from(err: ConfigError) -> Self {
        PayBridgeError::Configuration(err.to_string())
    }
}

/// Settings for a [`PayBridgeClient`](crate::PayBridgeClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Extra attempts for retryable failures
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    /// How long the token cache entry lives; `None` follows the token's expiry
    pub cache_ttl: Option<Duration>,
    /// Directory of the file cache; `None` uses the system temp directory
    pub cache_dir: Option<PathBuf>,
    pub verify_ssl: bool,
    /// Log every request and response (sanitized)
    pub debug: bool,
    pub custom_headers: BTreeMap<String, String>,
    pub user_agent: Option<String>,
    pub credentials: Option<Credentials>,
    /// Client-side request gate; off when `None`
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            cache_ttl: None,
            cache_dir: None,
            verify_ssl: true,
            debug: false,
            custom_headers: BTreeMap::new(),
            user_agent: None,
            credentials: None,
            rate_limit: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Read settings from the environment
    ///
    /// Unset variables keep their defaults. Credentials are picked up when
    /// both `PAYBRIDGE_EMAIL` and `PAYBRIDGE_PASSWORD` are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(BASE_URL_ENV) {
            config.base_url = url;
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            config.timeout = Duration::from_secs(parse_env(TIMEOUT_ENV, &raw)?);
        }
        if let Some(raw) = lookup(RETRY_ATTEMPTS_ENV) {
            config.retry_attempts = parse_env(RETRY_ATTEMPTS_ENV, &raw)?;
        }
        if let Some(raw) = lookup(RETRY_DELAY_ENV) {
            config.retry_base_delay = Duration::from_millis(parse_env(RETRY_DELAY_ENV, &raw)?);
        }
        if let Some(raw) = lookup(CACHE_TTL_ENV) {
            config.cache_ttl = Some(Duration::from_secs(parse_env(CACHE_TTL_ENV, &raw)?));
        }
        if let Some(dir) = lookup(CACHE_DIR_ENV) {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(VERIFY_SSL_ENV) {
            config.verify_ssl = parse_flag(VERIFY_SSL_ENV, &raw)?;
        }
        if let Some(raw) = lookup(DEBUG_ENV) {
            config.debug = parse_flag(DEBUG_ENV, &raw)?;
        }
        if let Some(agent) = lookup(USER_AGENT_ENV) {
            config.user_agent = Some(agent);
        }
        if let (Some(email), Some(password)) = (lookup(EMAIL_ENV), lookup(PASSWORD_ENV)) {
            config.credentials = Some(Credentials::new(email, password));
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Turning this off accepts any certificate. Only for local test servers.
    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// Check the configuration for errors
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
            });
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        if self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::TooManyRetries {
                attempts: self.retry_attempts,
                max: MAX_RETRY_ATTEMPTS,
            });
        }

        for name in self.custom_headers.keys() {
            if !is_valid_header_name(name) {
                return Err(ConfigError::InvalidHeader { name: name.clone() });
            }
        }

        if matches!(self.rate_limit, Some(limit) if limit.max_requests == 0) {
            return Err(ConfigError::ZeroRateLimit);
        }

        Ok(())
    }

    /// Retry settings for the pipeline
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.retry_attempts)
            .with_base_delay(self.retry_base_delay)
    }

    /// Settings for the default reqwest transport
    pub fn transport_config(&self) -> TransportConfig {
        let mut transport = TransportConfig::new(self.base_url.trim_end_matches('/'))
            .with_timeout(self.timeout)
            .with_verify_ssl(self.verify_ssl);
        if let Some(agent) = &self.user_agent {
            transport = transport.with_user_agent(agent.clone());
        }
        for (name, value) in &self.custom_headers {
            transport = transport.with_header(name.clone(), value.clone());
        }
        transport
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: raw.to_string(),
    })
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name,
            value: raw.to_string(),
        }),
    }
}

/// RFC 7230 token characters
fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

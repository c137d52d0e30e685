//! Error types for the PayBridge SDK

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::cache::CacheError;
use crate::money::MoneyError;

/// Field name → validation messages, as returned in `errors` bodies
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Failures below HTTP: nothing came back from the server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// DNS, TCP or TLS failure
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No response within the request timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Response started but the body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Request could not be built (bad URL, bad header value)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Caller cancelled the request
    #[error("request cancelled")]
    Cancelled,
}

/// Main error type for PayBridge operations
#[derive(Error, Debug)]
pub enum PayBridgeError {
    // === Authentication ===
    /// 401, failed login, or refresh and login both exhausted
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        status: Option<u16>,
    },

    // === Request Errors ===
    /// 422 with per-field messages
    #[error("Validation failed: {message}")]
    Validation { message: String, errors: FieldErrors },

    /// 429 from the server or rejection by the local rate limiter
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        /// Seconds to wait before retrying
        retry_after: Option<u64>,
        limit: Option<u32>,
        remaining: Option<u32>,
        reset_at: Option<DateTime<Utc>>,
    },

    /// Transport failure, or retries exhausted
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Status of the last response when retries ran out on an HTTP error
        status: Option<u16>,
        /// Total attempts made (1 when no retry happened)
        attempts: u32,
        #[source]
        source: Option<TransportError>,
        /// Error the last response would have produced on its own
        last_error: Option<Box<PayBridgeError>>,
    },

    /// Any other non-2xx response, or an unparsable body
    #[error("API error ({status}): {message}")]
    Api {
        message: String,
        status: u16,
        /// Provider error code (`error_code` in the body)
        error_code: Option<String>,
        errors: FieldErrors,
    },

    // === Local Errors ===
    /// Invalid monetary amount
    #[error("Invalid amount: {0}")]
    Money(#[from] MoneyError),

    /// Token or rate-limit cache failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,
}

impl PayBridgeError {
    /// Authentication error without an HTTP status
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            status: None,
        }
    }

    /// Network error wrapping a single transport failure
    pub fn transport(source: TransportError) -> Self {
        if source == TransportError::Cancelled {
            return Self::Cancelled;
        }
        Self::Network {
            message: source.to_string(),
            status: None,
            attempts: 1,
            source: Some(source),
            last_error: None,
        }
    }

    /// Error carried by the final response when retries ran out on an HTTP status
    pub fn last_error(&self) -> Option<&PayBridgeError> {
        match self {
            Self::Network { last_error, .. } => last_error.as_deref(),
            _ => None,
        }
    }

    /// Fatal error for a body that is not the JSON the API promised
    pub fn invalid_response(status: u16) -> Self {
        Self::Api {
            message: "invalid response format".to_string(),
            status,
            error_code: None,
            errors: FieldErrors::new(),
        }
    }

    /// HTTP status associated with this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => *status,
            Self::Validation { .. } => Some(422),
            Self::Network { status, .. } => *status,
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if this is a transport-level failure (nothing came back)
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Network { source: Some(_), status: None, .. })
    }

    /// Returns true if retrying the same request later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::RateLimited { .. })
            || matches!(self, Self::Api { status, .. } if matches!(status, 408 | 500 | 502 | 503 | 504))
    }

    /// Returns suggested retry delay, if applicable
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            Self::Network {
                last_error: Some(last),
                ..
            } => last.retry_after(),
            _ => None,
        }
    }

    /// Returns true if the caller should log in again
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns true for a rate limit error, or retries that ran out on a 429
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Network {
                last_error: Some(last),
                ..
            } => last.is_rate_limit(),
            _ => false,
        }
    }

    /// Per-field messages for validation and API errors
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { errors, .. } => Some(errors),
            Self::Api { errors, .. } if !errors.is_empty() => Some(errors),
            Self::Network {
                last_error: Some(last),
                ..
            } => last.field_errors(),
            _ => None,
        }
    }

    /// Stable name of the error kind, used in structured logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "AuthenticationError",
            Self::Validation { .. } => "ValidationError",
            Self::RateLimited { .. } => "RateLimitError",
            Self::Network { .. } => "NetworkError",
            Self::Api { .. } => "ApiError",
            Self::Money(_) => "MoneyError",
            Self::Cache(_) => "CacheError",
            Self::Configuration(_) => "ConfigurationError",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Provider error code, if the server sent one
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Api { error_code, .. } => error_code.as_deref(),
            Self::Network {
                last_error: Some(last),
                ..
            } => last.error_code(),
            _ => None,
        }
    }
}

/// Result type alias for PayBridge operations
pub type PayBridgeResult<T> = Result<T, PayBridgeError>;

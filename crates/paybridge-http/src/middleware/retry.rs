//! Retry with exponential backoff

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use paybridge_types::{PayBridgeError, PayBridgeResult, TransportError};
use tracing::{debug, warn};

use super::{Middleware, Next};
use crate::request::{HttpRequest, HttpResponse};
use crate::response::classify;

/// Callback invoked before each backoff sleep: `(retry number, delay, reason)`
pub type RetryHook = Arc<dyn Fn(u32, Duration, &str) + Send + Sync>;

/// Which failures are retried and how long to wait between attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each following one
    pub base_delay: Duration,
    /// Upper bound of the random delay added to every backoff
    pub max_jitter: Duration,
    /// HTTP statuses worth another attempt
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(100),
            retry_statuses: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    pub fn with_retry_statuses(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.retry_statuses = statuses.into();
        self
    }

    /// Never retry
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Backoff before retry number `attempt + 1`, without jitter
    ///
    /// `attempt` is zero-based: the first retry waits `base_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Random extra delay in `0..=max_jitter`
    pub fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::random::<u64>() % (max_ms + 1))
    }

    /// Backoff with jitter applied
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        self.delay_for_attempt(attempt) + self.jitter()
    }
}

/// What one attempt produced
enum Attempt {
    Done(PayBridgeResult<HttpResponse>),
    Retry(Failure),
}

/// A retryable failure
enum Failure {
    Status(HttpResponse),
    Transport(TransportError),
}

impl Attempt {
    fn from_result(result: PayBridgeResult<HttpResponse>, policy: &RetryPolicy) -> Self {
        match result {
            Ok(response) if policy.should_retry_status(response.status) => {
                Self::Retry(Failure::Status(response))
            }
            Err(PayBridgeError::Network {
                source: Some(source),
                status: None,
                ..
            }) if source != TransportError::Cancelled => Self::Retry(Failure::Transport(source)),
            other => Self::Done(other),
        }
    }
}

impl Failure {
    fn reason(&self) -> String {
        match self {
            Self::Status(response) => format!("HTTP {}", response.status),
            Self::Transport(e) => e.to_string(),
        }
    }

    fn into_error(self, attempts: u32) -> PayBridgeError {
        match self {
            Self::Status(response) => {
                let last_error = classify(&response).err();
                let mut message = format!(
                    "request failed with HTTP {} after {} attempts",
                    response.status, attempts
                );
                if let Some(last) = &last_error {
                    message.push_str(&format!(": {}", last));
                }
                PayBridgeError::Network {
                    message,
                    status: Some(response.status),
                    attempts,
                    source: None,
                    last_error: last_error.map(Box::new),
                }
            }
            Self::Transport(source) => PayBridgeError::Network {
                message: format!("{} after {} attempts", source, attempts),
                status: None,
                attempts,
                source: Some(source),
                last_error: None,
            },
        }
    }
}

/// Re-runs the rest of the chain on retryable statuses and transport failures
///
/// Anything else (including cancellation) returns immediately. When retries
/// run out the last failure comes back as [`PayBridgeError::Network`], with
/// the error the final response maps to kept in `last_error`.
pub struct RetryMiddleware {
    policy: RetryPolicy,
    on_retry: Option<RetryHook>,
}

impl RetryMiddleware {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            on_retry: None,
        }
    }

    /// Observe every retry
    pub fn with_hook(mut self, hook: RetryHook) -> Self {
        self.on_retry = Some(hook);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn backoff(&self, request: &HttpRequest, delay: Duration) -> PayBridgeResult<()> {
        match &request.cancellation {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(PayBridgeError::Cancelled),
                    _ = tokio::time::sleep(delay) => Ok(()),
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn handle(&self, request: HttpRequest, next: Next<'_>) -> PayBridgeResult<HttpResponse> {
        let mut attempt: u32 = 0;

        loop {
            let failure = match Attempt::from_result(next.run(request.clone()).await, &self.policy) {
                Attempt::Done(result) => return result,
                Attempt::Retry(failure) => failure,
            };
            let reason = failure.reason();

            if attempt >= self.policy.max_retries {
                warn!(
                    path = %request.path,
                    attempts = attempt + 1,
                    reason = %reason,
                    "Retries exhausted"
                );
                return Err(failure.into_error(attempt + 1));
            }

            let delay = self.policy.delay_with_jitter(attempt);
            attempt += 1;
            debug!(
                path = %request.path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "Retrying request"
            );
            if let Some(hook) = &self.on_retry {
                hook(attempt, delay, &reason);
            }

            self.backoff(&request, delay).await?;
        }
    }
}

//! Structured request/response logging

use std::sync::Arc;

use async_trait::async_trait;
use paybridge_types::PayBridgeResult;
use serde_json::{json, Value};
use tokio::time::Instant;

use super::sanitize::{sanitize_body, sanitize_headers, sanitize_json};
use super::{Middleware, Next};
use crate::request::{HttpRequest, HttpResponse};

/// Response bodies larger than this are logged by size only
pub const MAX_LOGGED_BODY_BYTES: usize = 10_000;

/// Severity passed to a [`LogSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Destination for pipeline log records
///
/// `context` is already sanitized.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, context: &Value);
}

/// Forwards records to `tracing` under the `paybridge::http` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str, context: &Value) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "paybridge::http", context = %context, "{}", message),
            LogLevel::Info => tracing::info!(target: "paybridge::http", context = %context, "{}", message),
            LogLevel::Warn => tracing::warn!(target: "paybridge::http", context = %context, "{}", message),
            LogLevel::Error => tracing::error!(target: "paybridge::http", context = %context, "{}", message),
        }
    }
}

/// Logs every request, its response or error, and the elapsed time
///
/// Disabled unless debug logging is switched on, in which case it is a
/// pass-through.
pub struct LoggingMiddleware {
    sink: Arc<dyn LogSink>,
    enabled: bool,
}

impl LoggingMiddleware {
    pub fn new(sink: Arc<dyn LogSink>, enabled: bool) -> Self {
        Self { sink, enabled }
    }

    pub fn tracing(enabled: bool) -> Self {
        Self::new(Arc::new(TracingSink), enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn log_request(&self, request: &HttpRequest, url: &str) {
        let mut context = json!({
            "method": request.method.as_str(),
            "url": url,
            "headers": sanitize_headers(&request.headers),
        });
        if !request.query.is_empty() {
            context["query"] = json!(request.query);
        }
        if let Some(body) = &request.body {
            context["body"] = sanitize_json(body);
        }
        self.sink.log(LogLevel::Debug, "API Request", &context);
    }

    fn log_response(&self, response: &HttpResponse, duration_ms: u64) {
        let mut context = json!({
            "status": response.status,
            "headers": sanitize_headers(&response.headers),
            "duration_ms": duration_ms,
        });
        if response.body.len() > MAX_LOGGED_BODY_BYTES {
            context["body_size"] = json!(response.body.len());
        } else {
            context["body"] = sanitize_body(&response.body);
        }
        self.sink.log(LogLevel::Debug, "API Response", &context);
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(&self, request: HttpRequest, next: Next<'_>) -> PayBridgeResult<HttpResponse> {
        if !self.enabled {
            return next.run(request).await;
        }

        let url = request.url(next.base_url());
        self.log_request(&request, &url);

        let started = Instant::now();
        let result = next.run(request).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => self.log_response(response, duration_ms),
            Err(e) => {
                let context = json!({
                    "url": url,
                    "error_type": e.kind_name(),
                    "message": e.to_string(),
                    "duration_ms": duration_ms,
                });
                self.sink.log(LogLevel::Error, "API Error", &context);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use parking_lot::Mutex;
    use paybridge_types::TransportError;

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<(LogLevel, String, Value)>>,
    }

    impl LogSink for RecordingSink {
        fn log(&self, level: LogLevel, message: &str, context: &Value) {
            self.records
                .lock()
                .push((level, message.to_string(), context.clone()));
        }
    }

    fn setup(enabled: bool) -> (Arc<RecordingSink>, Vec<Arc<dyn Middleware>>) {
        let sink = Arc::new(RecordingSink::default());
        let middleware: Vec<Arc<dyn Middleware>> =
            vec![Arc::new(LoggingMiddleware::new(sink.clone(), enabled))];
        (sink, middleware)
    }

    #[tokio::test]
    async fn test_password_never_logged() {
        let transport = MockTransport::new("https://mock.test");
        transport.push_json(200, json!({"token": "jwt-value", "expires_in": 3600}));
        let (sink, middleware) = setup(true);

        let request = HttpRequest::post("/auth/token")
            .with_header("Authorization", "Bearer old")
            .with_json(json!({"email": "a@b.c", "password": "p"}));
        Next::new(&transport, &middleware).run(request).await.unwrap();

        let records = sink.records.lock();
        assert_eq!(records.len(), 2);

        let (level, message, context) = &records[0];
        assert_eq!(*level, LogLevel::Debug);
        assert_eq!(message, "API Request");
        assert_eq!(context["url"], "https://mock.test/auth/token");
        assert_eq!(context["body"]["password"], "[REDACTED]");
        assert_eq!(context["headers"]["Authorization"], "[REDACTED]");

        let (_, message, context) = &records[1];
        assert_eq!(message, "API Response");
        assert_eq!(context["status"], 200);
        assert_eq!(context["body"]["token"], "[REDACTED]");

        for (_, _, context) in records.iter() {
            let text = context.to_string();
            assert!(!text.contains("\"p\""));
            assert!(!text.contains("jwt-value"));
        }
    }

    #[tokio::test]
    async fn test_large_body_logged_by_size() {
        let transport = MockTransport::new("https://mock.test");
        let body = "x".repeat(MAX_LOGGED_BODY_BYTES + 1);
        transport.push_response(HttpResponse::new(200, body));
        let (sink, middleware) = setup(true);

        Next::new(&transport, &middleware)
            .run(HttpRequest::get("/export"))
            .await
            .unwrap();

        let records = sink.records.lock();
        let context = &records[1].2;
        assert_eq!(context["body_size"], MAX_LOGGED_BODY_BYTES + 1);
        assert!(context.get("body").is_none());
    }

    #[tokio::test]
    async fn test_error_logged_at_error_level() {
        let transport = MockTransport::new("https://mock.test");
        transport.push_error(TransportError::ConnectionFailed("refused".into()));
        let (sink, middleware) = setup(true);

        let result = Next::new(&transport, &middleware)
            .run(HttpRequest::get("/balances"))
            .await;
        assert!(result.is_err());

        let records = sink.records.lock();
        let (level, message, context) = &records[1];
        assert_eq!(*level, LogLevel::Error);
        assert_eq!(message, "API Error");
        assert_eq!(context["error_type"], "NetworkError");
    }

    #[tokio::test]
    async fn test_disabled_logs_nothing() {
        let transport = MockTransport::new("https://mock.test");
        transport.push_json(200, json!({}));
        let (sink, middleware) = setup(false);

        Next::new(&transport, &middleware)
            .run(HttpRequest::get("/x"))
            .await
            .unwrap();
        assert!(sink.records.lock().is_empty());
    }
}

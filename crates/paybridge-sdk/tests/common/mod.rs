//! Common test utilities and fixtures for integration tests
//!
//! Response bodies follow the shapes returned by the PayBridge sandbox.

#![allow(dead_code)]

use paybridge_http::{LogLevel, LogSink, MockTransport};
use paybridge_sdk::prelude::*;
use paybridge_types::MockClock;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "https://sandbox.paybridge.test/v1";

/// Fixed start time for clock-driven tests
pub const T0: i64 = 1_700_000_000;

pub const EMAIL: &str = "treasury@example.com";
pub const PASSWORD: &str = "correct-horse-battery";

/// Successful `POST /auth/token` body
pub fn login_response(token: &str) -> Value {
    json!({
        "token": token,
        "refresh_token": format!("{}-refresh", token),
        "expires_in": 3600,
        "token_type": "Bearer"
    })
}

/// Successful `POST /auth/refresh` body
pub fn refresh_response(token: &str) -> Value {
    json!({
        "access_token": token,
        "refresh_token": format!("{}-refresh", token),
        "expires_in": 3600
    })
}

/// One page of `GET /deposits`
pub fn deposit_page() -> Value {
    json!({
        "data": [
            {"id": "dep_1", "amount": "100.50", "currency": "BRL", "status": "completed"},
            {"id": "dep_2", "amount": "200.25", "currency": "BRL", "status": "completed"},
            {"id": "dep_3", "amount": "300.75", "currency": "BRL", "status": "pending"}
        ],
        "meta": {"current_page": 1, "per_page": 3, "total": 7, "total_pages": 3}
    })
}

pub fn mock_transport() -> Arc<MockTransport> {
    Arc::new(MockTransport::new(BASE_URL))
}

/// Client with credentials, a memory cache, a mock clock and no retries
pub struct Harness {
    pub client: PayBridgeClient,
    pub transport: Arc<MockTransport>,
    pub clock: MockClock,
    pub cache: Arc<MemoryCache>,
    pub logs: Arc<RecordingSink>,
}

pub fn harness() -> Harness {
    harness_with(|builder| builder)
}

/// Like [`harness`], with extra builder settings
pub fn harness_with<F>(configure: F) -> Harness
where
    F: FnOnce(PayBridgeClientBuilder) -> PayBridgeClientBuilder,
{
    let transport = mock_transport();
    let clock = MockClock::at_unix(T0);
    let cache = Arc::new(MemoryCache::new());
    let logs = Arc::new(RecordingSink::default());

    let builder = PayBridgeClient::builder()
        .with_base_url(BASE_URL)
        .with_credentials(Credentials::new(EMAIL, PASSWORD))
        .with_retry_attempts(0)
        .with_transport(transport.clone())
        .with_cache(cache.clone())
        .with_clock(Arc::new(clock.clone()))
        .with_log_sink(logs.clone());

    let client = configure(builder).build().expect("failed to build test client");

    Harness {
        client,
        transport,
        clock,
        cache,
        logs,
    }
}

/// Log sink that keeps every entry
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<(LogLevel, String, Value)>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<(LogLevel, String, Value)> {
        self.entries.lock().unwrap().clone()
    }

    /// Contexts of entries with the given message
    pub fn contexts(&self, message: &str) -> Vec<Value> {
        self.entries()
            .into_iter()
            .filter(|(_, m, _)| m == message)
            .map(|(_, _, context)| context)
            .collect()
    }

    /// Everything logged, as one string
    pub fn dump(&self) -> String {
        self.entries()
            .iter()
            .map(|(_, message, context)| format!("{} {}", message, context))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: LogLevel, message: &str, context: &Value) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string(), context.clone()));
    }
}

/// Route test logs through tracing-subscriber (`RUST_LOG=debug` to see them)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

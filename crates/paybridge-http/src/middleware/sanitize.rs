//! Redaction of secrets before anything reaches a log

use std::collections::BTreeMap;

use serde_json::Value;

/// Replacement for every redacted value
pub const REDACTED: &str = "[REDACTED]";

/// Headers never logged verbatim (compared case-insensitively)
pub const SENSITIVE_HEADERS: &[&str] = &["authorization", "api-key", "x-api-key", "cookie", "set-cookie"];

/// Body keys whose values are redacted when the key contains one of these
/// (case-insensitive substring match)
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "private_key",
    "card_number",
    "cvv",
];

pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

/// Copy of `headers` with sensitive values replaced
pub fn sanitize_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name) {
                REDACTED.to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

/// Copy of `value` with sensitive keys redacted at any depth
///
/// A sensitive key's whole value is replaced, even if it is an object.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let v = if is_sensitive_key(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        sanitize_json(v)
                    };
                    (key.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_json).collect()),
        other => other.clone(),
    }
}

/// Sanitize a raw body: JSON is redacted structurally, anything else is
/// passed through as a string
pub fn sanitize_body(body: &str) -> Value {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => sanitize_json(&json),
        Err(_) => Value::String(body.to_string()),
    }
}

//! Mapping raw HTTP responses to results and typed errors
//!
//! | status                  | result                          |
//! |-------------------------|---------------------------------|
//! | 2xx                     | [`ApiResponse`]                 |
//! | 401                     | [`PayBridgeError::Authentication`] |
//! | 422                     | [`PayBridgeError::Validation`]  |
//! | 429                     | [`PayBridgeError::RateLimited`] |
//! | anything else           | [`PayBridgeError::Api`]         |
//!
//! A body that is not valid JSON is always `Api("invalid response format")`.

use chrono::{DateTime, TimeZone, Utc};
use paybridge_types::{FieldErrors, PayBridgeError, PayBridgeResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::request::HttpResponse;

/// Paging metadata found under `meta` in collection responses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: Option<u64>,
    pub per_page: Option<u64>,
    pub total: Option<u64>,
    pub total_pages: Option<u64>,
    pub has_more: bool,
}

impl Pagination {
    /// Detect paging metadata
    ///
    /// Present only when `meta` carries a page count (`total_pages` or
    /// `last_page`) or a `has_more` flag.
    pub fn from_body(body: &Value) -> Option<Self> {
        let meta = body.get("meta")?.as_object()?;

        let total_pages = meta
            .get("total_pages")
            .or_else(|| meta.get("last_page"))
            .and_then(Value::as_u64);
        let has_more_flag = meta.get("has_more").and_then(Value::as_bool);
        if total_pages.is_none() && has_more_flag.is_none() {
            return None;
        }

        let current_page = meta
            .get("current_page")
            .or_else(|| meta.get("page"))
            .and_then(Value::as_u64);
        let has_more = has_more_flag.unwrap_or_else(|| match (current_page, total_pages) {
            (Some(page), Some(pages)) => page < pages,
            _ => false,
        });

        Some(Self {
            current_page,
            per_page: meta.get("per_page").and_then(Value::as_u64),
            total: meta.get("total").and_then(Value::as_u64),
            total_pages,
            has_more,
        })
    }
}

/// Successful response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub data: T,
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn is_paginated(&self) -> bool {
        self.pagination.is_some()
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

impl ApiResponse<Value> {
    /// Deserialize the body into `U`
    ///
    /// A body of the wrong shape is an invalid response.
    pub fn parse<U: DeserializeOwned>(self) -> PayBridgeResult<ApiResponse<U>> {
        let status = self.status;
        let data = serde_json::from_value(self.data).map_err(|_| PayBridgeError::invalid_response(status))?;
        Ok(ApiResponse {
            status,
            headers: self.headers,
            data,
            pagination: self.pagination,
        })
    }
}

/// Classify a response
pub fn classify(response: &HttpResponse) -> PayBridgeResult<ApiResponse<Value>> {
    let body = parse_body(response)?;

    if response.is_success() {
        let pagination = Pagination::from_body(&body);
        return Ok(ApiResponse {
            status: response.status,
            headers: response.headers.clone(),
            data: body,
            pagination,
        });
    }

    Err(error_for(response, &body))
}

fn parse_body(response: &HttpResponse) -> PayBridgeResult<Value> {
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body).map_err(|_| PayBridgeError::invalid_response(response.status))
}

fn error_for(response: &HttpResponse, body: &Value) -> PayBridgeError {
    let status = response.status;
    let message = error_message(body).unwrap_or_else(|| format!("HTTP {}", status));

    match status {
        401 => PayBridgeError::Authentication {
            message,
            status: Some(status),
        },
        422 => PayBridgeError::Validation {
            message,
            errors: field_errors(body),
        },
        429 => PayBridgeError::RateLimited {
            message,
            retry_after: body_u64(body, "retry_after")
                .or_else(|| header_u64(response, "retry-after")),
            limit: body_u64(body, "limit")
                .or_else(|| header_u64(response, "x-ratelimit-limit"))
                .map(clamp_u32),
            remaining: body_u64(body, "remaining")
                .or_else(|| header_u64(response, "x-ratelimit-remaining"))
                .map(clamp_u32),
            reset_at: body
                .get("reset_at")
                .and_then(parse_timestamp)
                .or_else(|| {
                    response
                        .header("x-ratelimit-reset")
                        .and_then(|v| parse_timestamp(&Value::String(v.to_string())))
                }),
        },
        _ => PayBridgeError::Api {
            message,
            status,
            error_code: error_code(body),
            errors: field_errors(body),
        },
    }
}

/// Server message of an error body: `message`, `error` (string), or `error.message`
pub fn error_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    match body.get("error") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => obj.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn error_code(body: &Value) -> Option<String> {
    match body.get("error_code").or_else(|| body.get("code"))? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `errors` as a field map; a bare string becomes a one-element list
pub fn field_errors(body: &Value) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let Some(map) = body.get("errors").and_then(Value::as_object) else {
        return errors;
    };
    for (field, value) in map {
        let messages = match value {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            other => vec![other.to_string()],
        };
        errors.insert(field.clone(), messages);
    }
    errors
}

fn body_u64(body: &Value, key: &str) -> Option<u64> {
    match body.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn header_u64(response: &HttpResponse, name: &str) -> Option<u64> {
    response.header(name)?.trim().parse().ok()
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Epoch seconds (number or numeric string) or RFC 3339
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(secs) => Utc.timestamp_opt(secs, 0).single(),
            Err(_) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        },
        _ => None,
    }
}

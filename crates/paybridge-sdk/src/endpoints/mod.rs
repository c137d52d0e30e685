//! Per-domain API endpoints
//!
//! Each group borrows the client and maps its calls onto the request
//! pipeline. Request bodies are validated when they are built, so a value
//! that reaches the network is already well-formed.

pub mod crypto;
pub mod deposits;
pub mod pix;
pub mod withdrawals;

pub use crypto::{CryptoEndpoints, CryptoOrder, CryptoQuoteRequest, TradeSide};
pub use deposits::{CreateDeposit, DepositEndpoints};
pub use pix::{CreatePixKey, PixEndpoints, PixKeyType, PixPayment, PixQrCode};
pub use withdrawals::{CreateWithdrawal, WithdrawalEndpoints};

use paybridge_http::HttpRequest;
use paybridge_types::{FieldErrors, IntoMoney, Money, PayBridgeError, PayBridgeResult};

/// Paging and filtering for list calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            query.push(("per_page", per_page.to_string()));
        }
        if let Some(status) = &self.status {
            query.push(("status", status.clone()));
        }
        query
    }
}

/// `GET path` with the list parameters as query
pub(crate) fn list_request(path: &str, params: &ListParams) -> HttpRequest {
    params
        .to_query()
        .into_iter()
        .fold(HttpRequest::get(path), |request, (name, value)| request.with_query(name, value))
}

/// Local validation failure on one field
pub(crate) fn invalid(field: &str, message: impl Into<String>) -> PayBridgeError {
    let message = message.into();
    let mut errors = FieldErrors::new();
    errors.insert(field.to_string(), vec![message.clone()]);
    PayBridgeError::Validation { message, errors }
}

/// Strictly positive amount
pub(crate) fn positive_amount(field: &str, value: impl IntoMoney) -> PayBridgeResult<Money> {
    let amount = Money::from_value(value)?;
    if !amount.is_positive() {
        return Err(invalid(field, format!("{} must be greater than zero", field)));
    }
    Ok(amount)
}

/// Three-letter currency code, uppercased
pub(crate) fn currency_code(field: &str, code: &str) -> PayBridgeResult<String> {
    let code = code.trim();
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(invalid(field, format!("{} must be a three-letter code", field)));
    }
    Ok(code.to_ascii_uppercase())
}

/// Identifier safe to place in a path segment
pub(crate) fn path_id<'a>(field: &str, id: &'a str) -> PayBridgeResult<&'a str> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
        return Err(invalid(field, format!("invalid {}", field)));
    }
    Ok(id)
}

#[cfg(test)]
pub(crate) fn mock_client() -> (crate::PayBridgeClient, std::sync::Arc<paybridge_http::MockTransport>) {
    use std::sync::Arc;

    let transport = Arc::new(paybridge_http::MockTransport::new("https://api.test/v1"));
    let client = crate::PayBridgeClient::builder()
        .with_transport(transport.clone())
        .with_cache(Arc::new(paybridge_types::MemoryCache::new()))
        .with_retry_attempts(0)
        .build()
        .expect("mock client");
    (client, transport)
}

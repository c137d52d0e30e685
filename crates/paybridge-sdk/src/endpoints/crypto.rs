//! Cryptocurrency endpoints
//!
//! Symbols are normalized to uppercase when a request is built, so `btc`
//! and `BTC` reach the API the same way.

use super::{invalid, list_request, path_id, positive_amount, ListParams};
use crate::client::PayBridgeClient;
use paybridge_http::ApiResponse;
use paybridge_types::{IntoMoney, Money, PayBridgeResult};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// Longest accepted asset symbol
const MAX_SYMBOL_LEN: usize = 10;

/// Direction of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Body of `POST /crypto/quote`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CryptoQuoteRequest {
    pub symbol: String,
    pub side: TradeSide,
    /// Fiat amount to spend (buy) or asset quantity to sell
    pub amount: Money,
}

impl CryptoQuoteRequest {
    pub fn new(symbol: &str, side: TradeSide, amount: impl IntoMoney) -> PayBridgeResult<Self> {
        Ok(Self {
            symbol: normalize_symbol(symbol)?,
            side,
            amount: positive_amount("amount", amount)?,
        })
    }
}

/// Body of `POST /crypto/buy` and `POST /crypto/sell`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CryptoOrder {
    pub symbol: String,
    pub amount: Money,
    /// Execute at a previously fetched quote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<String>,
    /// Reject the order if the price moves past this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_limit: Option<Money>,
}

impl CryptoOrder {
    pub fn new(symbol: &str, amount: impl IntoMoney) -> PayBridgeResult<Self> {
        Ok(Self {
            symbol: normalize_symbol(symbol)?,
            amount: positive_amount("amount", amount)?,
            quote_id: None,
            price_limit: None,
        })
    }

    pub fn with_quote(mut self, quote_id: impl Into<String>) -> Self {
        self.quote_id = Some(quote_id.into());
        self
    }

    pub fn with_price_limit(mut self, limit: impl IntoMoney) -> PayBridgeResult<Self> {
        self.price_limit = Some(positive_amount("price_limit", limit)?);
        Ok(self)
    }
}

/// Uppercase alphanumeric asset symbol
fn normalize_symbol(symbol: &str) -> PayBridgeResult<String> {
    let symbol = symbol.trim();
    if symbol.is_empty()
        || symbol.len() > MAX_SYMBOL_LEN
        || !symbol.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return Err(invalid("symbol", format!("invalid symbol: {:?}", symbol)));
    }
    Ok(symbol.to_ascii_uppercase())
}

/// Crypto endpoints
pub struct CryptoEndpoints<'a> {
    client: &'a PayBridgeClient,
}

impl<'a> CryptoEndpoints<'a> {
    pub fn new(client: &'a PayBridgeClient) -> Self {
        Self { client }
    }

    /// Price a trade without executing it
    #[instrument(skip(self))]
    pub async fn quote(&self, request: &CryptoQuoteRequest) -> PayBridgeResult<ApiResponse<Value>> {
        debug!("Requesting {} quote for {} {}", request.side, request.amount, request.symbol);
        self.client.post("/crypto/quote", request).await
    }

    #[instrument(skip(self))]
    pub async fn buy(&self, order: &CryptoOrder) -> PayBridgeResult<ApiResponse<Value>> {
        debug!("Buying {} {}", order.amount, order.symbol);
        self.client.post("/crypto/buy", order).await
    }

    #[instrument(skip(self))]
    pub async fn sell(&self, order: &CryptoOrder) -> PayBridgeResult<ApiResponse<Value>> {
        debug!("Selling {} {}", order.amount, order.symbol);
        self.client.post("/crypto/sell", order).await
    }

    /// Holdings per asset
    #[instrument(skip(self))]
    pub async fn balances(&self) -> PayBridgeResult<ApiResponse<Value>> {
        self.client.get("/crypto/balances", &[]).await
    }

    /// Trade history, optionally for one symbol
    #[instrument(skip(self))]
    pub async fn transactions(&self, symbol: Option<&str>, params: &ListParams) -> PayBridgeResult<ApiResponse<Value>> {
        let mut request = list_request("/crypto/transactions", params);
        if let Some(symbol) = symbol {
            request = request.with_query("symbol", normalize_symbol(symbol)?);
        }
        self.client.request(request).await
    }

    /// One trade by id
    #[instrument(skip(self))]
    pub async fn transaction(&self, id: &str) -> PayBridgeResult<ApiResponse<Value>> {
        let id = path_id("id", id)?;
        self.client.get(&format!("/crypto/transactions/{}", id), &[]).await
    }
}

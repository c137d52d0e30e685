//! Re-exports for convenience
//!
//! Import everything you need with:
//! ```
//! use paybridge_sdk::prelude::*;
//! ```

// Client
pub use crate::builder::PayBridgeClientBuilder;
pub use crate::client::PayBridgeClient;
pub use crate::config::{ClientConfig, ConfigError};

// Endpoint requests
pub use crate::endpoints::{
    CreateDeposit, CreatePixKey, CreateWithdrawal, CryptoOrder, CryptoQuoteRequest, ListParams, PixKeyType,
    PixPayment, PixQrCode, TradeSide,
};

// Authentication
pub use paybridge_auth::{Credentials, TokenState};

// Pipeline
pub use paybridge_http::{
    ApiResponse, CancellationToken, HttpRequest, LogLevel, LogSink, Pagination, RateLimiter, RetryPolicy, Transport,
};

// Shared types
pub use paybridge_types::{
    Cache, FileCache, IntoMoney, MemoryCache, Money, MoneyError, PayBridgeError, PayBridgeResult, RateLimitConfig,
};

// Decimal for amounts
pub use rust_decimal::Decimal;

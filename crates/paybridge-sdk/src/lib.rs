//! High-level client for the PayBridge API
//!
//! This crate ties the pieces together: configuration, token handling, the
//! request pipeline and thin endpoint groups for deposits, withdrawals,
//! crypto and PIX.
//!
//! # Quick Start
//!
//! ```no_run
//! use paybridge_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PayBridgeError> {
//!     let client = PayBridgeClient::from_env()?;
//!     client.login().await?;
//!
//!     let payment = PixPayment::new("ops@example.com", "25.00")?;
//!     let sent = client.pix().send_payment(&payment).await?;
//!     println!("payment {}", sent.data["id"]);
//!
//!     let balances = client.crypto().balances().await?;
//!     println!("{}", balances.data);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Token lifecycle**: login, proactive refresh, fallback to login, persisted in a cache
//! - **Retry**: exponential backoff with jitter on transient failures
//! - **Debug logging**: request and response logs with secrets redacted
//! - **Exact money**: every amount is a decimal [`Money`], sent as a string
//!
//! # Environment
//!
//! [`ClientConfig::from_env`] reads `PAYBRIDGE_BASE_URL`, `PAYBRIDGE_TIMEOUT`,
//! `PAYBRIDGE_RETRY_ATTEMPTS`, `PAYBRIDGE_RETRY_DELAY_MS`, `PAYBRIDGE_CACHE_TTL`,
//! `PAYBRIDGE_CACHE_DIR`, `PAYBRIDGE_VERIFY_SSL`, `PAYBRIDGE_DEBUG`,
//! `PAYBRIDGE_USER_AGENT`, `PAYBRIDGE_EMAIL` and `PAYBRIDGE_PASSWORD`.

pub mod builder;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod prelude;

// Re-export main types
pub use builder::PayBridgeClientBuilder;
pub use client::PayBridgeClient;
pub use config::{ClientConfig, ConfigError};

// Re-export commonly used types from dependencies
pub use paybridge_auth::{Authenticator, Credentials, TokenState, TokenStore};
pub use paybridge_http::{ApiResponse, Pagination, Pipeline};
pub use paybridge_types::{Money, PayBridgeError, PayBridgeResult};

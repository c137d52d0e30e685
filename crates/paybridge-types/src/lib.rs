//! Shared types for the PayBridge SDK
//!
//! This crate provides the core type definitions used across the PayBridge
//! crates. It has no networking dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`Money`] - Exact decimal amount for every monetary field
//! - [`PayBridgeError`] - Error taxonomy shared by the pipeline and the facade
//! - [`Cache`], [`MemoryCache`], [`FileCache`] - Pluggable key-value storage
//! - [`Clock`], [`SystemClock`] - Injectable time source
//! - [`RateLimitWindow`], [`RateLimitConfig`] - Client-side rate limit math

pub mod cache;
pub mod clock;
pub mod error;
pub mod money;
pub mod rate_limit;

// Re-export commonly used types
pub use cache::{Cache, CacheError, CacheResult, FileCache, MemoryCache};
pub use clock::{Clock, SystemClock};
pub use error::{FieldErrors, PayBridgeError, PayBridgeResult, TransportError};
pub use money::{IntoMoney, Money, MoneyError, MoneyResult};
pub use rate_limit::{RateLimitConfig, RateLimitWindow};

#[cfg(any(test, feature = "test-utils"))]
pub use clock::MockClock;

// Re-export rust_decimal for users
pub use rust_decimal::Decimal;

//! Authentication for the PayBridge API
//!
//! - [`TokenStore`] holds the access token, its refresh token and expiry,
//!   persisted through an injected cache
//! - [`Authenticator`] logs in, refreshes ahead of expiry (falling back to a
//!   fresh login when refresh fails) and logs out
//! - [`Credentials`] keeps the password in a zeroizing secret
//!
//! # Trust boundary
//!
//! When the server does not say how long a token lives, its expiry is read
//! from the JWT `exp` claim without verifying the signature. That value only
//! decides when to refresh; the server remains the authority on validity.
//!
//! # Environment Variables
//!
//! - `PAYBRIDGE_EMAIL` - Account email
//! - `PAYBRIDGE_PASSWORD` - Account password

mod authenticator;
mod credentials;
pub mod jwt;
mod token_store;

pub use authenticator::{Authenticator, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
pub use credentials::{Credentials, EMAIL_ENV, PASSWORD_ENV};
pub use token_store::{
    TokenRecord, TokenState, TokenStore, DEFAULT_LIFETIME_SECS, EXPIRY_MARGIN_SECS, REFRESH_THRESHOLD_SECS,
    TOKEN_CACHE_KEY,
};

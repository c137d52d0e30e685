//! Login credentials
//!
//! The password is held in a [`SecretString`], which zeroizes on drop and
//! never shows up in `Debug` output.

use paybridge_types::{PayBridgeError, PayBridgeResult};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

/// Environment variable holding the account email
pub const EMAIL_ENV: &str = "PAYBRIDGE_EMAIL";

/// Environment variable holding the account password
pub const PASSWORD_ENV: &str = "PAYBRIDGE_PASSWORD";

/// Email and password for `POST /auth/token`
pub struct Credentials {
    email: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Read `PAYBRIDGE_EMAIL` and `PAYBRIDGE_PASSWORD`
    pub fn from_env() -> PayBridgeResult<Self> {
        let email = std::env::var(EMAIL_ENV)
            .map_err(|_| PayBridgeError::Configuration(format!("environment variable not set: {}", EMAIL_ENV)))?;
        let password = std::env::var(PASSWORD_ENV).map_err(|_| {
            PayBridgeError::Configuration(format!("environment variable not set: {}", PASSWORD_ENV))
        })?;
        Ok(Self::new(email, password))
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Request body of the login call
    pub(crate) fn login_body(&self) -> Value {
        json!({
            "email": self.email,
            "password": self.password.expose_secret(),
        })
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            email: self.email.clone(),
            password: SecretString::from(self.password.expose_secret().to_string()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

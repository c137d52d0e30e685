//! Access token persistence
//!
//! The whole [`TokenRecord`] is swapped at once under a single lock, so a
//! reader never sees a token paired with another token's expiry. Every change
//! is written through to the cache while the lock is held, and a new store
//! picks up whatever an earlier process left there.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use paybridge_types::{Cache, CacheError, Clock, PayBridgeResult, SystemClock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::jwt;

/// Cache key of the persisted record
pub const TOKEN_CACHE_KEY: &str = "paybridge.auth.token";

/// A token counts as expired this long before its real expiry
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Refresh once less than this much lifetime is left
pub const REFRESH_THRESHOLD_SECS: i64 = 300;

/// Lifetime assumed when neither the server nor the token says
pub const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// Stored credentials of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: Option<i64>,
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenState {
    #[default]
    NoToken,
    Valid,
    /// Usable, but due for a refresh
    ExpiringSoon,
    Expired,
}

/// Thread-safe token holder backed by a [`Cache`]
pub struct TokenStore {
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    ttl: Option<Duration>,
    record: RwLock<Option<TokenRecord>>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("state", &self.state())
            .field("expires_at", &self.expires_at())
            .finish()
    }
}

impl TokenStore {
    /// Create a store and load any persisted record
    ///
    /// `ttl` bounds how long the cache keeps the record; `None` keeps it
    /// until the token's own expiry.
    pub fn new(cache: Arc<dyn Cache>, ttl: Option<Duration>) -> Self {
        Self::with_clock(cache, Arc::new(SystemClock), ttl)
    }

    pub fn with_clock(cache: Arc<dyn Cache>, clock: Arc<dyn Clock>, ttl: Option<Duration>) -> Self {
        let record = load(cache.as_ref());
        if record.is_some() {
            debug!("Restored persisted access token");
        }
        Self {
            cache,
            clock,
            ttl,
            record: RwLock::new(record),
        }
    }

    /// Store a new token
    ///
    /// Expiry comes from `expires_in` when given, else from the token's `exp`
    /// claim, else one hour from now.
    pub fn set_token(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
    ) -> PayBridgeResult<()> {
        let access_token = access_token.into();
        let now = self.clock.unix_seconds();
        let expires_at = match expires_in {
            Some(secs) => now.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX)),
            None => jwt::expiry(&access_token).unwrap_or(now + DEFAULT_LIFETIME_SECS),
        };

        let record = TokenRecord {
            access_token,
            refresh_token,
            expires_at: Some(expires_at),
        };

        let mut guard = self.record.write();
        let result = self.persist(&record, now);
        *guard = Some(record);
        result
    }

    /// Access token, unless it has expired
    ///
    /// An expired token is cleared. Never refreshes.
    pub fn get_token(&self) -> Option<String> {
        {
            let guard = self.record.read();
            match guard.as_ref() {
                None => return None,
                Some(record) if !self.record_expired(record) => {
                    return Some(record.access_token.clone());
                }
                Some(_) => {}
            }
        }

        let mut guard = self.record.write();
        // Someone may have stored a fresh token in between
        if let Some(record) = guard.as_ref() {
            if !self.record_expired(record) {
                return Some(record.access_token.clone());
            }
        }
        *guard = None;
        if let Err(e) = self.cache.delete(TOKEN_CACHE_KEY) {
            warn!(error = %e, "Failed to remove expired token from cache");
        }
        debug!("Access token expired, cleared");
        None
    }

    /// True iff a non-expired access token is held
    pub fn has_token(&self) -> bool {
        matches!(self.state(), TokenState::Valid | TokenState::ExpiringSoon)
    }

    /// True once within the safety margin of expiry, or when there is no token
    pub fn is_expired(&self) -> bool {
        match self.record.read().as_ref() {
            Some(record) => self.record_expired(record),
            None => true,
        }
    }

    /// True iff a valid token has less than five minutes left
    pub fn should_refresh(&self) -> bool {
        self.state() == TokenState::ExpiringSoon
    }

    /// Remove the token from memory and cache
    pub fn clear_token(&self) -> PayBridgeResult<()> {
        let mut guard = self.record.write();
        *guard = None;
        self.cache.delete(TOKEN_CACHE_KEY)?;
        Ok(())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.record.read().as_ref().and_then(|r| r.refresh_token.clone())
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.record.read().as_ref().and_then(|r| r.expires_at)
    }

    /// Snapshot of the whole record
    pub fn record(&self) -> Option<TokenRecord> {
        self.record.read().clone()
    }

    pub fn state(&self) -> TokenState {
        let guard = self.record.read();
        let Some(record) = guard.as_ref() else {
            return TokenState::NoToken;
        };
        if self.record_expired(record) {
            return TokenState::Expired;
        }
        match record.expires_at {
            Some(at) if at - self.clock.unix_seconds() < REFRESH_THRESHOLD_SECS => TokenState::ExpiringSoon,
            _ => TokenState::Valid,
        }
    }

    fn record_expired(&self, record: &TokenRecord) -> bool {
        match record.expires_at {
            Some(at) => self.clock.unix_seconds() >= at - EXPIRY_MARGIN_SECS,
            None => false,
        }
    }

    fn persist(&self, record: &TokenRecord, now: i64) -> PayBridgeResult<()> {
        let raw = serde_json::to_string(record).map_err(CacheError::from)?;
        let ttl = self.ttl.or_else(|| {
            record
                .expires_at
                .map(|at| Duration::from_secs((at - now).max(1) as u64))
        });
        self.cache.set(TOKEN_CACHE_KEY, &raw, ttl)?;
        Ok(())
    }
}

fn load(cache: &dyn Cache) -> Option<TokenRecord> {
    match cache.get(TOKEN_CACHE_KEY) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable persisted token");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Failed to read persisted token");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paybridge_types::{MemoryCache, MockClock};
    use serde_json::json;

    const T0: i64 = 1_700_000_000;

    fn store() -> (TokenStore, MockClock, Arc<MemoryCache>) {
        let clock = MockClock::at_unix(T0);
        let cache = Arc::new(MemoryCache::new());
        let store = TokenStore::with_clock(cache.clone(), Arc::new(clock.clone()), None);
        (store, clock, cache)
    }

    #[test]
    fn test_expiry_margin() {
        let (store, clock, _) = store();
        store.set_token("T", None, Some(3600)).unwrap();
        assert!(store.has_token());
        assert!(!store.is_expired());

        // 30 seconds before the literal expiry
        clock.advance(Duration::from_secs(3600 - 30));
        assert!(store.is_expired());
        assert!(!store.has_token());
    }

    #[test]
    fn test_get_token_clears_expired() {
        let (store, clock, cache) = store();
        store.set_token("T", Some("R".into()), Some(120)).unwrap();
        assert_eq!(store.get_token().as_deref(), Some("T"));

        clock.advance(Duration::from_secs(61));
        assert_eq!(store.get_token(), None);
        assert_eq!(store.state(), TokenState::NoToken);
        assert!(cache.get(TOKEN_CACHE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_should_refresh_window() {
        let (store, clock, _) = store();
        assert!(!store.should_refresh());

        store.set_token("T", None, Some(3600)).unwrap();
        assert_eq!(store.state(), TokenState::Valid);
        assert!(!store.should_refresh());

        clock.advance(Duration::from_secs(3600 - 299));
        assert_eq!(store.state(), TokenState::ExpiringSoon);
        assert!(store.should_refresh());

        clock.advance(Duration::from_secs(240));
        assert_eq!(store.state(), TokenState::Expired);
        assert!(!store.should_refresh());
    }

    #[test]
    fn test_expiry_from_jwt_claim() {
        let (store, _, _) = store();
        let token = crate::jwt::encode_for_test(&json!({"exp": T0 + 900}));
        store.set_token(token, None, None).unwrap();
        assert_eq!(store.expires_at(), Some(T0 + 900));
    }

    #[test]
    fn test_default_lifetime_for_opaque_token() {
        let (store, _, _) = store();
        store.set_token("opaque", None, None).unwrap();
        assert_eq!(store.expires_at(), Some(T0 + DEFAULT_LIFETIME_SECS));
    }

    #[test]
    fn test_rehydrates_from_cache() {
        let (store, clock, cache) = store();
        store.set_token("T", Some("R".into()), Some(3600)).unwrap();

        let restored = TokenStore::with_clock(cache, Arc::new(clock), None);
        assert_eq!(restored.get_token().as_deref(), Some("T"));
        assert_eq!(restored.refresh_token().as_deref(), Some("R"));
        assert_eq!(restored.record(), store.record());
    }

    #[test]
    fn test_clear_token() {
        let (store, _, cache) = store();
        store.set_token("T", Some("R".into()), Some(3600)).unwrap();
        store.clear_token().unwrap();

        assert_eq!(store.state(), TokenState::NoToken);
        assert!(store.refresh_token().is_none());
        assert!(cache.get(TOKEN_CACHE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_unreadable_cache_entry_ignored() {
        let cache = Arc::new(MemoryCache::new());
        cache.set(TOKEN_CACHE_KEY, "not json", None).unwrap();
        let store = TokenStore::new(cache, None);
        assert_eq!(store.state(), TokenState::NoToken);
    }

    #[test]
    fn test_concurrent_readers_see_whole_records() {
        let (store, _, _) = store();
        store.set_token("A", Some("A-refresh".into()), Some(3600)).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..500 {
                    let name = if i % 2 == 0 { "B" } else { "A" };
                    store
                        .set_token(name, Some(format!("{}-refresh", name)), Some(3600))
                        .unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..500 {
                    let record = store.record().unwrap();
                    assert_eq!(
                        record.refresh_token.as_deref(),
                        Some(format!("{}-refresh", record.access_token).as_str())
                    );
                }
            });
        });
    }
}

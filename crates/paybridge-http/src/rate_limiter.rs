//! Client-side rate limiter
//!
//! Callers consult the limiter before sending, keyed by whatever identifies
//! them (API key, customer id). Windows live in the injected [`Cache`], so a
//! shared backend limits across processes too. The prune-check-append step
//! for one key runs under that key's lock: two callers can never both see the
//! last free slot.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use paybridge_types::{
    Cache, Clock, PayBridgeError, PayBridgeResult, RateLimitConfig, RateLimitWindow, SystemClock,
};
use tracing::{debug, instrument};

/// Cache key prefix of the fixed windows
pub const KEY_PREFIX: &str = "paybridge.ratelimit.";

/// Cache key prefix of the sliding windows
pub const SLIDING_KEY_PREFIX: &str = "paybridge.ratelimit.sliding.";

const MICROS_PER_SECOND: i64 = 1_000_000;

/// Thread-safe fixed-window rate limiter
pub struct RateLimiter {
    config: RateLimitConfig,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("keys", &self.locks.len())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, cache: Arc<dyn Cache>) -> Self {
        Self::with_clock(config, cache, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, cache: Arc<dyn Cache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            cache,
            clock,
            locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record a request for `key`, or fail if the window is full
    ///
    /// The error is [`PayBridgeError::RateLimited`] with the seconds until the
    /// oldest request leaves the window.
    pub fn allow(&self, key: &str) -> PayBridgeResult<()> {
        self.with_lock(key, || self.allow_locked(key))
    }

    fn allow_locked(&self, key: &str) -> PayBridgeResult<()> {
        let now = self.clock.unix_seconds();
        let window_secs = self.config.window_secs();
        let cache_key = format!("{}{}", KEY_PREFIX, key);

        let mut window = self.load(&cache_key)?;
        window.prune(now, window_secs);

        if window.count() >= self.config.max_requests as usize {
            let wait = window.wait_time(now, window_secs);
            debug!(key, wait_secs = wait, "Rate limit reached");
            return Err(PayBridgeError::RateLimited {
                message: format!("Rate limit exceeded. Try again in {} seconds", wait),
                retry_after: Some(wait as u64),
                limit: Some(self.config.max_requests),
                remaining: Some(0),
                reset_at: window.reset_at(window_secs).and_then(from_unix_seconds),
            });
        }

        window.record(now);
        self.store(&cache_key, &window, self.config.window)
    }

    /// Requests left in the current window
    pub fn remaining(&self, key: &str) -> PayBridgeResult<u32> {
        let window = self.pruned(key)?;
        Ok(window.remaining(self.config.max_requests))
    }

    /// When the oldest request leaves the window, `None` for an empty window
    pub fn reset_time(&self, key: &str) -> PayBridgeResult<Option<DateTime<Utc>>> {
        let window = self.pruned(key)?;
        Ok(window
            .reset_at(self.config.window_secs())
            .and_then(from_unix_seconds))
    }

    /// Forget every request recorded for `key`
    pub fn reset(&self, key: &str) -> PayBridgeResult<()> {
        self.with_lock(key, || {
            self.cache.delete(&format!("{}{}", KEY_PREFIX, key))?;
            Ok(())
        })
    }

    /// Sliding window with caller-chosen parameters, at microsecond resolution
    ///
    /// Independent of the configured window: uses its own cache namespace.
    pub fn allow_sliding(&self, key: &str, limit: u32, window: Duration) -> PayBridgeResult<()> {
        let cache_key = format!("{}{}", SLIDING_KEY_PREFIX, key);
        self.with_lock(&cache_key, || self.allow_sliding_locked(&cache_key, limit, window))
    }

    fn allow_sliding_locked(&self, cache_key: &str, limit: u32, window: Duration) -> PayBridgeResult<()> {
        let now = self.clock.unix_micros();
        let window_micros = i64::try_from(window.as_micros()).unwrap_or(i64::MAX).max(1);

        let mut entries = self.load(cache_key)?;
        entries.prune(now, window_micros);

        if entries.count() >= limit as usize {
            let wait_micros = entries.wait_time(now, window_micros);
            // Round up so a caller sleeping `retry_after` seconds is admitted
            let wait_secs = (wait_micros + MICROS_PER_SECOND - 1) / MICROS_PER_SECOND;
            return Err(PayBridgeError::RateLimited {
                message: format!("Rate limit exceeded. Try again in {} ms", wait_micros / 1000),
                retry_after: Some(wait_secs as u64),
                limit: Some(limit),
                remaining: Some(0),
                reset_at: entries.reset_at(window_micros).and_then(from_unix_micros),
            });
        }

        entries.record(now);
        self.store(cache_key, &entries, window)
    }

    /// Wait until `key` has capacity, then record the request
    #[instrument(skip(self), level = "debug")]
    pub async fn acquire(&self, key: &str) -> PayBridgeResult<()> {
        loop {
            match self.allow(key) {
                Err(PayBridgeError::RateLimited { retry_after, .. }) => {
                    let wait = Duration::from_secs(retry_after.unwrap_or(1).max(1));
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }

    /// Run `f` holding the lock for `key`
    ///
    /// The lock entry is dropped again once no other caller holds it, so the
    /// map only grows with the number of keys in use at the same time.
    fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn pruned(&self, key: &str) -> PayBridgeResult<RateLimitWindow> {
        let mut window = self.load(&format!("{}{}", KEY_PREFIX, key))?;
        window.prune(self.clock.unix_seconds(), self.config.window_secs());
        Ok(window)
    }

    fn load(&self, cache_key: &str) -> PayBridgeResult<RateLimitWindow> {
        match self.cache.get(cache_key)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(window) => Ok(window),
                Err(e) => {
                    debug!(cache_key, error = %e, "Discarding unreadable rate limit window");
                    Ok(RateLimitWindow::new())
                }
            },
            None => Ok(RateLimitWindow::new()),
        }
    }

    fn store(&self, cache_key: &str, window: &RateLimitWindow, ttl: Duration) -> PayBridgeResult<()> {
        let raw = serde_json::to_string(window).map_err(paybridge_types::CacheError::from)?;
        self.cache.set(cache_key, &raw, Some(ttl))?;
        Ok(())
    }
}

fn from_unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

fn from_unix_micros(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
}

/// Shared rate limiter that can be cloned and used across tasks
pub type SharedRateLimiter = Arc<RateLimiter>;

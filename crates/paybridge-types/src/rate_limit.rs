//! Client-side rate limit windows
//!
//! A [`RateLimitWindow`] is the ordered list of request timestamps recorded
//! for one key. Timestamps are plain integers in whatever unit the caller
//! chose (seconds for the fixed window, microseconds for the sliding one),
//! which keeps the window serializable into any cache backend.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Request timestamps for one key, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    timestamps: VecDeque<i64>,
}

impl RateLimitWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop timestamps that fell out of the window
    ///
    /// A timestamp `t` is kept while `now - t < window`.
    pub fn prune(&mut self, now: i64, window: i64) {
        while let Some(&oldest) = self.timestamps.front() {
            if now - oldest >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record a request
    pub fn record(&mut self, at: i64) {
        self.timestamps.push_back(at);
    }

    /// Number of requests in the window
    pub fn count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Oldest timestamp still in the window
    pub fn oldest(&self) -> Option<i64> {
        self.timestamps.front().copied()
    }

    /// Requests left before `limit` is reached
    pub fn remaining(&self, limit: u32) -> u32 {
        (limit as usize).saturating_sub(self.count()) as u32
    }

    /// Time (in window units) until the oldest entry leaves the window
    ///
    /// Zero when the window is empty.
    pub fn wait_time(&self, now: i64, window: i64) -> i64 {
        match self.oldest() {
            Some(oldest) => (window - (now - oldest)).max(0),
            None => 0,
        }
    }

    /// Moment (in window units) the oldest entry expires
    pub fn reset_at(&self, window: i64) -> Option<i64> {
        self.oldest().map(|oldest| oldest + window)
    }
}

/// Fixed-window limit: at most `max_requests` per `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub max_requests: u32,
    /// Window length (whole seconds are used)
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Window length in whole seconds, at least one
    pub fn window_secs(&self) -> i64 {
        self.window.as_secs().max(1) as i64
    }

    /// Very high limit (for testing)
    pub fn permissive() -> Self {
        Self::new(u32::MAX, Duration::from_secs(1))
    }
}

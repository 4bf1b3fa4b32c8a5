//! Per-client sliding-window admission control.
//!
//! One limiter lives for the whole process and is never persisted, so a restart forgets every
//! window. Keys map to the arrival times of admitted requests inside the trailing window.
//! The map is sharded: eviction and append for one key run under that key's shard lock,
//! while different clients proceed in parallel.
//!
//! Keys are never removed, only their windows are emptied; memory grows with the number of
//! distinct clients seen since startup.

use dashmap::DashMap;
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};
use tracing::debug;

use crate::config::RateLimitConfig;

pub const DEFAULT_MAX_REQUESTS: usize = 60;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Admit or reject a request from `client_key` arriving now.
    pub fn allow(&self, client_key: &str) -> bool {
        self.allow_at(client_key, Instant::now())
    }

    /// Admit or reject a request arriving at `now`. Rejected attempts are not recorded.
    pub fn allow_at(&self, client_key: &str, now: Instant) -> bool {
        let mut timestamps = match self.windows.get_mut(client_key) {
            Some(existing) => existing,
            None => self.windows.entry(client_key.to_owned()).or_default(),
        };

        // Arrival order must stay non-decreasing even if callers sampled the clock out of order.
        let now = timestamps.back().map_or(now, |&last| now.max(last));

        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) > self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            debug!(client = client_key, in_window = timestamps.len(), "Rate limit exceeded");
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Suggested wait before retrying after a rejection.
    pub fn retry_after(&self) -> Duration {
        self.window
    }

    /// Number of distinct client keys seen since startup.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Client identity for rate limiting: the first forwarded-for address if present,
/// else the peer address.
///
/// The forwarded header is trusted as-is to support reverse proxies; it is not spoof-resistant.
pub fn client_key(forwarded_for: Option<&str>, remote_addr: &str) -> String {
    forwarded_for
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .unwrap_or(remote_addr)
        .to_string()
}

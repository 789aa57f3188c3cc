//! Fixed-window request rate limiting per identifier.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::warn;

/// Rate limiter parameters.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window size.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    window_start: DateTime<Utc>,
    count: u32,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Time until the window resets. Zero when allowed.
    pub retry_after: Duration,
}

/// Per-identifier fixed-window counter.
///
/// Each check runs under the identifier's entry guard, so window rollover
/// and increment-and-compare are a single atomic step: two concurrent
/// requests at the limit boundary cannot both slip through.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    /// Check and count a request against the identifier's quota.
    pub fn check(&self, identifier: &str) -> RateDecision {
        self.check_at(identifier, Utc::now())
    }

    /// Deterministic variant of [`check`](Self::check).
    pub fn check_at(&self, identifier: &str, now: DateTime<Utc>) -> RateDecision {
        let mut entry = self
            .windows
            .entry(identifier.to_string())
            .or_insert(Window {
                window_start: now,
                count: 0,
            });

        if now - entry.window_start >= self.config.window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= self.config.max_requests {
            // Denied attempts are not counted, so the quota recovers as
            // soon as the window rolls over.
            let retry_after = self.config.window - (now - entry.window_start);
            warn!(identifier = %identifier, retry_after_secs = retry_after.num_seconds(), "Rate limit exceeded");
            return RateDecision {
                allowed: false,
                remaining: 0,
                retry_after,
            };
        }

        entry.count += 1;
        RateDecision {
            allowed: true,
            remaining: self.config.max_requests - entry.count,
            retry_after: Duration::zero(),
        }
    }

    /// Drop windows that ended before `now`. Run periodically so idle
    /// identifiers do not accumulate.
    pub fn prune_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        let window = self.config.window;
        self.windows
            .retain(|_, w| now - w.window_start < window);
        before - self.windows.len()
    }

    /// Number of identifiers currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

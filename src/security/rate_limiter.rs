//! Fixed-window rate limiter keyed by caller identity.
//!
//! Requests are counted per `(identity, now / window)` bucket. Buckets do not
//! overlap, so a burst straddling a boundary can admit up to twice the limit
//! across the two windows.

use crate::error::{GatewayError, GatewayResult};
use crate::security::auth::fingerprint;
use crate::security::clock::{Clock, SystemClock};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    identity: String,
    window: u64,
}

/// Fixed-window rate limiter.
pub struct RateLimiter {
    limit: u32,
    window_ms: u64,
    sweep_interval_ms: u64,
    windows: DashMap<WindowKey, u32>,
    next_sweep_at: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter on the system clock.
    pub fn new(limit: u32, window: Duration) -> Self {
        RateLimiterBuilder::new().limit(limit).window(window).build()
    }

    /// Admit or reject one request from `identity` at the clock's current time.
    pub fn check(&self, identity: &str) -> GatewayResult<RateDecision> {
        self.check_and_consume(identity, self.clock.now_millis())
    }

    /// Admit or reject one request from `identity` at `now_ms`.
    ///
    /// A rejected request does not consume from the window.
    pub fn check_and_consume(&self, identity: &str, now_ms: u64) -> GatewayResult<RateDecision> {
        let window = self.window_index(now_ms);
        let key = WindowKey {
            identity: identity.to_string(),
            window,
        };

        let decision = {
            // The entry guard holds the shard lock, so check and increment
            // are one step for this key.
            let mut count = self.windows.entry(key).or_insert(0);
            if *count >= self.limit {
                None
            } else {
                *count += 1;
                Some(RateDecision {
                    remaining: self.limit - *count,
                    reset_at_ms: (window + 1) * self.window_ms,
                })
            }
        };

        self.maybe_sweep(now_ms);

        match decision {
            Some(decision) => {
                debug!(
                    caller = %fingerprint(identity),
                    remaining = decision.remaining,
                    "Rate limit permit granted"
                );
                Ok(decision)
            }
            None => {
                warn!(
                    caller = %fingerprint(identity),
                    limit = self.limit,
                    window,
                    "Rate limit exceeded"
                );
                Err(GatewayError::RateLimitExceeded)
            }
        }
    }

    /// Remove every window older than the one containing `now_ms`.
    ///
    /// Returns the number of windows removed.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let current = self.window_index(now_ms);
        let before = self.windows.len();
        self.windows.retain(|key, _| key.window >= current);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, current, "Swept expired rate-limit windows");
        }
        removed
    }

    /// Sweep when `now_ms` has reached the scheduled sweep instant. Only the
    /// caller that wins the schedule update runs the sweep.
    fn maybe_sweep(&self, now_ms: u64) {
        let due = self.next_sweep_at.load(Ordering::Acquire);
        if now_ms < due {
            return;
        }
        let next = now_ms.saturating_add(self.sweep_interval_ms);
        if self
            .next_sweep_at
            .compare_exchange(due, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.sweep(now_ms);
        }
    }

    fn window_index(&self, now_ms: u64) -> u64 {
        now_ms / self.window_ms
    }

    pub fn status(&self) -> RateLimitStatus {
        RateLimitStatus {
            limit: self.limit,
            window_ms: self.window_ms,
            tracked_windows: self.windows.len(),
        }
    }

    /// Requests counted for `identity` in the window containing `now_ms`.
    pub fn count(&self, identity: &str, now_ms: u64) -> u32 {
        let key = WindowKey {
            identity: identity.to_string(),
            window: self.window_index(now_ms),
        };
        self.windows.get(&key).map(|c| *c).unwrap_or(0)
    }
}

/// Outcome of an admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub remaining: u32,
    pub reset_at_ms: u64,
}

/// Rate limiter status.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub window_ms: u64,
    pub tracked_windows: usize,
}

/// Rate limiter builder.
pub struct RateLimiterBuilder {
    limit: u32,
    window: Duration,
    sweep_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiterBuilder {
    fn default() -> Self {
        Self {
            limit: 100,
            window: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(300),
            clock: Arc::new(SystemClock),
        }
    }
}

impl RateLimiterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> RateLimiter {
        let window_ms = (self.window.as_millis() as u64).max(1);
        let sweep_interval_ms = (self.sweep_interval.as_millis() as u64).max(1);
        let first_sweep = self.clock.now_millis().saturating_add(sweep_interval_ms);
        RateLimiter {
            limit: self.limit,
            window_ms,
            sweep_interval_ms,
            windows: DashMap::new(),
            next_sweep_at: AtomicU64::new(first_sweep),
            clock: self.clock,
        }
    }
}

//! Outbound rate limiting.
//!
//! A fixed window: the first call after `period` has elapsed opens a new
//! window. Calls beyond `limit` inside a window are rejected, never queued.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Counter state for the current window.
#[derive(Debug, Clone)]
pub struct RateLimitWindow {
    window_start: Instant,
    count: u32,
    limit: u32,
    period: Duration,
}

impl RateLimitWindow {
    pub fn new(limit: u32, period: Duration, now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            limit,
            period,
        }
    }

    /// Count one call at `now`. Returns false if the call must be rejected.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) > self.period {
            self.window_start = now;
            self.count = 0;
        }

        if self.count >= self.limit {
            return false;
        }

        self.count += 1;
        true
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Process-wide limiter shared by every outbound call.
#[derive(Debug)]
pub struct RateLimiter {
    window: Mutex<RateLimitWindow>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Mutex::new(RateLimitWindow::new(
                config.max_requests,
                Duration::from_millis(config.period_ms),
                Instant::now(),
            )),
            enabled: config.enabled,
        }
    }

    /// Check-and-increment in one critical section.
    pub fn check(&self) -> bool {
        if !self.enabled {
            return true;
        }
        let mut window = self.window.lock().expect("rate limiter mutex poisoned");
        window.try_acquire(Instant::now())
    }

    /// Snapshot of the current window.
    pub fn window(&self) -> RateLimitWindow {
        self.window.lock().expect("rate limiter mutex poisoned").clone()
    }

    pub fn limit(&self) -> u32 {
        self.window().limit()
    }

    pub fn period(&self) -> Duration {
        self.window().period()
    }
}

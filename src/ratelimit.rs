//! Per-IP request rate limiting.
//!
//! Each limiter instance covers one scope ("post" or "read") and tracks a
//! fixed window per client address: the window opens at the first request
//! from that address, admits at most `capacity` requests, and resets once
//! `period` has elapsed. State lives in a concurrent map; a background task
//! prunes windows that have gone stale so idle clients do not accumulate.
//!
//! # Examples
//!
//! ```rust
//! use std::net::IpAddr;
//! use std::time::Duration;
//! use bytedrop::ratelimit::RateLimiter;
//!
//! let limiter = RateLimiter::new("post", Duration::from_secs(600), 2);
//! let ip: IpAddr = "203.0.113.9".parse().unwrap();
//!
//! assert!(!limiter.check(ip)); // 1st request admitted
//! assert!(!limiter.check(ip)); // 2nd request admitted
//! assert!(limiter.check(ip));  // over capacity, rejected
//! ```

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::time;

/// One client's current window: when it opened and how many requests it has
/// seen, rejected ones included.
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn fresh() -> Self {
        Self { started: Instant::now(), count: 0 }
    }
}

/// Fixed-window per-IP limiter for a single scope.
pub struct RateLimiter {
    /// Scope label, used in trace output only.
    scope: &'static str,
    /// Window length; also the prune interval.
    period: Duration,
    /// Requests admitted per window per address.
    capacity: u32,
    windows: DashMap<IpAddr, Window>,
}

impl RateLimiter {
    /// Creates a limiter admitting `capacity` requests per `period` per
    /// client address.
    pub fn new(scope: &'static str, period: Duration, capacity: u32) -> Arc<Self> {
        Arc::new(Self {
            scope,
            period,
            capacity,
            windows: DashMap::new(),
        })
    }

    /// Counts a request from `ip`. Returns `true` when the request must be
    /// rejected.
    ///
    /// The window resets lazily: the first request after `period` has passed
    /// since the window opened starts a fresh one, whether or not the pruner
    /// got there first.
    pub fn check(&self, ip: IpAddr) -> bool {
        let mut window = self.windows.entry(ip).or_insert_with(Window::fresh);
        if window.started.elapsed() >= self.period {
            *window = Window::fresh();
        }
        window.count += 1;
        let rejected = window.count > self.capacity;
        drop(window);

        if rejected {
            tracing::debug!(scope = self.scope, %ip, "rate limit exceeded");
        }
        rejected
    }

    /// Spawns the background prune task. Runs for the life of the process;
    /// every `period` it drops windows whose period has fully elapsed.
    pub fn spawn_pruner(self: Arc<Self>) {
        let limiter = self;
        tokio::spawn(async move {
            let mut tick = time::interval(limiter.period);
            tick.tick().await; // first tick fires immediately; skip it
            loop {
                tick.tick().await;
                let before = limiter.windows.len();
                limiter
                    .windows
                    .retain(|_, w| w.started.elapsed() < limiter.period);
                tracing::trace!(
                    scope = limiter.scope,
                    pruned = before.saturating_sub(limiter.windows.len()),
                    "rate limiter prune pass"
                );
            }
        });
    }
}

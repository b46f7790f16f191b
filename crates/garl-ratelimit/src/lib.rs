#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Garl Rate Limiter
//!
//! An in-process sliding-window counter keyed by an arbitrary string (an API
//! key for write paths, a client address for registration), consulted by
//! write paths before they reach the engine (§5 of `SPEC_FULL.md`, "Rate
//! limiting"). Grounded in the kernel's `IpLimiter`/`Bucket` gateway
//! middleware's keyed-map shape, generalized from an IP-keyed token bucket to
//! a string-keyed sliding window, per the rate limiter's own sliding-window
//! contract (`SPEC_FULL.md` §4.9).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use garl_types::error::GarlError;

/// One caller's request log: timestamps of every request still inside the
/// trailing window, oldest first.
struct Window {
    hits: VecDeque<Instant>,
}

/// A keyed sliding-window rate limiter. One instance per distinct scope
/// (writes, registration); cheap to clone, as the window map is
/// reference-counted.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, Window>>,
    limit: u32,
    window: Duration,
    scope: &'static str,
}

impl RateLimiter {
    /// Creates a limiter that allows `requests_per_minute` requests per
    /// caller in any trailing 60-second window, labeled `scope` for metrics
    /// (e.g. `"writes"`, `"registration"`).
    pub fn per_minute(requests_per_minute: u32, scope: &'static str) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            limit: requests_per_minute,
            window: Duration::from_secs(60),
            scope,
        }
    }

    /// Records one request for `key`, returning `Ok(())` if the trailing
    /// window still has room or `Err(GarlError::RateLimited)` if `key` has
    /// already made `requests_per_minute` requests in the last 60 seconds.
    pub fn check(&self, key: &str) -> Result<(), GarlError> {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window { hits: VecDeque::new() });

        while let Some(&oldest) = entry.hits.front() {
            if now.duration_since(oldest) >= self.window {
                entry.hits.pop_front();
            } else {
                break;
            }
        }

        if (entry.hits.len() as u32) < self.limit {
            entry.hits.push_back(now);
            Ok(())
        } else {
            garl_telemetry::rate_limit_metrics().inc_rejected(self.scope);
            let oldest = *entry.hits.front().expect("window is full, so it is non-empty");
            let retry_after_secs = self.window.saturating_sub(now.duration_since(oldest)).as_secs().max(1);
            Err(GarlError::RateLimited { retry_after_secs })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::per_minute(2, "writes");
        assert!(limiter.check("key-a").is_ok());
        assert!(limiter.check("key-a").is_ok());
        assert!(limiter.check("key-a").is_err());
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::per_minute(1, "writes");
        assert!(limiter.check("key-a").is_ok());
        assert!(limiter.check("key-b").is_ok());
    }

    #[test]
    fn window_slides_rather_than_resetting_all_at_once() {
        let limiter = RateLimiter::per_minute(1, "writes");
        assert!(limiter.check("key-a").is_ok());
        // A second request inside the same 60s window is rejected regardless
        // of how long ago the first one landed, since the window is still
        // full relative to `now`.
        assert!(limiter.check("key-a").is_err());
    }
}

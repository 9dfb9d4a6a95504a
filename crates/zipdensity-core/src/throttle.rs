//! Per-worker request spacing for polite fetching.
//!
//! A [`RateLimiter`] is a purely temporal gate: it enforces a minimum gap
//! between the *starts* of consecutive requests issued by one worker. It never
//! looks at responses and does no adaptive backoff. Each batch worker owns its
//! own limiter, so aggregate throughput is roughly `workers / delay`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use zipdensity_core::throttle::{RateLimitConfig, RateLimiter};
//!
//! # async fn run() {
//! let mut limiter = RateLimiter::new(RateLimitConfig::new(Duration::from_secs(1)));
//! limiter.wait().await; // first call returns immediately
//! limiter.wait().await; // sleeps ~1s
//! # }
//! ```

use std::ops::RangeInclusive;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::AppError;

/// Allowed delay for batch runs, in seconds.
pub const BATCH_DELAY_RANGE: RangeInclusive<f64> = 0.5..=5.0;

/// Allowed delay for interactive lookups, in seconds.
pub const LOOKUP_DELAY_RANGE: RangeInclusive<f64> = 0.0..=3.0;

/// Configuration for a rate limiter.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Minimum delay between consecutive request starts.
    pub delay: Duration,

    /// Maximum random jitter added on top of `delay` (uniform [0, jitter]).
    ///
    /// Set to `Duration::ZERO` to disable.
    pub jitter: Duration,
}

impl RateLimitConfig {
    /// Create a new config with the given delay and no jitter.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    /// Build a config from a delay in seconds, rejecting values outside `range`.
    pub fn from_secs_in(secs: f64, range: RangeInclusive<f64>) -> Result<Self, AppError> {
        if !secs.is_finite() || !range.contains(&secs) {
            return Err(AppError::ConfigError(format!(
                "delay {secs}s is outside the allowed range {}s..={}s",
                range.start(),
                range.end()
            )));
        }
        Ok(Self::new(Duration::from_secs_f64(secs)))
    }

    /// Add random jitter (uniform [0, jitter]) on top of the base delay.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Compute the effective delay for a single wait (delay + random jitter).
    fn effective_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        let jitter_ms = rand_jitter_ms(self.jitter.as_millis() as u64);
        self.delay + Duration::from_millis(jitter_ms)
    }
}

impl Default for RateLimitConfig {
    /// One second, no jitter.
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Spacing gate owned by a single worker.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    last_start: Option<Instant>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            last_start: None,
        }
    }

    /// Sleep until the configured delay has elapsed since the previous call,
    /// then record now as the latest request start.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_start {
            let required = self.config.effective_delay();
            let elapsed = last.elapsed();
            if elapsed < required {
                let sleep_duration = required - elapsed;
                tracing::debug!(sleep_ms = %sleep_duration.as_millis(), "Throttling request");
                tokio::time::sleep(sleep_duration).await;
            }
        }
        self.last_start = Some(Instant::now());
    }
}

// ---------------------------------------------------------------------------
// Jitter from a time-seeded xorshift. Not crypto, just spread.
// ---------------------------------------------------------------------------

fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}

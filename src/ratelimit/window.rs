//! Sliding window configuration, results and the admission rule.

use serde::{Deserialize, Serialize};

/// Default ceiling of admitted requests per window.
pub const DEFAULT_MAX_REQUESTS: u64 = 5;
/// Default window length: one minute.
pub const DEFAULT_WINDOW_MS: u64 = 60 * 1000;

/// Limits applied to a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests admitted within the window. Zero rejects everything.
    pub max_requests: u64,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl RateLimitConfig {
    /// Create a config admitting `max_requests` per `window_ms`.
    pub const fn new(max_requests: u64, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS)
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    /// Whether the request was admitted
    pub allowed: bool,
    /// Requests still admissible in the window after this one
    pub remaining: u64,
    /// Milliseconds since epoch when the window next frees a slot
    pub reset_time: u64,
    /// Requests counted in the window, including this one if admitted
    pub current: u64,
}

impl RateLimitResult {
    /// The reset time in whole Unix seconds, rounded up.
    pub fn reset_secs(&self) -> u64 {
        self.reset_time.div_ceil(1000)
    }
}

/// Apply one sliding-window check to an identifier's history.
///
/// Expired timestamps are dropped from `timestamps` whatever the outcome;
/// `now` is appended only when the request is admitted.
pub(crate) fn evaluate(
    timestamps: &mut Vec<u64>,
    config: &RateLimitConfig,
    now: u64,
) -> RateLimitResult {
    // ts > now - window, without underflowing near the epoch
    timestamps.retain(|&ts| ts.saturating_add(config.window_ms) > now);

    let valid = timestamps.len() as u64;
    let reset_time = match timestamps.iter().min() {
        Some(&oldest) => oldest.saturating_add(config.window_ms),
        None => now.saturating_add(config.window_ms),
    };

    let allowed = valid < config.max_requests;
    let remaining = config
        .max_requests
        .saturating_sub(valid)
        .saturating_sub(u64::from(allowed));

    if allowed {
        timestamps.push(now);
    }

    RateLimitResult {
        allowed,
        remaining,
        reset_time,
        current: timestamps.len() as u64,
    }
}

/// Drop timestamps at least `max_age_ms` old. Returns true if any remain.
pub(crate) fn retain_recent(timestamps: &mut Vec<u64>, now: u64, max_age_ms: u64) -> bool {
    timestamps.retain(|&ts| now.saturating_sub(ts) < max_age_ms);
    !timestamps.is_empty()
}

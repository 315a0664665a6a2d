//! Client identification and rate limit response headers.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use super::window::RateLimitResult;

/// Identifier used when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Limit header name.
pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
/// Remaining header name.
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
/// Reset header name; the value is Unix seconds.
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

/// Extract the client address from proxy headers.
///
/// Takes the first entry of `X-Forwarded-For`, then `X-Real-IP`, then falls
/// back to [`UNKNOWN_CLIENT`]. All clients without either header therefore
/// share one rate limit bucket.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = header_str(headers, FORWARDED_FOR)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    if let Some(ip) = header_str(headers, REAL_IP).filter(|ip| !ip.is_empty()) {
        return ip.to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Rate limit headers describing a check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    /// Maximum requests per window
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// Unix seconds when the window next frees a slot
    pub reset: u64,
}

impl RateLimitHeaders {
    /// Build headers from a result and the limit it was checked against.
    pub fn new(result: &RateLimitResult, max_requests: u64) -> Self {
        Self {
            limit: max_requests,
            remaining: result.remaining,
            reset: result.reset_secs(),
        }
    }

    /// Header name/value pairs in canonical casing.
    pub fn pairs(&self) -> [(&'static str, String); 3] {
        [
            (LIMIT_HEADER, self.limit.to_string()),
            (REMAINING_HEADER, self.remaining.to_string()),
            (RESET_HEADER, self.reset.to_string()),
        ]
    }

    /// Add these headers to `headers`, replacing existing values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        // from_static only accepts lowercase names
        let values = [
            (HeaderName::from_static("x-ratelimit-limit"), self.limit),
            (HeaderName::from_static("x-ratelimit-remaining"), self.remaining),
            (HeaderName::from_static("x-ratelimit-reset"), self.reset),
        ];
        for (name, value) in values {
            headers.insert(name, HeaderValue::from(value));
        }
    }
}

/// Build the rate limit headers for a check result.
pub fn rate_limit_headers(result: &RateLimitResult, max_requests: u64) -> RateLimitHeaders {
    RateLimitHeaders::new(result, max_requests)
}

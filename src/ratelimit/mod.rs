//! Rate limiting logic and state management.

mod clock;
mod identity;
mod limiter;
mod policy;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{
    client_ip, rate_limit_headers, RateLimitHeaders, LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER,
    UNKNOWN_CLIENT,
};
pub use limiter::{RateLimiterStore, StoreOptions, DEFAULT_CLEANUP_INTERVAL};
pub use policy::{PolicyRegistry, Preset};
pub use window::{RateLimitConfig, RateLimitResult, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS};

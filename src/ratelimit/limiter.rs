//! Core rate limiter implementation.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

use super::clock::{Clock, SystemClock};
use super::window::{evaluate, retain_recent, RateLimitConfig, RateLimitResult};

/// Default interval between background cleanup sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Sweeps keep history up to this many windows old.
const CLEANUP_WINDOW_FACTOR: u64 = 2;

/// Tunables for a [`RateLimiterStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How often the background sweep runs
    pub cleanup_interval: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

/// Lifecycle of the background sweeper.
enum SweeperState {
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

/// State shared between the store and its sweeper task.
struct StoreInner {
    /// Request timestamps indexed by identifier
    entries: DashMap<String, Vec<u64>>,
    clock: Arc<dyn Clock>,
    /// Widest window any check has used, in milliseconds
    widest_window_ms: AtomicU64,
}

impl StoreInner {
    fn sweep_at(&self, now: u64) -> usize {
        let max_age = self
            .widest_window_ms
            .load(Ordering::Acquire)
            .saturating_mul(CLEANUP_WINDOW_FACTOR);

        let mut removed = 0;
        self.entries.retain(|_, timestamps| {
            let keep = retain_recent(timestamps, now, max_age);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

/// An in-memory sliding-window rate limiter.
///
/// Each identifier keeps the timestamps of its admitted requests. A check
/// counts the ones inside the trailing window and admits the request if the
/// count is under the configured ceiling. The read-modify-write for one
/// identifier happens under that identifier's shard lock, so concurrent
/// checks never over-admit.
///
/// The first check spawns a background sweep on the current tokio runtime
/// that purges identifiers with no recent history. Call
/// [`shutdown`](Self::shutdown) to stop it; dropping the store stops it too.
pub struct RateLimiterStore {
    inner: Arc<StoreInner>,
    options: StoreOptions,
    sweeper: Mutex<SweeperState>,
    /// Set once the sweeper has left `Idle`, to skip the lock on the hot path
    sweeper_settled: AtomicBool,
}

impl RateLimiterStore {
    /// Create a store on the system clock with default options.
    pub fn new() -> Self {
        Self::with_clock(StoreOptions::default(), Arc::new(SystemClock))
    }

    /// Create a store reading time from `clock`.
    pub fn with_clock(options: StoreOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                clock,
                widest_window_ms: AtomicU64::new(0),
            }),
            options,
            sweeper: Mutex::new(SweeperState::Idle),
            sweeper_settled: AtomicBool::new(false),
        }
    }

    /// Check `identifier` against `config`, consuming a slot if admitted.
    ///
    /// Expired history for the identifier is pruned whether or not the
    /// request is admitted.
    pub fn check(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitResult {
        self.ensure_sweeper();
        self.inner
            .widest_window_ms
            .fetch_max(config.window_ms, Ordering::AcqRel);

        let entry = self.inner.entries.entry(identifier.to_string());
        let now = self.inner.clock.now_millis();

        let result = match entry {
            Entry::Occupied(mut occupied) => {
                let result = evaluate(occupied.get_mut(), config, now);
                if occupied.get().is_empty() {
                    occupied.remove();
                }
                result
            }
            Entry::Vacant(vacant) => {
                let mut timestamps = Vec::new();
                let result = evaluate(&mut timestamps, config, now);
                if !timestamps.is_empty() {
                    vacant.insert(timestamps);
                }
                result
            }
        };

        trace!(
            identifier = %identifier,
            allowed = result.allowed,
            current = result.current,
            remaining = result.remaining,
            "Checked rate limit"
        );

        if !result.allowed {
            debug!(
                identifier = %identifier,
                limit = config.max_requests,
                window_ms = config.window_ms,
                "Rate limit exceeded"
            );
        }

        result
    }

    /// Check `identifier` against the default limit of 5 requests per minute.
    pub fn check_default(&self, identifier: &str) -> RateLimitResult {
        self.check(identifier, &RateLimitConfig::default())
    }

    /// Run a cleanup sweep now. Returns the number of identifiers removed.
    pub fn sweep(&self) -> usize {
        self.inner.sweep_at(self.inner.clock.now_millis())
    }

    /// Stop the background sweeper.
    ///
    /// Checks keep working afterwards; the sweeper is not restarted.
    pub fn shutdown(&self) {
        let mut state = self.sweeper.lock();
        if let SweeperState::Running(handle) =
            std::mem::replace(&mut *state, SweeperState::Stopped)
        {
            handle.abort();
            info!("Rate limiter cleanup stopped");
        }
        self.sweeper_settled.store(true, Ordering::Release);
    }

    /// Whether a background sweeper task is currently running.
    pub fn is_sweeper_running(&self) -> bool {
        matches!(&*self.sweeper.lock(), SweeperState::Running(h) if !h.is_finished())
    }

    /// The recorded timestamps for an identifier, if any.
    pub fn timestamps(&self, identifier: &str) -> Option<Vec<u64>> {
        self.inner.entries.get(identifier).map(|e| e.value().clone())
    }

    /// Get the number of tracked identifiers.
    pub fn entry_count(&self) -> usize {
        self.inner.entries.len()
    }

    /// Forget all recorded history.
    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    fn ensure_sweeper(&self) {
        if self.sweeper_settled.load(Ordering::Acquire) {
            return;
        }

        // Outside a runtime there is nothing to spawn on; per-check pruning
        // still bounds each identifier until a check runs inside one.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let mut state = self.sweeper.lock();
        if !matches!(*state, SweeperState::Idle) {
            return;
        }

        let period = self.options.cleanup_interval;
        let inner = Arc::downgrade(&self.inner);
        *state = SweeperState::Running(runtime.spawn(run_sweeper(inner, period)));
        self.sweeper_settled.store(true, Ordering::Release);

        debug!(
            interval_secs = period.as_secs(),
            "Rate limiter cleanup started"
        );
    }
}

impl Default for RateLimiterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RateLimiterStore {
    fn drop(&mut self) {
        if let SweeperState::Running(handle) = &*self.sweeper.get_mut() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for RateLimiterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterStore")
            .field("entries", &self.entry_count())
            .field("options", &self.options)
            .finish()
    }
}

async fn run_sweeper(inner: Weak<StoreInner>, period: Duration) {
    let start = tokio::time::Instant::now() + period;
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = inner.upgrade() else {
            break;
        };

        let swept = std::panic::catch_unwind(AssertUnwindSafe(|| {
            inner.sweep_at(inner.clock.now_millis())
        }));
        match swept {
            Ok(0) => trace!("Rate limiter cleanup found nothing stale"),
            Ok(removed) => info!(removed, "Rate limiter cleanup removed stale entries"),
            Err(_) => error!("Rate limiter cleanup sweep panicked; retrying next interval"),
        }
    }
}

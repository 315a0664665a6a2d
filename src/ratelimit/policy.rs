//! Named rate limit policies.
//!
//! Each preset gets its own [`RateLimiterStore`], so two endpoints limiting
//! the same client under different presets never share history.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use super::clock::{Clock, SystemClock};
use super::limiter::{RateLimiterStore, StoreOptions};
use super::window::{RateLimitConfig, RateLimitResult};
use crate::error::{FormguardError, Result};

const MINUTE_MS: u64 = 60 * 1000;

/// The built-in rate limit presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Preset {
    /// Standard form submission: 5 requests per minute
    FormSubmission,
    /// Sensitive operations: 3 requests per minute
    Strict,
    /// Less sensitive operations: 20 requests per minute
    Relaxed,
    /// API calls: 60 requests per minute
    Api,
}

impl Preset {
    /// Every preset, in catalog order.
    pub const ALL: [Preset; 4] = [
        Preset::FormSubmission,
        Preset::Strict,
        Preset::Relaxed,
        Preset::Api,
    ];

    /// The built-in limits for this preset.
    pub const fn config(self) -> RateLimitConfig {
        match self {
            Preset::FormSubmission => RateLimitConfig::new(5, MINUTE_MS),
            Preset::Strict => RateLimitConfig::new(3, MINUTE_MS),
            Preset::Relaxed => RateLimitConfig::new(20, MINUTE_MS),
            Preset::Api => RateLimitConfig::new(60, MINUTE_MS),
        }
    }

    /// The catalog name, e.g. `FORM_SUBMISSION`.
    pub const fn name(self) -> &'static str {
        match self {
            Preset::FormSubmission => "FORM_SUBMISSION",
            Preset::Strict => "STRICT",
            Preset::Relaxed => "RELAXED",
            Preset::Api => "API",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = FormguardError;

    /// Accepts `FORM_SUBMISSION`, `form_submission` and `form-submission`.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == normalized)
            .ok_or_else(|| FormguardError::Config(format!("Unknown rate limit policy: {}", s)))
    }
}

/// A store bound to the limits it enforces.
struct Policy {
    config: RateLimitConfig,
    store: RateLimiterStore,
}

/// One rate limiter store per preset.
pub struct PolicyRegistry {
    /// Indexed by `Preset as usize`, in [`Preset::ALL`] order
    policies: [Policy; 4],
}

impl PolicyRegistry {
    /// Create a registry with the built-in preset limits.
    pub fn new(options: StoreOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    /// Create a registry whose stores all read time from `clock`.
    pub fn with_clock(options: StoreOptions, clock: Arc<dyn Clock>) -> Self {
        let policies = Preset::ALL.map(|preset| Policy {
            config: preset.config(),
            store: RateLimiterStore::with_clock(options.clone(), clock.clone()),
        });

        Self { policies }
    }

    /// Replace preset limits with configured values.
    ///
    /// Keys are preset names; unknown names are a configuration error.
    pub fn with_overrides(mut self, overrides: &HashMap<String, RateLimitConfig>) -> Result<Self> {
        for (name, config) in overrides {
            let preset: Preset = name.parse()?;
            info!(
                policy = %preset,
                max_requests = config.max_requests,
                window_ms = config.window_ms,
                "Overriding rate limit policy"
            );
            self.policy_mut(preset).config = *config;
        }
        Ok(self)
    }

    /// Check `identifier` under `preset`.
    pub fn check(&self, preset: Preset, identifier: &str) -> RateLimitResult {
        let policy = self.policy(preset);
        policy.store.check(identifier, &policy.config)
    }

    /// The limits currently enforced for `preset`.
    pub fn config(&self, preset: Preset) -> RateLimitConfig {
        self.policy(preset).config
    }

    /// The store backing `preset`.
    pub fn store(&self, preset: Preset) -> &RateLimiterStore {
        &self.policy(preset).store
    }

    /// Stop every store's background sweeper.
    pub fn shutdown(&self) {
        for policy in &self.policies {
            policy.store.shutdown();
        }
    }

    fn policy(&self, preset: Preset) -> &Policy {
        &self.policies[preset as usize]
    }

    fn policy_mut(&mut self, preset: Preset) -> &mut Policy {
        &mut self.policies[preset as usize]
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

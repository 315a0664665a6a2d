//! Configuration management for Formguard.
//!
//! Settings come from an optional YAML file overlaid with `FORMGUARD_*`
//! environment variables, e.g. `FORMGUARD_SERVER__LISTEN_ADDR=0.0.0.0:8080`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{FormguardError, Result};
use crate::ratelimit::{RateLimitConfig, StoreOptions};

const ENV_PREFIX: &str = "FORMGUARD";

/// Main configuration for the Formguard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormguardConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Inquiry mail addressing
    #[serde(default)]
    pub mail: MailConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Seconds between background cleanup sweeps
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Preset overrides keyed by preset name, e.g. `form_submission`
    #[serde(default)]
    pub policies: HashMap<String, RateLimitConfig>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: default_cleanup_interval(),
            policies: HashMap::new(),
        }
    }
}

impl RateLimitingConfig {
    /// Store tunables derived from this configuration.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs.max(1)),
        }
    }
}

fn default_cleanup_interval() -> u64 {
    5 * 60
}

/// Addresses used when relaying partner inquiries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Sender address on every outbound message
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Partnerships inbox receiving internal notifications
    #[serde(default = "default_notification_address")]
    pub notification_address: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from_address: default_from_address(),
            notification_address: default_notification_address(),
        }
    }
}

fn default_from_address() -> String {
    "onboarding@resend.dev".to_string()
}

fn default_notification_address() -> String {
    "support@sleekdentalclub.com".to_string()
}

impl FormguardConfig {
    /// Load configuration from an optional YAML file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                ::config::File::from(path).format(::config::FileFormat::Yaml),
            );
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| FormguardError::Config(e.to_string()))
    }
}

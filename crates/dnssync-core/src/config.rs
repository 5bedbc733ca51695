//! Configuration types for the DNS sync system
//!
//! All settings are carried in an explicit [`SyncConfig`] value handed to the
//! engine and synchronizer constructors.

use crate::records::ProviderKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main DNS sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Managed domain (e.g., "example.com")
    pub domain: String,

    /// Delay between reconciliation cycles (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Accepted TTL drift between desired and live records (in seconds)
    #[serde(default = "default_ttl_tolerance_secs")]
    pub ttl_tolerance_secs: u32,

    /// Kind this process registers as with the orchestrator
    #[serde(default = "default_provider_kind")]
    pub provider_kind: ProviderKind,

    /// Propagation-wait settings
    #[serde(default)]
    pub verify: VerifyConfig,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SyncConfig {
    /// Create a configuration for `domain` with defaults everywhere else
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            poll_interval_secs: default_poll_interval_secs(),
            ttl_tolerance_secs: default_ttl_tolerance_secs(),
            provider_kind: default_provider_kind(),
            verify: VerifyConfig::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.is_empty() {
            return Err(crate::Error::config("Domain cannot be empty"));
        }
        if !self.domain.contains('.') {
            return Err(crate::Error::config(format!(
                "Domain '{}' has no top-level domain",
                self.domain
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.verify.validate(self.poll_interval_secs)
    }

    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Propagation-wait configuration
///
/// The default keeps waiting until every record resolves. Setting
/// `max_attempts` bounds the wait and turns a stall into an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Maximum number of failed propagation checks before giving up
    ///
    /// `None` waits indefinitely.
    #[serde(default)]
    pub max_attempts: Option<usize>,

    /// Delay after the first failed check (in seconds)
    #[serde(default = "default_verify_delay_secs")]
    pub delay_secs: u64,

    /// Factor applied to the delay after each failed check
    ///
    /// 1.0 keeps the delay fixed.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for the delay (in seconds)
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Host label of the transient cache-busting TXT record
    #[serde(default = "default_cache_bust_host")]
    pub cache_bust_host: String,
}

impl VerifyConfig {
    /// Validate against the main poll interval
    pub fn validate(&self, poll_interval_secs: u64) -> Result<(), crate::Error> {
        if self.max_attempts == Some(0) {
            return Err(crate::Error::config(
                "Verification max attempts must be > 0 (omit it to wait indefinitely)",
            ));
        }
        if self.delay_secs > poll_interval_secs {
            return Err(crate::Error::config(format!(
                "Verification delay ({}s) must not exceed the poll interval ({}s)",
                self.delay_secs, poll_interval_secs
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(crate::Error::config(
                "Verification backoff multiplier must be >= 1.0",
            ));
        }
        if self.max_delay_secs < self.delay_secs {
            return Err(crate::Error::config(
                "Verification max delay must be >= the initial delay",
            ));
        }
        if self.cache_bust_host.is_empty() {
            return Err(crate::Error::config("Cache-busting host cannot be empty"));
        }
        Ok(())
    }

    /// Delay to wait after the `attempt`-th failed check (1-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let secs = (self.delay_secs as f64) * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_delay_secs as f64);
        Duration::from_secs_f64(capped.max(0.0))
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            delay_secs: default_verify_delay_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_secs: default_max_delay_secs(),
            cache_bust_host: default_cache_bust_host(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_ttl_tolerance_secs() -> u32 {
    120
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::Dns
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_verify_delay_secs() -> u64 {
    10
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_delay_secs() -> u64 {
    60
}

fn default_cache_bust_host() -> String {
    crate::records::ROOT_HOST.to_string()
}

//! Global configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Session scheduler tunables.
///
/// Every value carries the production default so an empty TOML table is a
/// valid configuration. The silence threshold and health-poll period are
/// policy knobs: a shorter threshold stops abandoned sessions sooner at the
/// cost of false positives on flaky update streams.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TrackerConfig {
    /// Seconds without a position update before a session counts as silent.
    #[serde(default = "default_silence_threshold_seconds")]
    pub silence_threshold_seconds: u64,
    /// Health monitor poll period.
    #[serde(default = "default_health_poll_seconds")]
    pub health_poll_seconds: u64,
    /// Expected fact-generation latency, subtracted from the first wait so
    /// the first delivery lands near the requested cadence.
    #[serde(default = "default_generation_latency_estimate_seconds")]
    pub generation_latency_estimate_seconds: u64,
    /// Lower bound on the initial wait.
    #[serde(default = "default_min_initial_wait_seconds")]
    pub min_initial_wait_seconds: u64,
    /// Lower bound on the pacing sleep between delivery cycles.
    #[serde(default = "default_floor_sleep_seconds")]
    pub floor_sleep_seconds: u64,
    /// Upper bound on a single generation call.
    #[serde(default = "default_generation_timeout_seconds")]
    pub generation_timeout_seconds: u64,
    /// Maximum retained fact-history entries per session.
    #[serde(default = "default_fact_history_cap")]
    pub fact_history_cap: usize,
    /// Number of recent history entries passed to the generator as an
    /// exclusion list.
    #[serde(default = "default_exclusion_window")]
    pub exclusion_window: usize,
}

fn default_silence_threshold_seconds() -> u64 {
    180
}

fn default_health_poll_seconds() -> u64 {
    30
}

fn default_generation_latency_estimate_seconds() -> u64 {
    180
}

fn default_min_initial_wait_seconds() -> u64 {
    30
}

fn default_floor_sleep_seconds() -> u64 {
    15
}

fn default_generation_timeout_seconds() -> u64 {
    120
}

fn default_fact_history_cap() -> usize {
    10
}

fn default_exclusion_window() -> usize {
    5
}

fn default_delivery_interval_minutes() -> u64 {
    10
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            silence_threshold_seconds: default_silence_threshold_seconds(),
            health_poll_seconds: default_health_poll_seconds(),
            generation_latency_estimate_seconds: default_generation_latency_estimate_seconds(),
            min_initial_wait_seconds: default_min_initial_wait_seconds(),
            floor_sleep_seconds: default_floor_sleep_seconds(),
            generation_timeout_seconds: default_generation_timeout_seconds(),
            fact_history_cap: default_fact_history_cap(),
            exclusion_window: default_exclusion_window(),
        }
    }
}

impl TrackerConfig {
    /// Convert the second-granularity tunables into the `Duration`-typed
    /// policy consumed by the scheduler components.
    #[must_use]
    pub fn policy(&self) -> TrackerPolicy {
        TrackerPolicy {
            silence_threshold: Duration::from_secs(self.silence_threshold_seconds),
            health_poll: Duration::from_secs(self.health_poll_seconds),
            latency_estimate: Duration::from_secs(self.generation_latency_estimate_seconds),
            min_initial_wait: Duration::from_secs(self.min_initial_wait_seconds),
            floor_sleep: Duration::from_secs(self.floor_sleep_seconds),
            generation_timeout: Duration::from_secs(self.generation_timeout_seconds),
            history_cap: self.fact_history_cap,
            exclusion_window: self.exclusion_window,
        }
    }
}

/// Runtime scheduling policy handed to the registry and its tasks.
///
/// Built from [`TrackerConfig::policy`] in production; tests construct it
/// directly with millisecond-scale values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerPolicy {
    /// Position-update silence treated as session abandonment.
    pub silence_threshold: Duration,
    /// Health monitor poll period.
    pub health_poll: Duration,
    /// Expected generation latency offset for the initial wait.
    pub latency_estimate: Duration,
    /// Lower bound on the initial wait.
    pub min_initial_wait: Duration,
    /// Lower bound on the pacing sleep.
    pub floor_sleep: Duration,
    /// Upper bound on a single generation call.
    pub generation_timeout: Duration,
    /// Maximum retained fact-history entries.
    pub history_cap: usize,
    /// Recent-history window passed to the generator.
    pub exclusion_window: usize,
}

impl Default for TrackerPolicy {
    fn default() -> Self {
        TrackerConfig::default().policy()
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Delivery cadence used when a start signal carries no interval choice.
    #[serde(default = "default_delivery_interval_minutes")]
    pub default_delivery_interval_minutes: u64,
    /// Session scheduler tunables.
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_delivery_interval_minutes: default_delivery_interval_minutes(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.default_delivery_interval_minutes == 0 {
            return Err(AppError::Config(
                "default_delivery_interval_minutes must be greater than zero".into(),
            ));
        }

        let tracker = &self.tracker;
        if tracker.health_poll_seconds == 0 {
            return Err(AppError::Config(
                "tracker.health_poll_seconds must be greater than zero".into(),
            ));
        }
        if tracker.floor_sleep_seconds == 0 {
            return Err(AppError::Config(
                "tracker.floor_sleep_seconds must be greater than zero".into(),
            ));
        }
        if tracker.fact_history_cap == 0 {
            return Err(AppError::Config(
                "tracker.fact_history_cap must be greater than zero".into(),
            ));
        }
        if tracker.exclusion_window > tracker.fact_history_cap {
            return Err(AppError::Config(format!(
                "tracker.exclusion_window ({}) cannot exceed tracker.fact_history_cap ({})",
                tracker.exclusion_window, tracker.fact_history_cap
            )));
        }

        Ok(())
    }

    /// Default delivery cadence as a `Duration`.
    #[must_use]
    pub fn default_delivery_interval(&self) -> Duration {
        Duration::from_secs(self.default_delivery_interval_minutes * 60)
    }
}

//! Client configuration.
//!
//! One TOML document configures the whole client. Only the webhook
//! endpoint is required; everything else has a conservative default.
//!
//! ```toml
//! endpoint = "https://hooks.example.test/T000/B000"
//! username = "Cohort"
//! sampling_rate = 1.0
//! batch_size = 10
//!
//! [storage]
//! sqlite_path = "/var/lib/cohort/state.sqlite"
//!
//! [exclusions]
//! kinds = ["heartbeat"]
//! ```
//!
//! Parsing is fail-closed: unknown keys and out-of-range values are
//! rejected instead of silently ignored, so a typo cannot quietly turn a
//! production safeguard off.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::delivery::{ExclusionRules, ObservationFilter, PipelineConfig, SenderIdentity};
use crate::store::{FileBackend, MemoryBackend, SqliteBackend, StorageBackend, TieredStore};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Durable tiers to mount under the in-memory one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path for the sqlite tier; omitted means no sqlite tier.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    /// Path for the flat-file tier; omitted means no file tier.
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CohortConfig {
    /// Webhook URL observations are posted to.
    pub endpoint: String,

    /// Display name shown at the endpoint.
    #[serde(default = "default_username")]
    pub username: String,

    /// Avatar shown at the endpoint.
    #[serde(default)]
    pub avatar_url: Option<String>,

    /// Fraction of observations kept, `0.0..=1.0`.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,

    /// Payloads per flush round, and the queue depth that triggers an
    /// early flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between consecutive sends inside a round.
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,

    /// Periodic flush cadence.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// First retry delay after a failing round.
    #[serde(default = "default_retry_backoff_base_ms")]
    pub retry_backoff_base_ms: u64,

    /// Ceiling for the doubled retry delay.
    #[serde(default = "default_retry_backoff_cap_secs")]
    pub retry_backoff_cap_secs: u64,

    /// Teardown drain budget.
    #[serde(default = "default_shutdown_drain_ms")]
    pub shutdown_drain_ms: u64,

    /// Initial connectivity belief.
    #[serde(default = "default_true")]
    pub start_online: bool,

    /// Whether the delivery queue is journaled through the store.
    #[serde(default = "default_true")]
    pub persist_queue: bool,

    #[serde(default)]
    pub exclusions: ExclusionRules,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_username() -> String {
    "Cohort".to_string()
}

const fn default_sampling_rate() -> f64 {
    1.0
}

const fn default_batch_size() -> usize {
    10
}

const fn default_send_interval_ms() -> u64 {
    250
}

const fn default_flush_interval_secs() -> u64 {
    5
}

const fn default_retry_backoff_base_ms() -> u64 {
    1_000
}

const fn default_retry_backoff_cap_secs() -> u64 {
    60
}

const fn default_shutdown_drain_ms() -> u64 {
    3_000
}

const fn default_true() -> bool {
    true
}

impl CohortConfig {
    /// Config with every default and the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: default_username(),
            avatar_url: None,
            sampling_rate: default_sampling_rate(),
            batch_size: default_batch_size(),
            send_interval_ms: default_send_interval_ms(),
            flush_interval_secs: default_flush_interval_secs(),
            retry_backoff_base_ms: default_retry_backoff_base_ms(),
            retry_backoff_cap_secs: default_retry_backoff_cap_secs(),
            shutdown_drain_ms: default_shutdown_drain_ms(),
            start_online: default_true(),
            persist_queue: default_true(),
            exclusions: ExclusionRules::default(),
            storage: StorageConfig::default(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation("endpoint must not be empty".into()));
        }
        if !self.endpoint.starts_with("https://") && !self.endpoint.starts_with("http://") {
            return Err(ConfigError::Validation(format!(
                "endpoint must be an http(s) url, got `{}`",
                self.endpoint
            )));
        }
        if !self.sampling_rate.is_finite() || !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(ConfigError::Validation(format!(
                "sampling_rate must be within 0.0..=1.0, got {}",
                self.sampling_rate
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation("batch_size must be at least 1".into()));
        }
        if self.flush_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "flush_interval_secs must be at least 1".into(),
            ));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Validation("username must not be empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            batch_size: self.batch_size,
            send_interval: Duration::from_millis(self.send_interval_ms),
            flush_interval: Duration::from_secs(self.flush_interval_secs),
            retry_backoff_base: Duration::from_millis(self.retry_backoff_base_ms),
            retry_backoff_cap: Duration::from_secs(self.retry_backoff_cap_secs),
            shutdown_drain: Duration::from_millis(self.shutdown_drain_ms),
            start_online: self.start_online,
        }
    }

    #[must_use]
    pub fn sender(&self) -> SenderIdentity {
        SenderIdentity {
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }

    #[must_use]
    pub fn filter(&self) -> ObservationFilter {
        ObservationFilter::new(self.sampling_rate, self.exclusions.clone())
    }

    /// Mounts the configured tiers, most durable first, with the memory
    /// tier always last. A tier that fails to open is skipped with a
    /// warning rather than failing construction.
    #[must_use]
    pub fn build_store(&self) -> TieredStore {
        let mut backends: Vec<Arc<dyn StorageBackend>> = Vec::new();
        if let Some(path) = &self.storage.sqlite_path {
            match SqliteBackend::open(path) {
                Ok(backend) => backends.push(Arc::new(backend)),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "sqlite tier unavailable, skipping");
                },
            }
        }
        if let Some(path) = &self.storage.file_path {
            backends.push(Arc::new(FileBackend::new(path)));
        }
        backends.push(Arc::new(MemoryBackend::new()));
        TieredStore::new(backends)
    }
}

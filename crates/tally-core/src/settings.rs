//! Worker configuration, loaded from `TALLY_*` environment variables.

use std::time::Duration;

use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::RetryPolicy;
use crate::domain::DomainFailurePolicy;

pub const ENV_PREFIX: &str = "TALLY";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of concurrent processing loops
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Sleep between polls of an empty queue
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    /// Deadline for every account store call
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,

    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Attempt counts below this are rescheduled, the rest abandoned
    #[serde(default = "default_retry_max_reschedules")]
    pub retry_max_reschedules: u32,

    /// Version conflicts the ledger absorbs before failing transiently
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    #[serde(default)]
    pub domain_failure_policy: DomainFailurePolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            workers: default_workers(),
            idle_interval_ms: default_idle_interval_ms(),
            store_timeout_ms: default_store_timeout_ms(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
            retry_multiplier: default_retry_multiplier(),
            retry_max_reschedules: default_retry_max_reschedules(),
            max_conflict_retries: default_max_conflict_retries(),
            domain_failure_policy: DomainFailurePolicy::default(),
        }
    }
}

impl WorkerConfig {
    /// Load from the process environment (`TALLY_WORKERS=4`, ...).
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::load(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn load(environment: Environment) -> Result<Self, SettingsError> {
        let config: Self = Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.workers == 0 {
            return Err(SettingsError::Invalid {
                field: "workers",
                reason: "must be at least 1",
            });
        }
        if !(self.retry_multiplier.is_finite() && self.retry_multiplier > 0.0) {
            return Err(SettingsError::Invalid {
                field: "retry_multiplier",
                reason: "must be a positive number",
            });
        }
        if self.store_timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                field: "store_timeout_ms",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_secs(self.retry_base_delay_secs),
            multiplier: self.retry_multiplier,
            max_reschedules: self.retry_max_reschedules,
        }
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_idle_interval_ms() -> u64 {
    1_000
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

fn default_retry_base_delay_secs() -> u64 {
    5
}

fn default_retry_multiplier() -> f64 {
    5.0
}

fn default_retry_max_reschedules() -> u32 {
    3
}

fn default_max_conflict_retries() -> u32 {
    3
}

//! Config loading, environment overrides, and validation.

use super::model::Config;
use crate::error::{DocketError, Result};
use crate::locks::RetryPolicy;
use std::path::Path;
use std::time::Duration;

/// Enables the polling worker.
pub const ENV_RUNNER_ENABLED: &str = "DOCKET_RUNNER_ENABLED";
/// Overrides `poll_interval_ms`.
pub const ENV_POLL_INTERVAL_MS: &str = "DOCKET_POLL_INTERVAL_MS";
/// Overrides `task_timeout_secs`.
pub const ENV_TASK_TIMEOUT_SECS: &str = "DOCKET_TASK_TIMEOUT_SECS";
/// Overrides `lock_ttl_ms`.
pub const ENV_LOCK_TTL_MS: &str = "DOCKET_LOCK_TTL_MS";

impl Config {
    /// Load config from a YAML file, then apply environment overrides.
    ///
    /// A missing file is not an error: defaults are used.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                DocketError::UserError(format!(
                    "failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_yaml(&content)?
        } else {
            Config::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config from a YAML string (no environment overrides).
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| DocketError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| DocketError::UserError(format!("failed to serialize config: {}", e)))
    }

    /// Apply `DOCKET_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub(crate) fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_RUNNER_ENABLED) {
            self.runner_enabled = parse_bool(ENV_RUNNER_ENABLED, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_u64(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TASK_TIMEOUT_SECS) {
            self.task_timeout_secs = parse_u64(ENV_TASK_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOCK_TTL_MS) {
            self.lock_ttl_ms = parse_u64(ENV_LOCK_TTL_MS, &raw)?;
        }
        Ok(())
    }

    /// Validate config values.
    ///
    /// - intervals, timeouts and the lock TTL must be positive
    /// - `lock_retry.attempts` must be positive
    /// - id formats need a width in 1..=12 and an alphanumeric infix
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("task_timeout_secs", self.task_timeout_secs),
            ("lock_ttl_ms", self.lock_ttl_ms),
            ("lock_retry.attempts", u64::from(self.lock_retry.attempts)),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(DocketError::UserError(format!(
                    "config validation failed: {} must be greater than 0",
                    name
                )));
            }
        }

        for (category, format) in &self.id_formats {
            if format.width == 0 || format.width > 12 {
                return Err(DocketError::UserError(format!(
                    "config validation failed: id_formats.{}.width must be between 1 and 12",
                    category
                )));
            }
            if let Some(infix) = &format.infix
                && (infix.is_empty() || !infix.chars().all(|c| c.is_ascii_alphanumeric()))
            {
                return Err(DocketError::UserError(format!(
                    "config validation failed: id_formats.{}.infix must be alphanumeric (found '{}')",
                    category, infix
                )));
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    /// Backoff policy for callers that wait on the lock.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.lock_retry.attempts,
            initial_backoff: Duration::from_millis(self.lock_retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.lock_retry.max_backoff_ms),
        }
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(DocketError::UserError(format!(
            "invalid value for {}: '{}' (expected true/false)",
            name, other
        ))),
    }
}

fn parse_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        DocketError::UserError(format!(
            "invalid value for {}: '{}' (expected a non-negative integer)",
            name, raw
        ))
    })
}

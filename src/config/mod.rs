//! Configuration model for docket.
//!
//! This module defines the Config struct that represents `.docket/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! defaults for every field, environment overrides for the runner toggles,
//! and validation of config values.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

pub use model::Config;
pub use operations::{
    ENV_LOCK_TTL_MS, ENV_POLL_INTERVAL_MS, ENV_RUNNER_ENABLED, ENV_TASK_TIMEOUT_SECS,
};
pub use types::{IdFormatConfig, LockRetryConfig};

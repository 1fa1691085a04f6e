//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a docket coordination domain.
///
/// Loaded from `.docket/config.yaml`; the runner toggles can additionally be
/// overridden from the environment (see [`Config::apply_env`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Runner settings
    // =========================================================================
    /// Whether the polling worker may run at all.
    pub runner_enabled: bool,

    /// Delay between queue polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Hard limit for a single task's action, in seconds.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Command template per task action (`{task_id}`, `{action}`, `{target}`,
    /// `{initiator}` are substituted).
    pub actions: BTreeMap<String, String>,

    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Age after which a lock whose holder process is dead may be recovered.
    #[serde(default = "default_lock_ttl_ms")]
    pub lock_ttl_ms: u64,

    /// Backoff used by callers that choose to wait for the lock.
    pub lock_retry: LockRetryConfig,

    // =========================================================================
    // ID allocation
    // =========================================================================
    /// Per-category ID format overrides.
    pub id_formats: BTreeMap<String, IdFormatConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runner_enabled: false,
            poll_interval_ms: default_poll_interval_ms(),
            task_timeout_secs: default_task_timeout_secs(),
            actions: BTreeMap::new(),
            lock_ttl_ms: default_lock_ttl_ms(),
            lock_retry: LockRetryConfig::default(),
            id_formats: BTreeMap::new(),
        }
    }
}

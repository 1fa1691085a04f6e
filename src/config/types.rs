//! Configuration sub-structures and serde defaults.

use serde::{Deserialize, Serialize};

/// Caller-side backoff used when waiting for the repo lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockRetryConfig {
    /// Total acquisition attempts (including the first).
    pub attempts: u32,

    /// Delay before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,

    /// Cap for the exponentially growing delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for LockRetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff_ms: 50,
            max_backoff_ms: 2_000,
        }
    }
}

/// Per-category override of the ID format.
///
/// IDs render as `<NAMESPACE>[-<INFIX>]-<counter padded to width>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdFormatConfig {
    /// Token placed between namespace and counter (e.g. `OPP`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infix: Option<String>,

    /// Minimum digits of the zero-padded counter.
    #[serde(default = "default_id_width")]
    pub width: usize,
}

pub(crate) fn default_id_width() -> usize {
    3
}
pub(crate) fn default_poll_interval_ms() -> u64 {
    30_000
}
pub(crate) fn default_task_timeout_secs() -> u64 {
    600
}
pub(crate) fn default_lock_ttl_ms() -> u64 {
    30 * 60 * 1000
}

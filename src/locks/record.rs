//! The lock record stored inside the lock file.

use crate::error::{DocketError, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::liveness::is_process_alive;

/// Contents of a lock file.
///
/// Serialized with camelCase keys; the older `userId`, `action` and `lockId`
/// spellings are accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Opaque identifier of the requester (user or system name).
    #[serde(rename = "holderId", alias = "userId")]
    pub holder_id: String,

    /// What the holder is doing with the lock.
    #[serde(alias = "action")]
    pub purpose: String,

    /// OS process id of the holder, used for liveness checks.
    pub pid: u32,

    /// Acquisition time in epoch milliseconds.
    #[serde(rename = "timestamp")]
    pub acquired_at_ms: i64,

    /// Random per-acquisition token; required to release.
    #[serde(alias = "lockId")]
    pub token: String,

    /// Host the holder runs on. Pids are only meaningful on the same host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl LockRecord {
    /// Create a record for the current process with a fresh token.
    pub fn new(holder_id: &str, purpose: &str) -> Self {
        Self {
            holder_id: holder_id.to_string(),
            purpose: purpose.to_string(),
            pid: std::process::id(),
            acquired_at_ms: Utc::now().timestamp_millis(),
            token: uuid::Uuid::new_v4().to_string(),
            host: Some(local_hostname()),
        }
    }

    /// Parse a record from raw lock file bytes. `None` means corrupt.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok()
    }

    /// Serialize the record to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DocketError::LockError(format!("failed to serialize lock record: {}", e)))
    }

    /// Acquisition time as a timestamp.
    pub fn acquired_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.acquired_at_ms)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Age relative to `now_ms`. Records from the future have age zero.
    pub fn age_at(&self, now_ms: i64) -> Duration {
        let age_ms = now_ms.saturating_sub(self.acquired_at_ms).max(0);
        Duration::from_millis(age_ms as u64)
    }

    /// Age relative to the current clock.
    pub fn age(&self) -> Duration {
        self.age_at(Utc::now().timestamp_millis())
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let secs = self.age().as_secs();
        let (days, hours, minutes) = (secs / 86_400, secs / 3_600, secs / 60);

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m", minutes)
        } else {
            format!("{}s", secs)
        }
    }

    /// Whether the holding process can still be shown to exist.
    ///
    /// Pids from another host cannot be checked; such holders are reported as
    /// not alive so that only the TTL governs their recovery.
    pub fn holder_alive(&self) -> bool {
        match &self.host {
            Some(host) if *host != local_hostname() => false,
            _ => is_process_alive(self.pid),
        }
    }
}

/// Hostname of this machine, or `unknown`.
pub(crate) fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Default holder id for interactive use: `user@HOST`.
pub fn default_holder_id() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}@{}", user, local_hostname())
}

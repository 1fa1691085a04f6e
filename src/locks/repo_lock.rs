//! Acquire, release, inspect and clear operations for a lock file.

use super::backend::{LocalFsBackend, LockBackend};
use super::guard::LockGuard;
use super::record::LockRecord;
use crate::config::Config;
use crate::context::DocketContext;
use crate::error::{DocketError, Result};
use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a non-blocking acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller now holds the lock; keep the token to release it.
    Granted { token: String },
    /// Someone else holds the lock. The record is `None` when the holder's
    /// file could not be read back.
    Held { holder: Option<LockRecord> },
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireOutcome::Granted { .. })
    }
}

/// Snapshot of a lock file for inspection.
#[derive(Debug, Clone)]
pub enum LockStatus {
    /// No lock file.
    Free,
    /// A lock file exists but cannot be parsed. Recoverable on next acquire.
    Corrupt,
    /// A valid record is present.
    Held(LockInfo),
}

/// Information about a held lock.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock file path.
    pub path: PathBuf,

    /// The current record.
    pub record: LockRecord,

    /// Whether the holder process still exists.
    pub holder_alive: bool,

    /// Whether the next acquire would recover this lock.
    pub is_stale: bool,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (holder: {}, pid: {}, age: {}, purpose: {}{})",
            self.path.display(),
            self.record.holder_id,
            self.record.pid,
            self.record.age_string(),
            self.record.purpose,
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}

/// Why an existing lock file may be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staleness {
    Fresh,
    Corrupt,
    DeadHolder,
}

/// A named mutex realized as one file.
#[derive(Debug, Clone)]
pub struct RepoLock {
    path: PathBuf,
    ttl: Duration,
    backend: Arc<dyn LockBackend>,
}

impl RepoLock {
    /// Lock at `path` on the local filesystem.
    pub fn new<P: AsRef<Path>>(path: P, ttl: Duration) -> Self {
        Self::with_backend(path, ttl, Arc::new(LocalFsBackend))
    }

    /// Lock at `path` using a custom storage backend.
    pub fn with_backend<P: AsRef<Path>>(
        path: P,
        ttl: Duration,
        backend: Arc<dyn LockBackend>,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ttl,
            backend,
        }
    }

    /// The repo-wide lock of a coordination domain.
    pub fn for_context(ctx: &DocketContext, config: &Config) -> Self {
        Self::new(ctx.repo_lock_path(), config.lock_ttl())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try to take the lock without blocking.
    ///
    /// Contention is reported as [`AcquireOutcome::Held`]; only storage
    /// failures produce `Err(DocketError::LockError)`. A stale or corrupt
    /// record is removed and the create retried once per call.
    pub fn acquire(&self, holder_id: &str, purpose: &str) -> Result<AcquireOutcome> {
        let mut recovery_used = false;

        loop {
            let record = LockRecord::new(holder_id, purpose);
            let json = record.to_json()?;

            let created = self
                .backend
                .create_exclusive(&self.path, json.as_bytes())
                .map_err(|e| {
                    DocketError::LockError(format!(
                        "failed to create lock '{}': {}",
                        self.path.display(),
                        e
                    ))
                })?;

            if created {
                debug!(
                    lock = %self.path.display(),
                    holder = holder_id,
                    purpose,
                    "lock acquired"
                );
                return Ok(AcquireOutcome::Granted {
                    token: record.token,
                });
            }

            let Some(raw) = self.read_raw()? else {
                // Released between our create and our read.
                if recovery_used {
                    return Ok(AcquireOutcome::Held { holder: None });
                }
                recovery_used = true;
                continue;
            };

            let existing = LockRecord::from_bytes(&raw);
            let staleness = self.assess(existing.as_ref());

            if staleness == Staleness::Fresh || recovery_used {
                debug!(
                    lock = %self.path.display(),
                    holder = existing.as_ref().map(|r| r.holder_id.as_str()),
                    "lock held"
                );
                return Ok(AcquireOutcome::Held { holder: existing });
            }

            match &existing {
                Some(stale) => warn!(
                    lock = %self.path.display(),
                    holder = %stale.holder_id,
                    pid = stale.pid,
                    age_ms = stale.age().as_millis() as u64,
                    "recovering stale lock (holder process is gone)"
                ),
                None => warn!(
                    lock = %self.path.display(),
                    "recovering unparseable lock file"
                ),
            }

            recovery_used = true;
            self.remove_if_unchanged(&raw).map_err(|e| {
                DocketError::LockError(format!(
                    "failed to remove stale lock '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;
        }
    }

    /// Release the lock if `token` matches the current holder.
    ///
    /// Never fails: mismatched tokens are ignored and I/O errors are logged.
    pub fn release(&self, token: &str) {
        let raw = match self.backend.read(&self.path) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(lock = %self.path.display(), "release: lock already free");
                return;
            }
            Err(e) => {
                warn!(lock = %self.path.display(), error = %e, "release: failed to read lock");
                return;
            }
        };

        match LockRecord::from_bytes(&raw) {
            Some(record) if record.token == token => {
                if let Err(e) = self.remove_if_unchanged(&raw) {
                    warn!(
                        lock = %self.path.display(),
                        error = %e,
                        "failed to release lock; it will be recovered after the TTL"
                    );
                } else {
                    debug!(
                        lock = %self.path.display(),
                        holder = %record.holder_id,
                        "lock released"
                    );
                }
            }
            _ => debug!(lock = %self.path.display(), "release: token does not match holder"),
        }
    }

    /// Acquire the lock and return an RAII guard, or `LockHeld` if busy.
    pub fn lock(&self, holder_id: &str, purpose: &str) -> Result<LockGuard<'_>> {
        match self.acquire(holder_id, purpose)? {
            AcquireOutcome::Granted { token } => Ok(LockGuard::new(self, token)),
            AcquireOutcome::Held { holder } => Err(self.held_error(holder.as_ref())),
        }
    }

    /// Run `action` while holding the lock.
    ///
    /// Fails fast with `DocketError::LockHeld` (without running `action`) when
    /// the lock is busy. The lock is released on every exit path, including
    /// errors and panics.
    pub fn with_lock<T, F>(&self, holder_id: &str, purpose: &str, action: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let guard = self.lock(holder_id, purpose)?;
        let result = action();
        guard.release();
        result
    }

    /// Inspect the lock without changing it.
    pub fn status(&self) -> Result<LockStatus> {
        let Some(raw) = self.read_raw()? else {
            return Ok(LockStatus::Free);
        };

        let Some(record) = LockRecord::from_bytes(&raw) else {
            return Ok(LockStatus::Corrupt);
        };

        let holder_alive = record.holder_alive();
        let is_stale = record.age() >= self.ttl && !holder_alive;
        Ok(LockStatus::Held(LockInfo {
            path: self.path.clone(),
            record,
            holder_alive,
            is_stale,
        }))
    }

    /// Operator escape hatch: delete the lock file.
    ///
    /// Only stale or corrupt locks are removed unless `force` is set. Returns
    /// the removed record (if it was parseable) for auditing.
    pub fn clear(&self, force: bool) -> Result<Option<LockRecord>> {
        let removed = match self.status()? {
            LockStatus::Free => {
                return Err(DocketError::UserError(format!(
                    "lock '{}' is not held",
                    self.path.display()
                )));
            }
            LockStatus::Corrupt => None,
            LockStatus::Held(info) => {
                if !info.is_stale && !force {
                    return Err(DocketError::UserError(format!(
                        "lock is held and not stale: {}\n\
                         Use --force to clear it anyway.",
                        info
                    )));
                }
                Some(info.record)
            }
        };

        self.backend.remove(&self.path).map_err(|e| {
            DocketError::UserError(format!(
                "failed to clear lock '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        warn!(
            lock = %self.path.display(),
            holder = removed.as_ref().map(|r| r.holder_id.as_str()),
            force,
            "lock cleared manually"
        );
        Ok(removed)
    }

    /// The `LockHeld` error reported for a busy lock.
    pub fn held_error(&self, holder: Option<&LockRecord>) -> DocketError {
        match holder {
            Some(record) => DocketError::LockHeld(format!(
                "'{}' is held by {} (pid {}, {} ago): {}",
                self.path.display(),
                record.holder_id,
                record.pid,
                record.age_string(),
                record.purpose
            )),
            None => DocketError::LockHeld(format!("'{}' is held", self.path.display())),
        }
    }

    fn assess(&self, existing: Option<&LockRecord>) -> Staleness {
        let Some(record) = existing else {
            return Staleness::Corrupt;
        };

        if record.age_at(Utc::now().timestamp_millis()) < self.ttl {
            return Staleness::Fresh;
        }
        if record.holder_alive() {
            return Staleness::Fresh;
        }
        Staleness::DeadHolder
    }

    fn read_raw(&self) -> Result<Option<Vec<u8>>> {
        self.backend.read(&self.path).map_err(|e| {
            DocketError::LockError(format!(
                "failed to read lock '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Delete the lock file only if it still holds `expected`.
    ///
    /// Another process may have recovered and re-acquired the lock since we
    /// read it; in that case the file is left alone.
    fn remove_if_unchanged(&self, expected: &[u8]) -> std::io::Result<()> {
        match self.backend.read(&self.path)? {
            Some(current) if current == expected => self.backend.remove(&self.path),
            _ => Ok(()),
        }
    }
}

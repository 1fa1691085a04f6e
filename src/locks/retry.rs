//! Caller-side backoff around the non-blocking lock.

use super::guard::LockGuard;
use super::repo_lock::{AcquireOutcome, RepoLock};
use crate::error::Result;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Exponential backoff for callers that choose to wait for the lock.
///
/// The lock itself never waits; this is one policy layered on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Cap for the doubling delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after failed attempt number `attempt` (0-indexed).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Acquire, sleeping between attempts while the lock is held.
    ///
    /// Returns the last `Held` outcome once attempts are exhausted.
    pub fn acquire(
        &self,
        lock: &RepoLock,
        holder_id: &str,
        purpose: &str,
    ) -> Result<AcquireOutcome> {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;

        loop {
            let outcome = lock.acquire(holder_id, purpose)?;
            attempt += 1;
            if outcome.is_granted() || attempt >= attempts {
                return Ok(outcome);
            }

            let delay = self.backoff_delay(attempt - 1);
            debug!(
                holder = holder_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "lock busy, backing off"
            );
            thread::sleep(delay);
        }
    }

    /// Like [`RepoLock::lock`], retrying while held.
    pub fn lock<'a>(
        &self,
        lock: &'a RepoLock,
        holder_id: &str,
        purpose: &str,
    ) -> Result<LockGuard<'a>> {
        match self.acquire(lock, holder_id, purpose)? {
            AcquireOutcome::Granted { token } => Ok(LockGuard::new(lock, token)),
            AcquireOutcome::Held { holder } => Err(lock.held_error(holder.as_ref())),
        }
    }

    /// Like [`RepoLock::with_lock`], retrying while held.
    pub fn with_lock<T, F>(
        &self,
        lock: &RepoLock,
        holder_id: &str,
        purpose: &str,
        action: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let guard = self.lock(lock, holder_id, purpose)?;
        let result = action();
        guard.release();
        result
    }
}

//! Error types for docket.
//!
//! Uses thiserror for derive macros and keeps messages user-actionable.
//! Lock contention and lock I/O failures are separate variants so callers
//! can retry the former and bail on the latter.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for docket operations.
#[derive(Error, Debug)]
pub enum DocketError {
    /// Invalid arguments, invalid state, or unreadable input.
    #[error("{0}")]
    UserError(String),

    /// The lock is held by someone else. Expected and recoverable by retry.
    #[error("Lock is held: {0}")]
    LockHeld(String),

    /// The lock could not be acquired because of a filesystem error.
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    /// A task's action failed, panicked, or timed out.
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl DocketError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DocketError::UserError(_) => exit_codes::USER_ERROR,
            DocketError::LockHeld(_) => exit_codes::LOCK_HELD,
            DocketError::LockError(_) => exit_codes::LOCK_FAILURE,
            DocketError::TaskFailed(_) => exit_codes::TASK_FAILURE,
        }
    }

    /// Whether this error is plain lock contention.
    pub fn is_lock_held(&self) -> bool {
        matches!(self, DocketError::LockHeld(_))
    }
}

/// Result type alias for docket operations.
pub type Result<T> = std::result::Result<T, DocketError>;

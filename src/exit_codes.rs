//! Exit code constants for the docket CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid state, concurrency conflict)
//! - 2: Task execution failure
//! - 3: Lock held by another holder (retry later)
//! - 4: Lock acquisition failure (filesystem-level)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid state, or a detected conflict.
pub const USER_ERROR: i32 = 1;

/// A task's action failed or timed out.
pub const TASK_FAILURE: i32 = 2;

/// The lock is currently held; the caller may retry.
pub const LOCK_HELD: i32 = 3;

/// The lock could not be acquired because of an I/O failure.
pub const LOCK_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, TASK_FAILURE, LOCK_HELD, LOCK_FAILURE];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn contention_and_failure_are_separate_codes() {
        assert_eq!(LOCK_HELD, 3);
        assert_eq!(LOCK_FAILURE, 4);
    }
}

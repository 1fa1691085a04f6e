//! The seam between the worker and whatever actually performs a task.

use crate::error::Result;
use crate::runs::RunLog;
use crate::task::TaskFile;
use std::time::Duration;

/// Successful result of running a task's action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutput {
    /// Short human-readable summary.
    pub output: Option<String>,
    /// Commit produced by the action, if any.
    pub commit_ref: Option<String>,
}

/// Performs the action named by a task.
///
/// Implementations stream progress into `run_log` and should give up once
/// `timeout` has elapsed. The worker holds the repo lock for the whole call
/// and runs it on a separate thread: an executor that overruns the timeout
/// is abandoned, its task failed and the lock released. Any `Err` (or
/// panic) marks the task failed.
pub trait TaskExecutor: Send + Sync {
    fn execute(
        &self,
        task: &TaskFile,
        run_log: &RunLog,
        timeout: Duration,
    ) -> Result<ExecutionOutput>;
}

impl<F> TaskExecutor for F
where
    F: Fn(&TaskFile, &RunLog, Duration) -> Result<ExecutionOutput> + Send + Sync,
{
    fn execute(
        &self,
        task: &TaskFile,
        run_log: &RunLog,
        timeout: Duration,
    ) -> Result<ExecutionOutput> {
        self(task, run_log, timeout)
    }
}

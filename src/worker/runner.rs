//! The polling worker loop.

use super::command::CommandExecutor;
use super::executor::{ExecutionOutput, TaskExecutor};
use crate::config::Config;
use crate::context::DocketContext;
use crate::error::{DocketError, Result};
use crate::locks::RetryPolicy;
use crate::runs::{RunLog, RunMetadata, RunResult};
use crate::task::{TaskFile, TaskStatus, TaskStore};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Granularity at which an idle worker notices a shutdown request.
const SHUTDOWN_CHECK: Duration = Duration::from_millis(100);

/// Extra time an executor gets past the task timeout to report its own
/// timeout before the worker stops waiting for it.
const TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// What one poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No pending tasks.
    Idle,
    /// Pending work exists but the repo lock was busy; try again later.
    Contended,
    /// A task was run to a terminal status.
    Processed { task_id: String, status: TaskStatus },
}

/// Claims pending tasks oldest-first and runs them one at a time.
pub struct Worker {
    store: TaskStore,
    runs_dir: PathBuf,
    executor: Arc<dyn TaskExecutor>,
    task_timeout: Duration,
    poll_interval: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("store", &self.store)
            .field("runs_dir", &self.runs_dir)
            .field("task_timeout", &self.task_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new<P: AsRef<Path>>(
        store: TaskStore,
        runs_dir: P,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        let defaults = Config::default();
        Self {
            store,
            runs_dir: runs_dir.as_ref().to_path_buf(),
            executor,
            task_timeout: defaults.task_timeout(),
            poll_interval: defaults.poll_interval(),
            retry: RetryPolicy::no_retry(),
        }
    }

    /// Worker for a coordination domain running configured action commands
    /// from the repo root.
    pub fn for_context(ctx: &DocketContext, config: &Config) -> Self {
        let executor = CommandExecutor::new(config.actions.clone(), &ctx.root);
        Self::new(
            TaskStore::for_context(ctx, config),
            &ctx.runs_dir,
            Arc::new(executor),
        )
        .with_task_timeout(config.task_timeout())
        .with_poll_interval(config.poll_interval())
        .with_retry(config.retry_policy())
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Backoff used while waiting for the repo lock to claim a task.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Look for the oldest pending task and run it to completion.
    ///
    /// The repo lock taken for the claim is held until the task reaches a
    /// terminal status, so no other writer can interleave with the action.
    pub fn poll_once(&self) -> Result<PollOutcome> {
        let pending = self.store.scan(Some(TaskStatus::Pending))?;
        if pending.is_empty() {
            debug!("no pending tasks");
            return Ok(PollOutcome::Idle);
        }

        for candidate in &pending {
            let (task, guard) = match self.store.claim_holding(candidate.id(), &self.retry) {
                Ok(Some(claimed)) => claimed,
                Ok(None) => continue,
                Err(e) if e.is_lock_held() => {
                    debug!(task = candidate.id(), "repo lock busy, not claiming");
                    return Ok(PollOutcome::Contended);
                }
                Err(e) => return Err(e),
            };

            let outcome = self.process(task);
            guard.release();
            return outcome;
        }

        // Everything we saw was claimed by someone else in the meantime.
        Ok(PollOutcome::Idle)
    }

    /// Poll until `shutdown` is set. Drains the queue without sleeping and
    /// waits `poll_interval` between empty polls.
    pub fn run(&self, shutdown: &AtomicBool) -> Result<()> {
        info!(
            tasks = %self.store.dir().display(),
            interval_ms = self.poll_interval.as_millis() as u64,
            timeout_secs = self.task_timeout.as_secs(),
            "worker started"
        );

        while !shutdown.load(Ordering::SeqCst) {
            match self.poll_once() {
                Ok(PollOutcome::Processed { .. }) => continue,
                Ok(PollOutcome::Idle) | Ok(PollOutcome::Contended) => {}
                Err(e) => error!(error = %e, "poll failed"),
            }
            self.sleep_unless_shutdown(shutdown);
        }

        info!("worker stopped");
        Ok(())
    }

    fn sleep_unless_shutdown(&self, shutdown: &AtomicBool) {
        let started = Instant::now();
        while !shutdown.load(Ordering::SeqCst) {
            let remaining = self.poll_interval.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(SHUTDOWN_CHECK));
        }
    }

    /// Run a claimed (in-progress) task and record its outcome. The caller
    /// holds the repo lock throughout.
    fn process(&self, task: TaskFile) -> Result<PollOutcome> {
        let task_id = task.id().to_string();

        let metadata = RunMetadata::from(&task);
        let run_log = match RunLog::start(&self.runs_dir, &task_id, &metadata) {
            Ok(run_log) => Arc::new(run_log),
            Err(e) => {
                error!(task = %task_id, error = %e, "failed to start run log");
                self.store.update_status(&task_id, TaskStatus::Failed)?;
                return Ok(PollOutcome::Processed {
                    task_id,
                    status: TaskStatus::Failed,
                });
            }
        };
        run_log.note(&format!("claimed by agent-runner:{}", task_id));

        info!(task = %task_id, action = %task.frontmatter.action, "running task");
        let started = Instant::now();
        let outcome = self.execute_with_deadline(task, &run_log);

        let (status, result) = match outcome {
            Ok(ExecutionOutput { output, commit_ref }) => {
                run_log.note("completed");
                (
                    TaskStatus::Complete,
                    RunResult {
                        output,
                        error: None,
                        commit_ref,
                    },
                )
            }
            Err(e) => {
                run_log.note(&format!("failed: {}", e));
                (TaskStatus::Failed, RunResult::failure(e.to_string()))
            }
        };

        debug!(
            task = %task_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "action returned"
        );
        self.finish(task_id, &run_log, status, result)
    }

    /// Run the executor on its own thread and stop waiting once the task
    /// timeout (plus a grace period for executors that enforce it
    /// themselves) has passed. An abandoned executor thread keeps running
    /// detached but can no longer write to the finalized run.
    fn execute_with_deadline(
        &self,
        task: TaskFile,
        run_log: &Arc<RunLog>,
    ) -> Result<ExecutionOutput> {
        let (sender, receiver) = mpsc::channel();
        let executor = Arc::clone(&self.executor);
        let thread_log = Arc::clone(run_log);
        let timeout = self.task_timeout;
        let thread_name = format!("docket-task-{}", task.id());

        thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    executor.execute(&task, &thread_log, timeout)
                }))
                .unwrap_or_else(|panic| {
                    Err(DocketError::TaskFailed(panic_message(panic.as_ref())))
                });
                // The worker may have given up already.
                let _ = sender.send(outcome);
            })
            .map_err(|e| {
                DocketError::TaskFailed(format!("failed to start executor thread: {}", e))
            })?;

        let deadline = timeout.saturating_add(TIMEOUT_GRACE.min(timeout));
        match receiver.recv_timeout(deadline) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                warn!(task = %run_log.task_id(), "executor ignored the timeout, abandoning it");
                Err(DocketError::TaskFailed(format!("timed out after {:?}", timeout)))
            }
            Err(RecvTimeoutError::Disconnected) => Err(DocketError::TaskFailed(
                "executor thread exited without a result".to_string(),
            )),
        }
    }

    /// Finalize the run record, then move the task to its terminal status.
    fn finish(
        &self,
        task_id: String,
        run_log: &RunLog,
        status: TaskStatus,
        result: RunResult,
    ) -> Result<PollOutcome> {
        if let Err(e) = run_log.finalize(status, result) {
            warn!(task = %task_id, error = %e, "failed to finalize run log");
        }
        self.store.update_status(&task_id, status)?;

        info!(task = %task_id, status = %status, "task finished");
        Ok(PollOutcome::Processed { task_id, status })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("executor panicked: {}", detail)
}

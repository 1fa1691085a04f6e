//! Background task runner.
//!
//! The worker polls the task store, claims the oldest pending task under the
//! repo lock, and runs its action while holding the lock (holder
//! `agent-runner:<TASK_ID>`) so no interactive writer interleaves with it.
//! Progress and the outcome go to the task's run record; the task always ends
//! `complete` or `failed` unless the worker process itself dies mid-run.
//!
//! Tasks left `in-progress` by a crashed worker are not requeued
//! automatically; `docket task set-status <ID> pending --force` does that.

mod command;
mod executor;
mod runner;
mod template;

#[cfg(test)]
mod tests;

pub use command::CommandExecutor;
pub use executor::{ExecutionOutput, TaskExecutor};
pub use runner::{PollOutcome, Worker};

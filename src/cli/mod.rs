//! CLI argument parsing for docket.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use docket::task::TaskStatus;
use std::path::PathBuf;

/// Docket: filesystem write coordination for shared document stores.
///
/// Independent processes (an interactive server, a polling daemon, one-off
/// scripts) coordinate through files under `.docket/`:
/// - a repo lock serializing every write
/// - a counter table handing out unique IDs
/// - a task queue worked through by the daemon
#[derive(Parser, Debug)]
#[command(name = "docket")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Repo root to use instead of searching upward for `.docket/`.
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Log debug output to stderr (overridden by DOCKET_LOG / RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for docket.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the `.docket/` state directory and a default config.
    Init,

    /// Inspect, take, release or clear the repo lock.
    Lock(LockCommand),

    /// Allocate and inspect human-readable IDs.
    Id(IdCommand),

    /// Enqueue and inspect tasks.
    Task(TaskCommand),

    /// Inspect task runs.
    Run(RunCommand),

    /// Print the content hash of a document, optionally checking it.
    ///
    /// Exits with status 1 if `--expected` does not match.
    Hash(HashArgs),

    /// Run the task worker.
    ///
    /// Refuses to start unless `runner_enabled` is set (config or
    /// DOCKET_RUNNER_ENABLED=true).
    Daemon(DaemonArgs),
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Show who holds the repo lock.
    Status,

    /// Take the repo lock and print its release token.
    Acquire(LockAcquireArgs),

    /// Release the repo lock by token.
    Release(LockReleaseArgs),

    /// Remove a stale or corrupt lock.
    ///
    /// Requires --force to remove a lock whose holder still looks alive.
    Clear(LockClearArgs),
}

/// Arguments for the `lock acquire` command.
#[derive(Parser, Debug)]
pub struct LockAcquireArgs {
    /// Holder id recorded in the lock (default: user@host).
    #[arg(long)]
    pub holder: Option<String>,

    /// What the lock is taken for.
    #[arg(long)]
    pub purpose: String,

    /// Retry with backoff while the lock is held.
    #[arg(long)]
    pub wait: bool,
}

/// Arguments for the `lock release` command.
#[derive(Parser, Debug)]
pub struct LockReleaseArgs {
    /// Token printed by `lock acquire`.
    pub token: String,
}

/// Arguments for the `lock clear` command.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Clear even if the holder appears to be alive.
    #[arg(long)]
    pub force: bool,
}

/// ID subcommands.
#[derive(Parser, Debug)]
pub struct IdCommand {
    #[command(subcommand)]
    pub action: IdAction,
}

/// Available ID actions.
#[derive(Subcommand, Debug)]
pub enum IdAction {
    /// Allocate the next ID and print it.
    Next(IdArgs),

    /// Print the last allocated value without allocating.
    Peek(IdArgs),

    /// Move a counter forward (for migrations and backfills).
    Reset(IdResetArgs),
}

/// Namespace and category of a counter.
#[derive(Parser, Debug)]
pub struct IdArgs {
    /// Namespace (e.g. BRIK).
    pub namespace: String,

    /// Category (e.g. card, idea, task).
    pub category: String,
}

/// Arguments for the `id reset` command.
#[derive(Parser, Debug)]
pub struct IdResetArgs {
    pub namespace: String,
    pub category: String,

    /// New last-allocated value; the next ID uses value + 1.
    pub value: u64,
}

/// Task subcommands.
#[derive(Parser, Debug)]
pub struct TaskCommand {
    #[command(subcommand)]
    pub action: TaskAction,
}

/// Available task actions.
#[derive(Subcommand, Debug)]
pub enum TaskAction {
    /// Enqueue a pending task.
    Add(TaskAddArgs),

    /// List tasks, oldest first.
    List(TaskListArgs),

    /// Print a task file and its content hash.
    Show(TaskShowArgs),

    /// Change a task's status.
    SetStatus(TaskSetStatusArgs),
}

/// Arguments for the `task add` command.
#[derive(Parser, Debug)]
pub struct TaskAddArgs {
    /// Action to run (a key of `actions` in config.yaml).
    #[arg(long)]
    pub action: String,

    /// What the action operates on.
    #[arg(long)]
    pub target: String,

    /// Who is asking (default: user@host).
    #[arg(long)]
    pub initiator: Option<String>,

    /// Free-text note stored in the task body.
    #[arg(long)]
    pub note: Option<String>,
}

/// Arguments for the `task list` command.
#[derive(Parser, Debug)]
pub struct TaskListArgs {
    /// Only show tasks with this status.
    #[arg(long, value_parser = parse_status)]
    pub status: Option<TaskStatus>,
}

/// Arguments for the `task show` command.
#[derive(Parser, Debug)]
pub struct TaskShowArgs {
    /// Task ID (e.g. AGENT-TASK-0001).
    pub task_id: String,
}

/// Arguments for the `task set-status` command.
#[derive(Parser, Debug)]
pub struct TaskSetStatusArgs {
    pub task_id: String,

    /// pending, in-progress, complete or failed.
    #[arg(value_parser = parse_status)]
    pub status: TaskStatus,

    /// Hash from `task show`; the update is refused if the task changed.
    #[arg(long)]
    pub base_hash: Option<String>,

    /// Skip the state machine check (e.g. to requeue a stranded task).
    #[arg(long)]
    pub force: bool,
}

/// Run subcommands.
#[derive(Parser, Debug)]
pub struct RunCommand {
    #[command(subcommand)]
    pub action: RunAction,
}

/// Available run actions.
#[derive(Subcommand, Debug)]
pub enum RunAction {
    /// Show the latest run of a task.
    Status(RunStatusArgs),
}

/// Arguments for the `run status` command.
#[derive(Parser, Debug)]
pub struct RunStatusArgs {
    pub task_id: String,

    /// Also print the log lines.
    #[arg(long)]
    pub log: bool,
}

/// Arguments for the `hash` command.
#[derive(Parser, Debug)]
pub struct HashArgs {
    /// Markdown document with frontmatter.
    pub file: PathBuf,

    /// Hash the caller last saw.
    #[arg(long)]
    pub expected: Option<String>,
}

/// Arguments for the `daemon` command.
#[derive(Parser, Debug)]
pub struct DaemonArgs {
    /// Poll once, run at most one task, and exit.
    #[arg(long)]
    pub once: bool,
}

fn parse_status(value: &str) -> Result<TaskStatus, String> {
    value.parse::<TaskStatus>().map_err(|e| e.to_string())
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

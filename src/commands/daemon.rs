//! Implementation of the `docket daemon` command.
//!
//! Runs the polling worker in the foreground until SIGINT or SIGTERM. A task
//! that is executing when the signal arrives runs to completion first.

use crate::cli::DaemonArgs;
use docket::config::{Config, ENV_RUNNER_ENABLED};
use docket::context::DocketContext;
use docket::error::{DocketError, Result};
use docket::worker::{PollOutcome, Worker};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::info;

pub fn cmd_daemon(ctx: &DocketContext, config: &Config, args: DaemonArgs) -> Result<()> {
    if !config.runner_enabled {
        return Err(DocketError::UserError(format!(
            "the task runner is disabled\n\n\
             Set `runner_enabled: true` in '{}' or {}=true to enable it.",
            ctx.config_path().display(),
            ENV_RUNNER_ENABLED
        )));
    }

    let worker = Worker::for_context(ctx, config);

    if args.once {
        match worker.poll_once()? {
            PollOutcome::Idle => println!("No pending tasks."),
            PollOutcome::Contended => println!("Repo lock busy; nothing run."),
            PollOutcome::Processed { task_id, status } => println!("{} {}", task_id, status),
        }
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    register_shutdown_signals(&shutdown)?;
    worker.run(&shutdown)?;
    info!("daemon exiting");
    Ok(())
}

#[cfg(unix)]
fn register_shutdown_signals(shutdown: &Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};

    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(shutdown)).map_err(|e| {
            DocketError::UserError(format!("failed to register signal handler: {}", e))
        })?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn register_shutdown_signals(_shutdown: &Arc<AtomicBool>) -> Result<()> {
    tracing::warn!("signal handling unavailable; stop the daemon by killing the process");
    Ok(())
}

//! Command implementations for docket.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command works against one coordination domain,
//! resolved from `--root` or by searching upward for `.docket/`.

mod daemon;
mod hash;
mod id;
mod init;
mod lock;
mod run;
mod task;

use crate::cli::{Cli, Command};
use docket::context::DocketContext;
use docket::error::Result;

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let ctx = match &cli.root {
        Some(root) => DocketContext::at_root(root),
        None => DocketContext::resolve()?,
    };

    match cli.command {
        // `init` writes the config, so a broken one must not stop it.
        Command::Init => init::cmd_init(&ctx),
        command => dispatch_with_config(&ctx, command),
    }
}

fn dispatch_with_config(ctx: &DocketContext, command: Command) -> Result<()> {
    let config = ctx.load_config()?;
    match command {
        Command::Init => init::cmd_init(ctx),
        Command::Lock(cmd) => lock::dispatch(ctx, &config, cmd),
        Command::Id(cmd) => id::dispatch(ctx, &config, cmd),
        Command::Task(cmd) => task::dispatch(ctx, &config, cmd),
        Command::Run(cmd) => run::dispatch(ctx, cmd),
        Command::Hash(args) => hash::cmd_hash(args),
        Command::Daemon(args) => daemon::cmd_daemon(ctx, &config, args),
    }
}

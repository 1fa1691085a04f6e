//! Implementation of the `docket lock` subcommands.
//!
//! `acquire` and `release` let shell scripts bracket a batch of writes with
//! the same lock the daemon and server use. The lock outlives the `acquire`
//! process, so it is recovered by TTL only once that process has exited
//! and the TTL has passed.

use crate::cli::{LockAcquireArgs, LockAction, LockClearArgs, LockCommand, LockReleaseArgs};
use docket::config::Config;
use docket::context::DocketContext;
use docket::error::Result;
use docket::locks::{AcquireOutcome, LockStatus, RepoLock, RetryPolicy, default_holder_id};

pub fn dispatch(ctx: &DocketContext, config: &Config, cmd: LockCommand) -> Result<()> {
    let lock = RepoLock::for_context(ctx, config);
    match cmd.action {
        LockAction::Status => cmd_status(&lock),
        LockAction::Acquire(args) => cmd_acquire(&lock, config, args),
        LockAction::Release(args) => cmd_release(&lock, args),
        LockAction::Clear(args) => cmd_clear(&lock, args),
    }
}

fn cmd_status(lock: &RepoLock) -> Result<()> {
    match lock.status()? {
        LockStatus::Free => println!("free"),
        LockStatus::Corrupt => {
            println!("corrupt: {}", lock.path().display());
            println!("  (recovered by the next acquire, or `docket lock clear`)");
        }
        LockStatus::Held(info) => {
            let record = &info.record;
            println!("held");
            println!("  holder:   {}", record.holder_id);
            println!("  purpose:  {}", record.purpose);
            println!("  pid:      {}{}", record.pid, if info.holder_alive { "" } else { " (exited)" });
            if let Some(host) = &record.host {
                println!("  host:     {}", host);
            }
            println!("  acquired: {} ({} ago)", record.acquired_at().to_rfc3339(), record.age_string());
            if info.is_stale {
                println!("  STALE: will be recovered by the next acquire");
            }
        }
    }
    Ok(())
}

fn cmd_acquire(lock: &RepoLock, config: &Config, args: LockAcquireArgs) -> Result<()> {
    let holder = args.holder.unwrap_or_else(default_holder_id);
    let policy = if args.wait {
        config.retry_policy()
    } else {
        RetryPolicy::no_retry()
    };

    match policy.acquire(lock, &holder, &args.purpose)? {
        AcquireOutcome::Granted { token } => {
            println!("{}", token);
            Ok(())
        }
        AcquireOutcome::Held { holder } => Err(lock.held_error(holder.as_ref())),
    }
}

fn cmd_release(lock: &RepoLock, args: LockReleaseArgs) -> Result<()> {
    lock.release(&args.token);
    Ok(())
}

fn cmd_clear(lock: &RepoLock, args: LockClearArgs) -> Result<()> {
    match lock.clear(args.force)? {
        Some(record) => println!(
            "Cleared lock held by {} (pid {}, {} ago): {}",
            record.holder_id,
            record.pid,
            record.age_string(),
            record.purpose
        ),
        None => println!("Cleared corrupt lock at {}", lock.path().display()),
    }
    Ok(())
}

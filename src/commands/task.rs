//! Implementation of the `docket task` subcommands.

use crate::cli::{
    TaskAction, TaskAddArgs, TaskCommand, TaskListArgs, TaskSetStatusArgs, TaskShowArgs,
};
use docket::config::Config;
use docket::context::DocketContext;
use docket::error::{DocketError, Result};
use docket::guard::{self, GuardOutcome};
use docket::ids::IdAllocator;
use docket::locks::default_holder_id;
use docket::task::TaskStore;

pub fn dispatch(ctx: &DocketContext, config: &Config, cmd: TaskCommand) -> Result<()> {
    let store = TaskStore::for_context(ctx, config).with_retry(config.retry_policy());
    match cmd.action {
        TaskAction::Add(args) => cmd_add(ctx, config, &store, args),
        TaskAction::List(args) => cmd_list(&store, args),
        TaskAction::Show(args) => cmd_show(&store, args),
        TaskAction::SetStatus(args) => cmd_set_status(&store, args),
    }
}

fn cmd_add(ctx: &DocketContext, config: &Config, store: &TaskStore, args: TaskAddArgs) -> Result<()> {
    if !config.actions.contains_key(&args.action) {
        // Not fatal: the daemon may run with a different config.
        eprintln!(
            "Warning: no command configured for action '{}'; the task will fail when run",
            args.action
        );
    }

    let allocator = IdAllocator::for_context(ctx, config).with_retry(config.retry_policy());
    let initiator = args.initiator.unwrap_or_else(default_holder_id);
    let body = args.note.map(|note| format!("\n{}\n", note)).unwrap_or_default();

    let task = store.create(&allocator, &args.action, &args.target, &initiator, &body)?;
    println!("{}", task.id());
    Ok(())
}

fn cmd_list(store: &TaskStore, args: TaskListArgs) -> Result<()> {
    let tasks = store.scan(args.status)?;
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    println!("{:<18} {:<12} {:<16} {:<20} CREATED", "ID", "STATUS", "ACTION", "TARGET");
    for task in &tasks {
        let header = &task.frontmatter;
        println!(
            "{:<18} {:<12} {:<16} {:<20} {}",
            header.id,
            header.status,
            header.action,
            header.target,
            header.created.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn cmd_show(store: &TaskStore, args: TaskShowArgs) -> Result<()> {
    let path = store.path_for(&args.task_id)?;
    let content = std::fs::read_to_string(&path).map_err(|e| {
        DocketError::UserError(format!("task {} not found: {}", args.task_id, e))
    })?;

    print!("{}", content);
    if !content.ends_with('\n') {
        println!();
    }
    println!();
    println!("hash: {}", guard::hash_markdown(&content)?);
    Ok(())
}

fn cmd_set_status(store: &TaskStore, args: TaskSetStatusArgs) -> Result<()> {
    match store.update_status_checked(
        &args.task_id,
        args.status,
        args.base_hash.as_deref(),
        args.force,
    )? {
        GuardOutcome::Ok => {
            println!("{} -> {}", args.task_id, args.status);
            Ok(())
        }
        GuardOutcome::Conflict { current_hash } => Err(DocketError::UserError(format!(
            "task {} changed since it was read (current hash: {})\n\
             Re-read it with `docket task show {}` and retry.",
            args.task_id, current_hash, args.task_id
        ))),
    }
}

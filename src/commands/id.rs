//! Implementation of the `docket id` subcommands.

use crate::cli::{IdAction, IdArgs, IdCommand, IdResetArgs};
use docket::config::Config;
use docket::context::DocketContext;
use docket::error::Result;
use docket::ids::IdAllocator;

pub fn dispatch(ctx: &DocketContext, config: &Config, cmd: IdCommand) -> Result<()> {
    // Interactive callers wait out short contention instead of failing.
    let allocator = IdAllocator::for_context(ctx, config).with_retry(config.retry_policy());
    match cmd.action {
        IdAction::Next(args) => cmd_next(&allocator, args),
        IdAction::Peek(args) => cmd_peek(&allocator, args),
        IdAction::Reset(args) => cmd_reset(&allocator, args),
    }
}

fn cmd_next(allocator: &IdAllocator, args: IdArgs) -> Result<()> {
    println!("{}", allocator.allocate(&args.namespace, &args.category)?);
    Ok(())
}

fn cmd_peek(allocator: &IdAllocator, args: IdArgs) -> Result<()> {
    let last = allocator.peek(&args.namespace, &args.category)?;
    if last == 0 {
        println!("{}/{}: none allocated", args.namespace, args.category);
    } else {
        println!(
            "{}/{}: {} (last: {})",
            args.namespace,
            args.category,
            last,
            allocator.format_id(&args.namespace, &args.category, last)
        );
    }
    Ok(())
}

fn cmd_reset(allocator: &IdAllocator, args: IdResetArgs) -> Result<()> {
    allocator.reset(&args.namespace, &args.category, args.value)?;
    println!(
        "{}/{} reset; next id is {}",
        args.namespace,
        args.category,
        allocator.format_id(&args.namespace, &args.category, args.value.saturating_add(1))
    );
    Ok(())
}

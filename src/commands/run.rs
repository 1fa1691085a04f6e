//! Implementation of the `docket run` subcommands.

use crate::cli::{RunAction, RunCommand, RunStatusArgs};
use docket::context::DocketContext;
use docket::error::{DocketError, Result};
use docket::runs::RunLog;

pub fn dispatch(ctx: &DocketContext, cmd: RunCommand) -> Result<()> {
    match cmd.action {
        RunAction::Status(args) => cmd_status(ctx, args),
    }
}

fn cmd_status(ctx: &DocketContext, args: RunStatusArgs) -> Result<()> {
    let Some(run) = RunLog::load_of(&ctx.runs_dir, &args.task_id)? else {
        return Err(DocketError::UserError(format!(
            "no run recorded for task {}",
            args.task_id
        )));
    };

    let header = &run.frontmatter;
    println!("Run of {}", header.task_id);
    println!("  status:    {}", header.status);
    println!("  action:    {} {}", header.action, header.target);
    println!("  initiator: {}", header.initiator);
    println!("  started:   {}", header.started.to_rfc3339());
    if let Some(completed) = header.completed {
        println!("  completed: {}", completed.to_rfc3339());
    }
    if let Some(duration_ms) = header.duration_ms {
        println!("  duration:  {}ms", duration_ms);
    }
    if let Some(commit) = &header.commit_hash {
        println!("  commit:    {}", commit);
    }
    if let Some(output) = &header.output {
        println!("  output:    {}", output);
    }
    if let Some(error) = &header.error {
        println!("  error:     {}", error);
    }

    if args.log {
        println!();
        for line in run.log_lines() {
            println!("{}", line);
        }
    }
    Ok(())
}

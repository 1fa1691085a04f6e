//! Implementation of the `docket init` command.
//!
//! Creates the state directory layout under the repo root:
//!
//! ```text
//! .docket/
//!   config.yaml      (default config, if missing)
//!   .gitignore       (ignores locks/)
//!   counters.json    (created on first allocation)
//!   locks/
//!   tasks/
//!   runs/
//! ```
//!
//! Running it again never touches existing files.

use docket::config::Config;
use docket::context::DocketContext;
use docket::error::{DocketError, Result};
use docket::fs::atomic_write_file;
use docket::locks::{RepoLock, default_holder_id};
use std::fs;
use std::path::Path;

const GITIGNORE: &str = "locks/\n";

pub fn cmd_init(ctx: &DocketContext) -> Result<()> {
    for dir in [&ctx.state_dir, &ctx.locks_dir, &ctx.tasks_dir, &ctx.runs_dir] {
        fs::create_dir_all(dir).map_err(|e| {
            DocketError::UserError(format!(
                "failed to create directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
    }

    // Another `init` (or a writer) may be running; don't race it on the files.
    let lock = RepoLock::new(ctx.repo_lock_path(), Config::default().lock_ttl());
    let created = lock.with_lock(&default_holder_id(), "init", || {
        let mut created = Vec::new();
        if write_if_missing(&ctx.config_path(), &Config::default().to_yaml()?)? {
            created.push("config.yaml");
        }
        if write_if_missing(&ctx.state_dir.join(".gitignore"), GITIGNORE)? {
            created.push(".gitignore");
        }
        Ok(created)
    })?;

    println!("Initialized docket in {}", ctx.state_dir.display());
    for name in created {
        println!("  created {}", name);
    }
    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write_file(path, content)?;
    Ok(true)
}

//! Implementation of the `docket hash` command.
//!
//! Prints the content hash editors send back as their base hash. With
//! `--expected`, exits 1 when the document changed since that hash was taken.

use crate::cli::HashArgs;
use docket::error::{DocketError, Result};
use docket::guard::{self, GuardOutcome};

pub fn cmd_hash(args: HashArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.file).map_err(|e| {
        DocketError::UserError(format!("failed to read '{}': {}", args.file.display(), e))
    })?;
    let current = guard::hash_markdown(&content)?;

    match guard::check_hash(args.expected.as_deref(), &current) {
        GuardOutcome::Ok => {
            println!("{}", current);
            Ok(())
        }
        GuardOutcome::Conflict { current_hash } => Err(DocketError::UserError(format!(
            "conflict: '{}' changed (current hash: {})",
            args.file.display(),
            current_hash
        ))),
    }
}

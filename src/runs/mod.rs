//! Per-task run records.
//!
//! Every execution of a task leaves `.docket/runs/<TASK_ID>.md`: a header
//! describing the run (status, timing, result) and an append-only `## Log`
//! section of `[timestamp] message` lines that progress is streamed into
//! while the task runs. A UI can poll the header to see when a run finishes.

mod log;
mod record;


pub use log::RunLog;
pub use record::{RUN_DOC_TYPE, RunFile, RunFrontmatter, RunMetadata, RunResult};

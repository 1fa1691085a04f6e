//! Writing and reading run records.

use super::record::{LOG_HEADING, RUN_DOC_TYPE, RunFile, RunFrontmatter, RunMetadata, RunResult};
use crate::document::Document;
use crate::error::{DocketError, Result};
use crate::task::{TaskStatus, validate_task_id};
use chrono::{SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Handle to one in-flight run.
///
/// Appends from several threads (e.g. stdout and stderr readers) are
/// serialized through the handle so lines never interleave mid-write.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    header: RunFrontmatter,
    state: Mutex<bool>,
}

impl RunLog {
    /// Create the run record for `task_id` with status `in-progress`.
    ///
    /// An earlier record for the same task is replaced.
    pub fn start<P: AsRef<Path>>(
        runs_dir: P,
        task_id: &str,
        metadata: &RunMetadata,
    ) -> Result<Self> {
        let path = run_path(runs_dir.as_ref(), task_id)?;
        let header = RunFrontmatter::started_now(task_id, metadata);

        let doc = Document {
            frontmatter: header.clone(),
            body: empty_log_body(),
        };
        doc.save(&path)?;

        info!(task = task_id, run = %path.display(), "run started");
        Ok(Self {
            path,
            header,
            state: Mutex::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn task_id(&self) -> &str {
        &self.header.task_id
    }

    /// Append a timestamped line (one per line of `message`).
    ///
    /// Recreates the record if it was deleted externally. A finalized run
    /// accepts no more lines.
    pub fn append(&self, message: &str) -> Result<()> {
        let finalized = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *finalized {
            return Err(DocketError::UserError(format!(
                "run for task {} is finalized",
                self.header.task_id
            )));
        }
        self.append_locked(message)
    }

    /// Best-effort [`RunLog::append`]: failures are logged, never returned.
    pub fn note(&self, message: &str) {
        if let Err(e) = self.append(message) {
            warn!(run = %self.path.display(), error = %e, "failed to append to run log");
        }
    }

    /// Record the outcome of the run. Allowed once per handle.
    ///
    /// The header is re-read so lines appended since `start` are kept, then
    /// `Completed`, `Duration` and the result fields are written back.
    pub fn finalize(&self, status: TaskStatus, result: RunResult) -> Result<RunFrontmatter> {
        if !status.is_terminal() {
            return Err(DocketError::UserError(format!(
                "cannot finalize run with non-terminal status {}",
                status
            )));
        }

        let mut finalized = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *finalized {
            return Err(DocketError::UserError(format!(
                "run for task {} is already finalized",
                self.header.task_id
            )));
        }

        let mut doc = match RunFile::load(&self.path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(
                    run = %self.path.display(),
                    error = %e,
                    "run record unreadable, rewriting header"
                );
                Document {
                    frontmatter: self.header.clone(),
                    body: empty_log_body(),
                }
            }
        };

        let now = Utc::now();
        let header = &mut doc.frontmatter;
        header.status = status;
        header.completed = Some(now);
        header.duration_ms = Some(
            now.signed_duration_since(header.started)
                .num_milliseconds()
                .max(0) as u64,
        );
        if result.output.is_some() {
            header.output = result.output;
        }
        if result.error.is_some() {
            header.error = result.error;
        }
        if result.commit_ref.is_some() {
            header.commit_hash = result.commit_ref;
        }

        doc.save(&self.path)?;
        *finalized = true;

        info!(
            task = %doc.frontmatter.task_id,
            status = %status,
            duration_ms = doc.frontmatter.duration_ms,
            "run finalized"
        );
        Ok(doc.frontmatter)
    }

    /// Current header of this run.
    pub fn status(&self) -> Result<Option<RunFrontmatter>> {
        read_header(&self.path)
    }

    /// Header of the latest run of `task_id`, if any.
    pub fn status_of<P: AsRef<Path>>(
        runs_dir: P,
        task_id: &str,
    ) -> Result<Option<RunFrontmatter>> {
        read_header(&run_path(runs_dir.as_ref(), task_id)?)
    }

    /// Full record (header and log) of the latest run of `task_id`.
    pub fn load_of<P: AsRef<Path>>(runs_dir: P, task_id: &str) -> Result<Option<RunFile>> {
        read_run(&run_path(runs_dir.as_ref(), task_id)?)
    }

    fn append_locked(&self, message: &str) -> Result<()> {
        if !self.path.exists() {
            warn!(run = %self.path.display(), "run record missing, recreating");
            let doc = Document {
                frontmatter: self.header.clone(),
                body: empty_log_body(),
            };
            doc.save(&self.path)?;
        }

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut text = String::new();
        for line in message.lines() {
            text.push_str(&format!("[{}] {}\n", timestamp, line.trim_end()));
        }
        if text.is_empty() {
            text = format!("[{}]\n", timestamp);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                DocketError::UserError(format!(
                    "failed to open run log '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;
        file.write_all(text.as_bytes()).map_err(|e| {
            DocketError::UserError(format!(
                "failed to write run log '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(run = %self.path.display(), "run log appended");
        Ok(())
    }
}

fn empty_log_body() -> String {
    format!("\n{}\n", LOG_HEADING)
}

fn run_path(runs_dir: &Path, task_id: &str) -> Result<PathBuf> {
    validate_task_id(task_id)?;
    Ok(runs_dir.join(format!("{}.md", task_id)))
}

fn read_run(path: &Path) -> Result<Option<RunFile>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(DocketError::UserError(format!(
                "failed to read run record '{}': {}",
                path.display(),
                e
            )));
        }
    };

    match RunFile::parse(&content) {
        Ok(doc) if doc.frontmatter.doc_type == RUN_DOC_TYPE => Ok(Some(doc)),
        Ok(_) => {
            warn!(path = %path.display(), "ignoring non-run document");
            Ok(None)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed run record");
            Ok(None)
        }
    }
}

fn read_header(path: &Path) -> Result<Option<RunFrontmatter>> {
    Ok(read_run(path)?.map(|doc| doc.frontmatter))
}

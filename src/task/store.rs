//! Directory-backed task queue: scan, get, create, status updates and claim.

use super::{TASK_ID_CATEGORY, TASK_ID_NAMESPACE, TaskFile, TaskFrontmatter, TaskStatus};
use crate::config::Config;
use crate::context::DocketContext;
use crate::document::Document;
use crate::error::{DocketError, Result};
use crate::guard::{self, GuardOutcome};
use crate::ids::IdAllocator;
use crate::locks::{LockGuard, RepoLock, RetryPolicy};
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static TASK_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("Invalid task ID regex"));

/// Reject IDs that could escape the task directory.
pub(crate) fn validate_task_id(id: &str) -> Result<()> {
    if TASK_ID_REGEX.is_match(id) {
        Ok(())
    } else {
        Err(DocketError::UserError(format!("invalid task ID '{}'", id)))
    }
}

/// Task descriptors under one directory.
#[derive(Debug, Clone)]
pub struct TaskStore {
    dir: PathBuf,
    lock: RepoLock,
    retry: RetryPolicy,
}

impl TaskStore {
    /// Store over `dir`. Claims and guarded updates serialize on `lock`.
    pub fn new<P: AsRef<Path>>(dir: P, lock: RepoLock) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            lock,
            retry: RetryPolicy::no_retry(),
        }
    }

    pub fn for_context(ctx: &DocketContext, config: &Config) -> Self {
        Self::new(&ctx.tasks_dir, RepoLock::for_context(ctx, config))
            .with_retry(config.retry_policy())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock(&self) -> &RepoLock {
        &self.lock
    }

    /// File backing task `id`.
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_task_id(id)?;
        Ok(self.dir.join(format!("{}.md", id)))
    }

    /// All tasks (optionally only those in `filter`), oldest `Created` first.
    ///
    /// A missing directory is an empty queue. Files that fail to parse, are
    /// not task descriptors, or whose name does not match their ID are
    /// skipped with a warning.
    pub fn scan(&self, filter: Option<TaskStatus>) -> Result<Vec<TaskFile>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DocketError::UserError(format!(
                    "failed to read task directory '{}': {}",
                    self.dir.display(),
                    e
                )));
            }
        };

        let mut tasks = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }

            let task = match TaskFile::load(&path) {
                Ok(task) => task,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed task file");
                    continue;
                }
            };

            if !task.is_task() {
                debug!(path = %path.display(), "skipping non-task document");
                continue;
            }
            if path.file_stem().and_then(|s| s.to_str()) != Some(task.id()) {
                warn!(
                    path = %path.display(),
                    id = task.id(),
                    "skipping task whose file name does not match its ID"
                );
                continue;
            }

            if filter.is_none_or(|status| task.status() == status) {
                tasks.push(task);
            }
        }

        tasks.sort_by(|a, b| {
            a.frontmatter
                .created
                .cmp(&b.frontmatter.created)
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(tasks)
    }

    /// Load task `id`, or `None` if it does not exist.
    pub fn get(&self, id: &str) -> Result<Option<TaskFile>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let task = TaskFile::load(&path)?;
        if !task.is_task() {
            return Err(DocketError::UserError(format!(
                "'{}' is not a task descriptor",
                path.display()
            )));
        }
        Ok(Some(task))
    }

    /// Enqueue a new pending task with an allocated ID.
    pub fn create(
        &self,
        allocator: &IdAllocator,
        action: &str,
        target: &str,
        initiator: &str,
        body: &str,
    ) -> Result<TaskFile> {
        if action.trim().is_empty() {
            return Err(DocketError::UserError("task action must not be empty".to_string()));
        }

        let id = allocator.allocate(TASK_ID_NAMESPACE, TASK_ID_CATEGORY)?;
        let body = if body.is_empty() || body.starts_with('\n') {
            body.to_string()
        } else {
            format!("\n{}", body)
        };
        let task = Document {
            frontmatter: TaskFrontmatter::new(&id, action, target, initiator),
            body,
        };
        task.save(self.path_for(&id)?)?;

        info!(task = %id, action, target, "task created");
        Ok(task)
    }

    /// Move task `id` to `status` if the state machine allows it.
    ///
    /// Writing the current status again is a no-op. Other header fields and
    /// the body are preserved.
    pub fn update_status(&self, id: &str, status: TaskStatus) -> Result<TaskFile> {
        let mut task = self.require(id)?;
        let current = task.status();

        if current == status {
            return Ok(task);
        }
        if !current.can_transition_to(status) {
            return Err(DocketError::UserError(format!(
                "task {} cannot move from {} to {}",
                id, current, status
            )));
        }

        task.frontmatter.status = status;
        task.save(self.path_for(id)?)?;
        info!(task = id, from = %current, to = %status, "task status updated");
        Ok(task)
    }

    /// Set any status, bypassing the state machine.
    ///
    /// Operator escape hatch, e.g. to requeue a task stranded `in-progress`
    /// by a crashed worker.
    pub fn override_status(&self, id: &str, status: TaskStatus) -> Result<TaskFile> {
        let mut task = self.require(id)?;
        let previous = task.status();

        task.frontmatter.status = status;
        task.save(self.path_for(id)?)?;
        warn!(task = id, from = %previous, to = %status, "task status overridden");
        Ok(task)
    }

    /// Status update guarded by the document hash the caller last saw.
    ///
    /// Runs under the repo lock. A stale `base_hash` returns the conflict
    /// (with the current hash) and writes nothing; `None` skips the check.
    pub fn update_status_checked(
        &self,
        id: &str,
        status: TaskStatus,
        base_hash: Option<&str>,
        force: bool,
    ) -> Result<GuardOutcome> {
        let holder = format!("task-store:{}", id);
        let purpose = format!("set {} to {}", id, status);

        self.retry.with_lock(&self.lock, &holder, &purpose, || {
            let current_hash = self.hash(id)?;
            let outcome = guard::check_hash(base_hash, &current_hash);
            if !outcome.is_ok() {
                info!(task = id, "status update rejected: document changed");
                return Ok(outcome);
            }

            if force {
                self.override_status(id, status)?;
            } else {
                self.update_status(id, status)?;
            }
            Ok(GuardOutcome::Ok)
        })
    }

    /// Atomically move task `id` from `pending` to `in-progress`.
    ///
    /// The status is re-read under the repo lock, so two workers racing on
    /// the same task cannot both win. Returns `None` if the task is gone or
    /// no longer pending.
    pub fn claim(&self, id: &str) -> Result<Option<TaskFile>> {
        Ok(self
            .claim_holding(id, &RetryPolicy::no_retry())?
            .map(|(task, _guard)| task))
    }

    /// Like [`TaskStore::claim`], but the repo lock stays held: the returned
    /// guard covers the claim and whatever the caller runs next, so no other
    /// writer can get in between. Waits for the lock per `retry`.
    pub fn claim_holding(
        &self,
        id: &str,
        retry: &RetryPolicy,
    ) -> Result<Option<(TaskFile, LockGuard<'_>)>> {
        let holder = format!("agent-runner:{}", id);
        let guard = retry.lock(&self.lock, &holder, "claim and run task")?;

        let Some(mut task) = self.get(id)? else {
            return Ok(None);
        };
        if task.status() != TaskStatus::Pending {
            debug!(task = id, status = %task.status(), "task no longer pending");
            return Ok(None);
        }

        task.frontmatter.status = TaskStatus::InProgress;
        task.save(self.path_for(id)?)?;
        info!(task = id, "task claimed");
        Ok(Some((task, guard)))
    }

    /// Content hash of task `id` as stored on disk.
    pub fn hash(&self, id: &str) -> Result<String> {
        let path = self.path_for(id)?;
        let content = std::fs::read_to_string(&path).map_err(|e| {
            DocketError::UserError(format!("failed to read task {}: {}", id, e))
        })?;
        guard::hash_markdown(&content)
    }

    fn require(&self, id: &str) -> Result<TaskFile> {
        self.get(id)?
            .ok_or_else(|| DocketError::UserError(format!("task {} not found", id)))
    }
}

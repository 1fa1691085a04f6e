//! Coordination-domain path resolution.
//!
//! Every docket operation works against one state directory (`.docket/`)
//! under a repo root. This module finds that root from any working directory
//! and derives the canonical paths for the lock, counters, tasks and runs, so
//! the interactive CLI, the daemon and one-off scripts all agree on the same
//! files.

use crate::config::Config;
use crate::error::{DocketError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the state directory under the repo root.
pub const STATE_DIR_NAME: &str = ".docket";

/// Resolved paths for a coordination domain. All paths are absolute when
/// resolved from an absolute directory.
#[derive(Debug, Clone)]
pub struct DocketContext {
    /// Repo root (the directory containing `.docket/`).
    pub root: PathBuf,

    /// `{root}/.docket/`
    pub state_dir: PathBuf,

    /// `{root}/.docket/locks/`
    pub locks_dir: PathBuf,

    /// `{root}/.docket/tasks/`
    pub tasks_dir: PathBuf,

    /// `{root}/.docket/runs/`
    pub runs_dir: PathBuf,
}

impl DocketContext {
    /// Resolve the context from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            DocketError::UserError(format!("failed to get current working directory: {}", e))
        })?;
        Ok(Self::resolve_from(cwd))
    }

    /// Resolve the context by walking up from `start` to the nearest
    /// directory that contains `.docket/`.
    ///
    /// When no ancestor has one, `start` itself becomes the root so a fresh
    /// tree can be bootstrapped.
    pub fn resolve_from<P: AsRef<Path>>(start: P) -> Self {
        let start = start.as_ref();
        let root = start
            .ancestors()
            .find(|dir| dir.join(STATE_DIR_NAME).is_dir())
            .unwrap_or(start);
        Self::at_root(root)
    }

    /// Build the context for an explicit root without discovery.
    pub fn at_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let state_dir = root.join(STATE_DIR_NAME);

        Self {
            locks_dir: state_dir.join("locks"),
            tasks_dir: state_dir.join("tasks"),
            runs_dir: state_dir.join("runs"),
            state_dir,
            root,
        }
    }

    /// The single coarse-grained repo lock.
    pub fn repo_lock_path(&self) -> PathBuf {
        self.named_lock_path("repo")
    }

    /// A lock file keyed by resource name (e.g. a per-document lock).
    pub fn named_lock_path(&self, name: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", name))
    }

    /// Persisted counter table for the ID allocator.
    pub fn counters_path(&self) -> PathBuf {
        self.state_dir.join("counters.json")
    }

    /// Configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    /// Load the configuration for this domain (file + environment).
    pub fn load_config(&self) -> Result<Config> {
        Config::load(self.config_path())
    }
}

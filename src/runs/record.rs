//! Run record header and result types.

use crate::document::Document;
use crate::task::{TaskFile, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `Type` value identifying run records.
pub const RUN_DOC_TYPE: &str = "agent-run";

/// Heading that starts the append-only log section.
pub(crate) const LOG_HEADING: &str = "## Log";

/// A run record file.
pub type RunFile = Document<RunFrontmatter>;

/// Run record header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFrontmatter {
    #[serde(rename = "Type")]
    pub doc_type: String,

    #[serde(rename = "TaskID")]
    pub task_id: String,

    /// `in-progress` while running, then `complete` or `failed`.
    #[serde(rename = "Status")]
    pub status: TaskStatus,

    #[serde(rename = "Action")]
    pub action: String,

    #[serde(rename = "Target")]
    pub target: String,

    #[serde(rename = "Initiator")]
    pub initiator: String,

    #[serde(rename = "Started")]
    pub started: DateTime<Utc>,

    #[serde(rename = "Completed", default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,

    /// Wall-clock duration in milliseconds.
    #[serde(rename = "Duration", default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(rename = "Output", default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(rename = "CommitHash", default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// What a run is doing; copied from the task when the run starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMetadata {
    pub action: String,
    pub target: String,
    pub initiator: String,
}

impl From<&TaskFile> for RunMetadata {
    fn from(task: &TaskFile) -> Self {
        Self {
            action: task.frontmatter.action.clone(),
            target: task.frontmatter.target.clone(),
            initiator: task.frontmatter.initiator.clone(),
        }
    }
}

/// Optional result fields merged into the header on finalize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    pub output: Option<String>,
    pub error: Option<String>,
    pub commit_ref: Option<String>,
}

impl RunResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl RunFrontmatter {
    pub(crate) fn started_now(task_id: &str, metadata: &RunMetadata) -> Self {
        Self {
            doc_type: RUN_DOC_TYPE.to_string(),
            task_id: task_id.to_string(),
            status: TaskStatus::InProgress,
            action: metadata.action.clone(),
            target: metadata.target.clone(),
            initiator: metadata.initiator.clone(),
            started: Utc::now(),
            completed: None,
            duration_ms: None,
            output: None,
            error: None,
            commit_hash: None,
            extra: BTreeMap::new(),
        }
    }
}

impl RunFile {
    /// Messages in the log section, in append order, with timestamps.
    pub fn log_lines(&self) -> Vec<&str> {
        let Some(start) = self.body.find(LOG_HEADING) else {
            return Vec::new();
        };
        self.body[start + LOG_HEADING.len()..]
            .lines()
            .map(str::trim_end)
            .filter(|line| line.starts_with('['))
            .collect()
    }
}

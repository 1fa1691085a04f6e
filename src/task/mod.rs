//! Task descriptors and the on-disk task queue.
//!
//! Each task is one markdown file `.docket/tasks/<ID>.md` whose frontmatter
//! carries the fields the worker needs; the body is free text for humans and
//! is preserved verbatim across status updates.
//!
//! ```text
//! ---
//! Type: agent-task
//! ID: AGENT-TASK-0001
//! Status: pending
//! Action: demo
//! Target: BRIK-001
//! Initiator: pete
//! Created: 2026-01-13T10:00:00Z
//! ---
//!
//! Optional notes.
//! ```
//!
//! Unknown header fields are kept in [`TaskFrontmatter::extra`] so producers
//! can attach data the worker does not know about.

use crate::document::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod status;
mod store;

pub use status::TaskStatus;
pub use store::TaskStore;
pub(crate) use store::validate_task_id;

/// `Type` value identifying task descriptors.
pub const TASK_DOC_TYPE: &str = "agent-task";

/// Namespace and category task IDs are allocated under.
pub const TASK_ID_NAMESPACE: &str = "AGENT";
pub const TASK_ID_CATEGORY: &str = "task";

/// A task descriptor file.
pub type TaskFile = Document<TaskFrontmatter>;

/// Task descriptor header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFrontmatter {
    /// Document type marker; always [`TASK_DOC_TYPE`] for tasks.
    #[serde(rename = "Type")]
    pub doc_type: String,

    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Status")]
    pub status: TaskStatus,

    /// Name of the action to run (looked up in the configured actions).
    #[serde(rename = "Action")]
    pub action: String,

    /// What the action operates on, e.g. a card ID.
    #[serde(rename = "Target")]
    pub target: String,

    /// Who asked for the task.
    #[serde(rename = "Initiator")]
    pub initiator: String,

    #[serde(rename = "Created")]
    pub created: DateTime<Utc>,

    /// Fields not listed above, kept for round-tripping.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl TaskFrontmatter {
    /// A new pending task header created now.
    pub fn new(id: &str, action: &str, target: &str, initiator: &str) -> Self {
        Self {
            doc_type: TASK_DOC_TYPE.to_string(),
            id: id.to_string(),
            status: TaskStatus::Pending,
            action: action.to_string(),
            target: target.to_string(),
            initiator: initiator.to_string(),
            created: Utc::now(),
            extra: BTreeMap::new(),
        }
    }
}

impl TaskFile {
    pub fn id(&self) -> &str {
        &self.frontmatter.id
    }

    pub fn status(&self) -> TaskStatus {
        self.frontmatter.status
    }

    /// Whether this document is a task descriptor at all.
    pub fn is_task(&self) -> bool {
        self.frontmatter.doc_type == TASK_DOC_TYPE
    }
}

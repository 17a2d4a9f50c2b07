//! Task list model: queue identity, fencing token, tasks and orphan candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two disjoint task kinds a task list can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskListType {
    Decision,
    Activity,
}

impl TaskListType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskListType::Decision => "decision",
            TaskListType::Activity => "activity",
        }
    }
}

impl fmt::Display for TaskListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a task list without its fencing token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskListKey {
    pub domain_id: String,
    pub name: String,
    pub task_type: TaskListType,
}

impl TaskListKey {
    pub fn new(
        domain_id: impl Into<String>,
        name: impl Into<String>,
        task_type: TaskListType,
    ) -> Self {
        Self {
            domain_id: domain_id.into(),
            name: name.into(),
            task_type,
        }
    }
}

impl fmt::Display for TaskListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.domain_id, self.name, self.task_type)
    }
}

/// A task list as the backend knows it.
///
/// `range_id` is the fencing token: a delete only succeeds when it matches the
/// backend's current value for the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListInfo {
    pub domain_id: String,
    pub name: String,
    pub task_type: TaskListType,
    pub range_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl TaskListInfo {
    pub fn new(
        domain_id: impl Into<String>,
        name: impl Into<String>,
        task_type: TaskListType,
        range_id: i64,
    ) -> Self {
        Self {
            domain_id: domain_id.into(),
            name: name.into(),
            task_type,
            range_id,
            last_updated: None,
        }
    }

    pub fn key(&self) -> TaskListKey {
        TaskListKey::new(self.domain_id.clone(), self.name.clone(), self.task_type)
    }
}

/// A single work item inside a task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Ascending sequence number scoped to the owning task list.
    pub task_id: i64,
    pub domain_id: String,
    #[serde(default)]
    pub workflow_id: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub schedule_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(domain_id: impl Into<String>, task_id: i64) -> Self {
        Self {
            task_id,
            domain_id: domain_id.into(),
            workflow_id: String::new(),
            run_id: String::new(),
            schedule_id: 0,
            created_at: None,
        }
    }
}

/// A single task whose owning task list no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub domain_id: String,
    pub task_list_name: String,
    pub task_type: TaskListType,
    pub task_id: i64,
}

impl TaskRef {
    pub fn key(&self) -> TaskListKey {
        TaskListKey::new(self.domain_id.clone(), self.task_list_name.clone(), self.task_type)
    }

    /// The task list identity used when completing this task.
    ///
    /// The list record is gone, so the fencing token is irrelevant here.
    pub fn task_list(&self) -> TaskListInfo {
        TaskListInfo::new(self.domain_id.clone(), self.task_list_name.clone(), self.task_type, 0)
    }
}

/// One entry of the backend's reconciliation view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrphanCandidate {
    /// A task list without a live owner: drain it, then delete it.
    TaskList(TaskListInfo),
    /// A task left behind by a task list that is already gone.
    Task(TaskRef),
}

/// Opaque continuation marker for `list_task_list`.
///
/// Empty means "start of the space" when sent and "exhausted" when returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageToken(Vec<u8>);

impl PageToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn start() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// One page of `list_task_list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListPage {
    pub items: Vec<TaskListInfo>,
    pub next_page_token: PageToken,
}

impl TaskListPage {
    /// No further page exists after this one.
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_empty()
    }
}

//! PassReport - 1 回のパスの結果
//!
//! # 候補ごとの状態遷移
//! - Discovered → TasksDraining → Drained → Deleted
//! - Discovered / TasksDraining / Drained → Skipped（ドメイン名を解決できない）
//! - Drained → DeleteConflict（fencing 不一致 or すでに削除済み。エスカレーションしない）
//! - Drained → Failed（それ以外の削除エラー。呼び出し元に報告する）
//! - TasksDraining → Undrained（進捗なし or タスク数の上限。今回は削除しない）

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::domain::{BackendError, PassId, ScavengerError, TaskListInfo, TaskListKey, TaskListType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateState {
    Discovered,
    TasksDraining,
    Drained,
    Deleted,
    Skipped,
    DeleteConflict,
    Undrained,
    Failed,
}

impl CandidateState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CandidateState::Deleted
                | CandidateState::Skipped
                | CandidateState::DeleteConflict
                | CandidateState::Undrained
                | CandidateState::Failed
        )
    }

    pub fn can_transition_to(self, next: CandidateState) -> bool {
        use CandidateState::*;
        matches!(
            (self, next),
            (Discovered, TasksDraining)
                | (Discovered | TasksDraining | Drained, Skipped)
                | (TasksDraining, Drained | Undrained)
                | (Drained, Deleted | DeleteConflict | Failed)
        )
    }
}

/// What happened to one orphaned task list.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub task_list: TaskListKey,
    pub range_id: i64,
    pub state: CandidateState,
    pub tasks_completed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip)]
    pub(crate) escalation: Option<BackendError>,
}

impl CandidateReport {
    pub fn discovered(info: &TaskListInfo) -> Self {
        Self {
            task_list: info.key(),
            range_id: info.range_id,
            state: CandidateState::Discovered,
            tasks_completed: 0,
            detail: None,
            escalation: None,
        }
    }

    pub(crate) fn advance(&mut self, next: CandidateState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid candidate transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    pub(crate) fn advance_with(&mut self, next: CandidateState, detail: impl Into<String>) {
        self.advance(next);
        self.detail = Some(detail.into());
    }
}

/// A delete failure the pass could not treat as benign.
#[derive(Debug, Clone, Serialize)]
pub struct Escalation {
    pub task_list: TaskListKey,
    #[serde(serialize_with = "serialize_display")]
    pub error: BackendError,
}

fn serialize_display<S: Serializer>(
    error: &BackendError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Summary of the full `list_task_list` walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub pages: usize,
    pub task_lists: usize,
    pub decision_task_lists: usize,
    pub activity_task_lists: usize,
}

impl AuditReport {
    pub(crate) fn record_page(&mut self, items: &[TaskListInfo]) {
        self.pages += 1;
        for info in items {
            self.task_lists += 1;
            match info.task_type {
                TaskListType::Decision => self.decision_task_lists += 1,
                TaskListType::Activity => self.activity_task_lists += 1,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass_id: PassId,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub candidates: Vec<CandidateReport>,
    pub orphan_tasks_completed: usize,
    pub orphan_tasks_skipped: usize,
    pub escalations: Vec<Escalation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditReport>,
}

impl PassReport {
    pub fn new() -> Self {
        Self {
            pass_id: PassId::generate(),
            started_at: Utc::now(),
            finished_at: None,
            candidates: Vec::new(),
            orphan_tasks_completed: 0,
            orphan_tasks_skipped: 0,
            escalations: Vec::new(),
            audit: None,
        }
    }

    pub(crate) fn record(&mut self, mut candidate: CandidateReport) {
        if let Some(error) = candidate.escalation.take() {
            self.escalations.push(Escalation {
                task_list: candidate.task_list.clone(),
                error,
            });
        }
        self.candidates.push(candidate);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, state: CandidateState) -> usize {
        self.candidates.iter().filter(|c| c.state == state).count()
    }

    pub fn candidate(&self, key: &TaskListKey) -> Option<&CandidateReport> {
        self.candidates.iter().find(|c| &c.task_list == key)
    }

    /// Tasks completed across all drained task lists.
    pub fn tasks_completed(&self) -> usize {
        self.candidates.iter().map(|c| c.tasks_completed).sum()
    }

    /// `Err(ScavengerError::Escalated)` when any delete failed hard.
    pub fn into_result(self) -> Result<Self, ScavengerError> {
        if self.escalations.is_empty() {
            return Ok(self);
        }
        Err(ScavengerError::Escalated(
            self.escalations
                .into_iter()
                .map(|e| (e.task_list, e.error))
                .collect(),
        ))
    }
}

impl Default for PassReport {
    fn default() -> Self {
        Self::new()
    }
}

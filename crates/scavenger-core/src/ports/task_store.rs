//! TaskListStore port - タスクリストを保持する永続化レイヤー
//!
//! スキャベンジャーはバックエンドの内部構造（データレイアウト、整合性モデル、
//! page token のエンコード）を知りません。このリクエスト/レスポンス契約だけを
//! 通して読み書きします。

use async_trait::async_trait;

use crate::domain::{
    BackendError, OrphanCandidate, PageToken, Task, TaskListInfo, TaskListPage, TaskListType,
};

/// Read level meaning "before the first task".
pub const READ_LEVEL_START: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTaskListRequest {
    pub page_size: usize,
    pub page_token: PageToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOrphanTasksRequest {
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTasksRequest {
    pub domain_id: String,
    pub domain_name: String,
    pub task_list: String,
    pub task_type: TaskListType,
    /// Exclusive lower bound on task ids.
    pub read_level: i64,
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteTaskRequest {
    pub task_list: TaskListInfo,
    pub domain_name: String,
    pub task_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteTasksLessThanRequest {
    pub domain_id: String,
    pub domain_name: String,
    pub task_list: String,
    pub task_type: TaskListType,
    /// Exclusive upper bound on task ids.
    pub task_id: i64,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTaskListRequest {
    pub domain_id: String,
    pub domain_name: String,
    pub task_list: String,
    pub task_type: TaskListType,
    /// Fencing token; must equal the stored value.
    pub range_id: i64,
}

/// TaskListStore はタスクリストとタスクの正本（source of truth）
///
/// # 契約
/// - `complete_*` は冪等（完了済みタスクの完了は no-op）
/// - `delete_task_list` は `range_id` で fencing され、不一致は
///   [`BackendError::ConditionFailed`] になる
/// - 実装は `Send + Sync`（複数のタスクから共有される前提）
#[async_trait]
pub trait TaskListStore: Send + Sync {
    async fn list_task_list(
        &self,
        request: ListTaskListRequest,
    ) -> Result<TaskListPage, BackendError>;

    async fn get_orphan_tasks(
        &self,
        request: GetOrphanTasksRequest,
    ) -> Result<Vec<OrphanCandidate>, BackendError>;

    /// Tasks with `task_id > read_level`, ascending, at most `batch_size`.
    async fn get_tasks(&self, request: GetTasksRequest) -> Result<Vec<Task>, BackendError>;

    async fn complete_task(&self, request: CompleteTaskRequest) -> Result<(), BackendError>;

    /// Returns the number of tasks removed.
    async fn complete_tasks_less_than(
        &self,
        request: CompleteTasksLessThanRequest,
    ) -> Result<usize, BackendError>;

    async fn delete_task_list(&self, request: DeleteTaskListRequest) -> Result<(), BackendError>;
}

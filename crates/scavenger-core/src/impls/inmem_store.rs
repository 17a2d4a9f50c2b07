//! InMemoryTaskListStore - 開発・テスト用の永続化バックエンド
//!
//! # 学習ポイント
//! - tokio::sync::Mutex で状態を守る（ロックを跨いで await しない）
//! - fencing token（range_id）による楽観的排他制御
//! - オフセットを詰めただけの page token（呼び出し側からは不透明）
//! - テスト用のフォールト注入（`inject_fault`）と呼び出し履歴（`calls`）
//! - 遅いバックエンドの再現（`set_latency`）。sleep 中はロックを持たない

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    BackendError, OrphanCandidate, PageToken, Task, TaskListInfo, TaskListKey, TaskListPage,
    TaskRef,
};
use crate::ports::{
    CompleteTaskRequest, CompleteTasksLessThanRequest, DeleteTaskListRequest,
    GetOrphanTasksRequest, GetTasksRequest, ListTaskListRequest, TaskListStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListTaskList,
    GetOrphanTasks,
    GetTasks,
    CompleteTask,
    CompleteTasksLessThan,
    DeleteTaskList,
}

/// One recorded call, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListTaskList {
        page_size: usize,
        page_token: PageToken,
    },
    GetOrphanTasks {
        limit: usize,
    },
    GetTasks {
        task_list: TaskListKey,
        domain_name: String,
        batch_size: usize,
    },
    CompleteTask {
        task_list: TaskListKey,
        domain_name: String,
        task_id: i64,
    },
    CompleteTasksLessThan {
        task_list: TaskListKey,
        domain_name: String,
        task_id: i64,
        limit: usize,
    },
    DeleteTaskList {
        task_list: TaskListKey,
        domain_name: String,
        range_id: i64,
    },
}

impl StoreCall {
    pub fn op(&self) -> StoreOp {
        match self {
            StoreCall::ListTaskList { .. } => StoreOp::ListTaskList,
            StoreCall::GetOrphanTasks { .. } => StoreOp::GetOrphanTasks,
            StoreCall::GetTasks { .. } => StoreOp::GetTasks,
            StoreCall::CompleteTask { .. } => StoreOp::CompleteTask,
            StoreCall::CompleteTasksLessThan { .. } => StoreOp::CompleteTasksLessThan,
            StoreCall::DeleteTaskList { .. } => StoreOp::DeleteTaskList,
        }
    }
}

struct Fault {
    error: BackendError,
    remaining: usize,
}

#[derive(Default)]
struct InMemoryState {
    task_lists: BTreeMap<TaskListKey, TaskListInfo>,

    /// Tasks by owning key. A key may have tasks without a task list record.
    tasks: BTreeMap<TaskListKey, BTreeMap<i64, Task>>,

    /// Task lists the reconciliation view reports as ownerless.
    orphaned: BTreeSet<TaskListKey>,

    faults: HashMap<StoreOp, VecDeque<Fault>>,
    latency: HashMap<StoreOp, Duration>,
    calls: Vec<StoreCall>,
}

impl InMemoryState {
    /// Record the call, then fail it if a fault is scheduled for its op.
    fn enter(&mut self, call: StoreCall) -> Result<(), BackendError> {
        let op = call.op();
        self.calls.push(call);

        let Some(queue) = self.faults.get_mut(&op) else {
            return Ok(());
        };
        let Some(front) = queue.front_mut() else {
            return Ok(());
        };
        let error = front.error.clone();
        front.remaining -= 1;
        if front.remaining == 0 {
            queue.pop_front();
        }
        Err(error)
    }

    fn orphan_candidates(&self, limit: usize) -> Vec<OrphanCandidate> {
        let lists = self
            .orphaned
            .iter()
            .filter_map(|key| self.task_lists.get(key))
            .cloned()
            .map(OrphanCandidate::TaskList);

        let stray_tasks = self
            .tasks
            .iter()
            .filter(|(key, _)| !self.task_lists.contains_key(*key))
            .flat_map(|(key, tasks)| {
                tasks.keys().map(move |task_id| {
                    OrphanCandidate::Task(TaskRef {
                        domain_id: key.domain_id.clone(),
                        task_list_name: key.name.clone(),
                        task_type: key.task_type,
                        task_id: *task_id,
                    })
                })
            });

        lists.chain(stray_tasks).take(limit).collect()
    }
}

fn key_of(domain_id: &str, name: &str, task_type: crate::domain::TaskListType) -> TaskListKey {
    TaskListKey::new(domain_id, name, task_type)
}

fn decode_offset(token: &PageToken) -> Result<usize, BackendError> {
    if token.is_empty() {
        return Ok(0);
    }
    let bytes: [u8; 8] = token
        .as_bytes()
        .try_into()
        .map_err(|_| BackendError::Internal("malformed page token".to_string()))?;
    Ok(u64::from_be_bytes(bytes) as usize)
}

fn encode_offset(offset: usize) -> PageToken {
    PageToken::new((offset as u64).to_be_bytes().to_vec())
}

pub struct InMemoryTaskListStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryTaskListStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InMemoryState::default()),
        }
    }

    /// Insert or replace a task list record.
    pub async fn insert_task_list(&self, info: TaskListInfo) {
        let mut state = self.state.lock().await;
        state.task_lists.insert(info.key(), info);
    }

    pub async fn insert_tasks(&self, key: &TaskListKey, task_ids: impl IntoIterator<Item = i64>) {
        let mut state = self.state.lock().await;
        let tasks = state.tasks.entry(key.clone()).or_default();
        for task_id in task_ids {
            tasks.insert(task_id, Task::new(key.domain_id.clone(), task_id));
        }
    }

    pub async fn insert_task(&self, key: &TaskListKey, task: Task) {
        let mut state = self.state.lock().await;
        state.tasks.entry(key.clone()).or_default().insert(task.task_id, task);
    }

    /// Make the reconciliation view report this task list as ownerless.
    pub async fn mark_orphaned(&self, key: &TaskListKey) {
        self.state.lock().await.orphaned.insert(key.clone());
    }

    /// Simulate the owner reacquiring the list. Returns the new token.
    pub async fn bump_range_id(&self, key: &TaskListKey) -> Option<i64> {
        let mut state = self.state.lock().await;
        let info = state.task_lists.get_mut(key)?;
        info.range_id += 1;
        Some(info.range_id)
    }

    pub async fn task_list(&self, key: &TaskListKey) -> Option<TaskListInfo> {
        self.state.lock().await.task_lists.get(key).cloned()
    }

    pub async fn task_ids(&self, key: &TaskListKey) -> Vec<i64> {
        let state = self.state.lock().await;
        state
            .tasks
            .get(key)
            .map(|tasks| tasks.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Fail the next `times` calls of `op` with `error`.
    ///
    /// Faults for the same op are consumed in the order they were injected.
    pub async fn inject_fault(&self, op: StoreOp, error: BackendError, times: usize) {
        if times == 0 {
            return;
        }
        let mut state = self.state.lock().await;
        state.faults.entry(op).or_default().push_back(Fault {
            error,
            remaining: times,
        });
    }

    /// Delay every later call of `op` by `latency` before it runs.
    pub async fn set_latency(&self, op: StoreOp, latency: Duration) {
        self.state.lock().await.latency.insert(op, latency);
    }

    async fn simulate_latency(&self, op: StoreOp) {
        let latency = self.state.lock().await.latency.get(&op).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_count(&self, op: StoreOp) -> usize {
        let state = self.state.lock().await;
        state.calls.iter().filter(|c| c.op() == op).count()
    }
}

impl Default for InMemoryTaskListStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskListStore for InMemoryTaskListStore {
    async fn list_task_list(
        &self,
        request: ListTaskListRequest,
    ) -> Result<TaskListPage, BackendError> {
        self.simulate_latency(StoreOp::ListTaskList).await;
        let mut state = self.state.lock().await;
        state.enter(StoreCall::ListTaskList {
            page_size: request.page_size,
            page_token: request.page_token.clone(),
        })?;

        let offset = decode_offset(&request.page_token)?;
        let items: Vec<TaskListInfo> = state
            .task_lists
            .values()
            .skip(offset)
            .take(request.page_size)
            .cloned()
            .collect();
        let next = offset + items.len();
        let next_page_token = if next < state.task_lists.len() {
            encode_offset(next)
        } else {
            PageToken::start()
        };
        Ok(TaskListPage {
            items,
            next_page_token,
        })
    }

    async fn get_orphan_tasks(
        &self,
        request: GetOrphanTasksRequest,
    ) -> Result<Vec<OrphanCandidate>, BackendError> {
        self.simulate_latency(StoreOp::GetOrphanTasks).await;
        let mut state = self.state.lock().await;
        state.enter(StoreCall::GetOrphanTasks {
            limit: request.limit,
        })?;
        Ok(state.orphan_candidates(request.limit))
    }

    async fn get_tasks(&self, request: GetTasksRequest) -> Result<Vec<Task>, BackendError> {
        self.simulate_latency(StoreOp::GetTasks).await;
        let key = key_of(&request.domain_id, &request.task_list, request.task_type);
        let mut state = self.state.lock().await;
        state.enter(StoreCall::GetTasks {
            task_list: key.clone(),
            domain_name: request.domain_name,
            batch_size: request.batch_size,
        })?;

        let Some(tasks) = state.tasks.get(&key) else {
            return Ok(Vec::new());
        };
        Ok(tasks
            .range(request.read_level.saturating_add(1)..)
            .take(request.batch_size)
            .map(|(_, task)| task.clone())
            .collect())
    }

    async fn complete_task(&self, request: CompleteTaskRequest) -> Result<(), BackendError> {
        self.simulate_latency(StoreOp::CompleteTask).await;
        let key = request.task_list.key();
        let mut state = self.state.lock().await;
        state.enter(StoreCall::CompleteTask {
            task_list: key.clone(),
            domain_name: request.domain_name,
            task_id: request.task_id,
        })?;

        if let Some(tasks) = state.tasks.get_mut(&key) {
            tasks.remove(&request.task_id);
            if tasks.is_empty() {
                state.tasks.remove(&key);
            }
        }
        Ok(())
    }

    async fn complete_tasks_less_than(
        &self,
        request: CompleteTasksLessThanRequest,
    ) -> Result<usize, BackendError> {
        self.simulate_latency(StoreOp::CompleteTasksLessThan).await;
        let key = key_of(&request.domain_id, &request.task_list, request.task_type);
        let mut state = self.state.lock().await;
        state.enter(StoreCall::CompleteTasksLessThan {
            task_list: key.clone(),
            domain_name: request.domain_name,
            task_id: request.task_id,
            limit: request.limit,
        })?;

        let Some(tasks) = state.tasks.get_mut(&key) else {
            return Ok(0);
        };
        let doomed: Vec<i64> = tasks
            .range(..request.task_id)
            .take(request.limit)
            .map(|(id, _)| *id)
            .collect();
        for task_id in &doomed {
            tasks.remove(task_id);
        }
        if tasks.is_empty() {
            state.tasks.remove(&key);
        }
        Ok(doomed.len())
    }

    async fn delete_task_list(&self, request: DeleteTaskListRequest) -> Result<(), BackendError> {
        self.simulate_latency(StoreOp::DeleteTaskList).await;
        let key = key_of(&request.domain_id, &request.task_list, request.task_type);
        let mut state = self.state.lock().await;
        state.enter(StoreCall::DeleteTaskList {
            task_list: key.clone(),
            domain_name: request.domain_name,
            range_id: request.range_id,
        })?;

        let Some(current) = state.task_lists.get(&key) else {
            return Err(BackendError::NotFound(format!("task list {key}")));
        };
        if current.range_id != request.range_id {
            return Err(BackendError::ConditionFailed(format!(
                "task list {key}: range id {} does not match {}",
                request.range_id, current.range_id
            )));
        }
        state.task_lists.remove(&key);
        state.orphaned.remove(&key);
        Ok(())
    }
}

//! Errors - エラー型と分類
//!
//! # 分類
//! - [`BackendError`]: 永続化レイヤーが返すエラー。リトライ判定はこの形で行う
//! - [`DomainCacheError`]: ドメイン名解決の失敗（リトライしない）
//! - [`ScavengerError`]: スキャベンジャーの操作が呼び出し元に返すエラー
//! - [`CompletionError`]: 部分的な進捗を伴う `complete_tasks_less_than` の失敗

use thiserror::Error;

use super::task_list::TaskListKey;

/// Errors surfaced by the persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Server temporarily overloaded; safe to retry.
    #[error("service busy: {0}")]
    ServiceBusy(String),

    /// The fencing token did not match the backend's current value.
    #[error("condition failed: {0}")]
    ConditionFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The backend completed some tasks before failing.
    #[error("completed {completed} tasks before failing: {source}")]
    PartialCompletion {
        completed: usize,
        #[source]
        source: Box<BackendError>,
    },

    /// The call was abandoned because the scavenger is stopping.
    #[error("operation cancelled")]
    Cancelled,

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("internal backend error: {0}")]
    Internal(String),
}

impl BackendError {
    /// The only shape the bounded delete policy retries.
    pub fn is_service_busy(&self) -> bool {
        matches!(self, BackendError::ServiceBusy(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainCacheError {
    #[error("domain not found: {0}")]
    NotFound(String),

    #[error("domain cache unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by scavenger operations and passes.
#[derive(Debug, Error)]
pub enum ScavengerError {
    #[error("failed to resolve domain name: {0}")]
    DomainResolution(#[from] DomainCacheError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("scavenger is not running")]
    NotRunning,

    /// Delete failures that a pass could not treat as benign.
    #[error("{} task list deletion(s) failed: {}", .0.len(), first_escalation(.0))]
    Escalated(Vec<(TaskListKey, BackendError)>),
}

fn first_escalation(escalations: &[(TaskListKey, BackendError)]) -> String {
    escalations
        .first()
        .map(|(key, err)| format!("{key}: {err}"))
        .unwrap_or_default()
}

/// `complete_tasks_less_than` failed after completing `completed` tasks.
///
/// `completed` is a low-water mark of guaranteed progress.
#[derive(Debug, Error)]
#[error("completed {completed} tasks before failing: {source}")]
pub struct CompletionError {
    pub completed: usize,
    #[source]
    pub source: ScavengerError,
}

//! Ports - 抽象化レイヤー
//!
//! スキャベンジャーが依存する外部システムへのインターフェースです。
//!
//! - **TaskListStore**: タスクリストとタスクを保持する永続化バックエンド
//! - **DomainCache**: domain ID → ドメイン名の解決

pub mod domain_cache;
pub mod task_store;

pub use self::domain_cache::DomainCache;
pub use self::task_store::{
    CompleteTaskRequest, CompleteTasksLessThanRequest, DeleteTaskListRequest,
    GetOrphanTasksRequest, GetTasksRequest, ListTaskListRequest, READ_LEVEL_START, TaskListStore,
};

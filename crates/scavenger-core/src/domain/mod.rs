//! Domain model (task lists, tasks, orphan candidates, errors, ids).

pub mod errors;
pub mod ids;
pub mod task_list;

pub use self::errors::{BackendError, CompletionError, DomainCacheError, ScavengerError};
pub use self::ids::{Id, PassId};
pub use self::task_list::{
    OrphanCandidate, PageToken, Task, TaskListInfo, TaskListKey, TaskListPage, TaskListType,
    TaskRef,
};

//! Reclaim operations: one wrapped backend call each.
//!
//! Queue-scoped operations resolve the domain name first; a resolution failure
//! is returned immediately and never retried. Completion, fetch and listing
//! calls are idempotent and run under the retry-forever policy. Deletes are
//! fenced and only retry on `ServiceBusy`.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tracing::debug;

use super::scavenger::Scavenger;
use crate::domain::{
    BackendError, CompletionError, OrphanCandidate, PageToken, ScavengerError, Task,
    TaskListInfo, TaskListPage,
};
use crate::ports::{
    CompleteTaskRequest, CompleteTasksLessThanRequest, DeleteTaskListRequest,
    GetOrphanTasksRequest, GetTasksRequest, ListTaskListRequest, READ_LEVEL_START,
};

/// Outcome of a fenced delete that did not hit a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// The fencing token no longer matches; the list is live again or was recreated.
    Conflict,
    /// Someone else already deleted it.
    NotFound,
}

impl Scavenger {
    /// Completes up to `limit` tasks with ids strictly below `task_id`.
    ///
    /// On failure the error still carries the number of tasks completed.
    pub async fn complete_tasks_less_than(
        &self,
        info: &TaskListInfo,
        task_id: i64,
        limit: usize,
    ) -> Result<usize, CompletionError> {
        let domain_name = self.domain_name(&info.domain_id).map_err(|source| CompletionError {
            completed: 0,
            source,
        })?;
        let request = CompleteTasksLessThanRequest {
            domain_id: info.domain_id.clone(),
            domain_name,
            task_list: info.name.clone(),
            task_type: info.task_type,
            task_id,
            limit,
        };

        let store = self.store.as_ref();
        let completed = AtomicUsize::new(0);
        let result = self
            .retry_forever(|| {
                let request = request.clone();
                let completed = &completed;
                async move {
                    match store.complete_tasks_less_than(request).await {
                        Ok(n) => {
                            completed.fetch_add(n, Ordering::Relaxed);
                            Ok(())
                        }
                        Err(BackendError::PartialCompletion { completed: n, source }) => {
                            completed.fetch_add(n, Ordering::Relaxed);
                            Err(*source)
                        }
                        Err(err) => Err(err),
                    }
                }
            })
            .await;

        let completed = completed.into_inner();
        debug!(task_list = %info.key(), task_id, completed, "completed tasks");
        match result {
            Ok(()) => Ok(completed),
            Err(err) => Err(CompletionError {
                completed,
                source: err.into(),
            }),
        }
    }

    pub async fn complete_task(
        &self,
        info: &TaskListInfo,
        task_id: i64,
    ) -> Result<(), ScavengerError> {
        let domain_name = self.domain_name(&info.domain_id)?;
        let request = CompleteTaskRequest {
            task_list: info.clone(),
            domain_name,
            task_id,
        };
        let store = self.store.as_ref();
        self.retry_forever(|| store.complete_task(request.clone())).await?;
        Ok(())
    }

    /// The first `batch_size` tasks of the list, ascending by id.
    pub async fn get_tasks(
        &self,
        info: &TaskListInfo,
        batch_size: usize,
    ) -> Result<Vec<Task>, ScavengerError> {
        let domain_name = self.domain_name(&info.domain_id)?;
        let request = GetTasksRequest {
            domain_id: info.domain_id.clone(),
            domain_name,
            task_list: info.name.clone(),
            task_type: info.task_type,
            read_level: READ_LEVEL_START,
            batch_size,
        };
        let store = self.store.as_ref();
        Ok(self.retry_forever(|| store.get_tasks(request.clone())).await?)
    }

    pub async fn get_orphan_tasks(
        &self,
        limit: usize,
    ) -> Result<Vec<OrphanCandidate>, ScavengerError> {
        let store = self.store.as_ref();
        let request = GetOrphanTasksRequest { limit };
        Ok(self
            .retry_forever(|| store.get_orphan_tasks(request.clone()))
            .await?)
    }

    pub async fn list_task_list(
        &self,
        page_size: usize,
        page_token: PageToken,
    ) -> Result<TaskListPage, ScavengerError> {
        let store = self.store.as_ref();
        let request = ListTaskListRequest {
            page_size,
            page_token,
        };
        Ok(self
            .retry_forever(|| store.list_task_list(request.clone()))
            .await?)
    }

    /// Deletes the task list record, fenced by `info.range_id`.
    ///
    /// Conflict and not-found are ordinary outcomes, not errors.
    pub async fn delete_task_list(
        &self,
        info: &TaskListInfo,
    ) -> Result<DeleteOutcome, ScavengerError> {
        let domain_name = self.domain_name(&info.domain_id)?;
        let request = DeleteTaskListRequest {
            domain_id: info.domain_id.clone(),
            domain_name,
            task_list: info.name.clone(),
            task_type: info.task_type,
            range_id: info.range_id,
        };
        let store = self.store.as_ref();
        match self.delete_retry(|| store.delete_task_list(request.clone())).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(BackendError::ConditionFailed(_)) => Ok(DeleteOutcome::Conflict),
            Err(BackendError::NotFound(_)) => Ok(DeleteOutcome::NotFound),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::app::ScavengerConfig;
    use crate::domain::{DomainCacheError, TaskListType};
    use crate::impls::{InMemoryTaskListStore, StaticDomainCache, StoreCall, StoreOp};

    struct Fixture {
        store: Arc<InMemoryTaskListStore>,
        domains: Arc<StaticDomainCache>,
        scavenger: Arc<Scavenger>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryTaskListStore::new());
        let domains = Arc::new(StaticDomainCache::new());
        domains.insert("d1", "tenant-one");
        let scavenger = Arc::new(Scavenger::new(
            store.clone(),
            domains.clone(),
            ScavengerConfig::default(),
        ));
        scavenger.start();
        Fixture {
            store,
            domains,
            scavenger,
        }
    }

    fn q1() -> TaskListInfo {
        TaskListInfo::new("d1", "q1", TaskListType::Activity, 5)
    }

    #[tokio::test(start_paused = true)]
    async fn complete_tasks_less_than_is_idempotent() {
        let f = fixture();
        f.store.insert_task_list(q1()).await;
        f.store.insert_tasks(&q1().key(), [10, 11, 12]).await;

        let first = f.scavenger.complete_tasks_less_than(&q1(), 13, 16).await.unwrap();
        assert_eq!(first, 3);
        let second = f.scavenger.complete_tasks_less_than(&q1(), 13, 16).await.unwrap();
        assert_eq!(second, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_tasks_less_than_passes_resolved_domain_name() {
        let f = fixture();
        f.store.insert_task_list(q1()).await;
        f.store.insert_tasks(&q1().key(), [1, 2, 3, 4]).await;

        let completed = f.scavenger.complete_tasks_less_than(&q1(), 3, 16).await.unwrap();
        assert_eq!(completed, 2);
        assert_eq!(f.store.task_ids(&q1().key()).await, vec![3, 4]);

        let calls = f.store.calls().await;
        assert_eq!(
            calls.last(),
            Some(&StoreCall::CompleteTasksLessThan {
                task_list: q1().key(),
                domain_name: "tenant-one".into(),
                task_id: 3,
                limit: 16,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn complete_tasks_less_than_retries_transient_errors() {
        let f = fixture();
        f.store.insert_tasks(&q1().key(), [1, 2]).await;
        f.store
            .inject_fault(
                StoreOp::CompleteTasksLessThan,
                BackendError::Unavailable("down".into()),
                3,
            )
            .await;

        let completed = f.scavenger.complete_tasks_less_than(&q1(), 100, 16).await.unwrap();
        assert_eq!(completed, 2);
        assert_eq!(f.store.call_count(StoreOp::CompleteTasksLessThan).await, 4);
    }

    fn partial(completed: usize) -> BackendError {
        BackendError::PartialCompletion {
            completed,
            source: Box::new(BackendError::Internal("disk".into())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn partial_progress_accumulates_across_retries() {
        let f = fixture();
        f.store.insert_tasks(&q1().key(), [1, 2]).await;
        f.store.inject_fault(StoreOp::CompleteTasksLessThan, partial(7), 1).await;

        let completed = f.scavenger.complete_tasks_less_than(&q1(), 100, 16).await.unwrap();
        assert_eq!(completed, 7 + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_progress_survives_terminal_failure() {
        let f = fixture();
        f.store.inject_fault(StoreOp::CompleteTasksLessThan, partial(7), 1).await;
        f.store
            .inject_fault(
                StoreOp::CompleteTasksLessThan,
                BackendError::Unavailable("down".into()),
                usize::MAX,
            )
            .await;

        let scavenger = f.scavenger.clone();
        let handle =
            tokio::spawn(async move { scavenger.complete_tasks_less_than(&q1(), 100, 16).await });
        tokio::time::sleep(Duration::from_secs(10)).await;
        f.scavenger.stop();

        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.completed, 7);
        assert!(matches!(
            err.source,
            ScavengerError::Backend(BackendError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_domain_is_not_retried() {
        let f = fixture();
        f.domains.remove("d1");

        let err = f.scavenger.get_tasks(&q1(), 16).await.unwrap_err();
        assert!(matches!(
            err,
            ScavengerError::DomainResolution(DomainCacheError::NotFound(_))
        ));
        let err = f.scavenger.complete_task(&q1(), 1).await.unwrap_err();
        assert!(matches!(err, ScavengerError::DomainResolution(_)));
        let err = f.scavenger.complete_tasks_less_than(&q1(), 1, 1).await.unwrap_err();
        assert_eq!(err.completed, 0);
        assert!(matches!(err.source, ScavengerError::DomainResolution(_)));
        let err = f.scavenger.delete_task_list(&q1()).await.unwrap_err();
        assert!(matches!(err, ScavengerError::DomainResolution(_)));

        assert!(f.store.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn get_tasks_reads_from_start_in_order() {
        let f = fixture();
        f.store.insert_tasks(&q1().key(), [30, 10, 20]).await;

        let tasks = f.scavenger.get_tasks(&q1(), 2).await.unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.task_id).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_task_removes_single_task() {
        let f = fixture();
        f.store.insert_tasks(&q1().key(), [1, 2, 3]).await;

        f.scavenger.complete_task(&q1(), 2).await.unwrap();
        assert_eq!(f.store.task_ids(&q1().key()).await, vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_succeeds_with_matching_token() {
        let f = fixture();
        f.store.insert_task_list(q1()).await;

        let outcome = f.scavenger.delete_task_list(&q1()).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(f.store.task_list(&q1().key()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_with_stale_token_is_conflict_without_retry() {
        let f = fixture();
        f.store.insert_task_list(q1()).await;
        f.store.bump_range_id(&q1().key()).await;

        let outcome = f.scavenger.delete_task_list(&q1()).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Conflict);
        assert_eq!(f.store.call_count(StoreOp::DeleteTaskList).await, 1);
        assert!(f.store.task_list(&q1().key()).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_of_missing_list_is_not_found() {
        let f = fixture();
        let outcome = f.scavenger.delete_task_list(&q1()).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_retries_service_busy() {
        let f = fixture();
        f.store.insert_task_list(q1()).await;
        f.store
            .inject_fault(StoreOp::DeleteTaskList, BackendError::ServiceBusy("busy".into()), 20)
            .await;

        let started = tokio::time::Instant::now();
        let outcome = f.scavenger.delete_task_list(&q1()).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(f.store.call_count(StoreOp::DeleteTaskList).await, 21);
        // Long enough to have hit the 30s ceiling several times.
        assert!(started.elapsed() > Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_escalates_other_errors_immediately() {
        let f = fixture();
        f.store.insert_task_list(q1()).await;
        f.store
            .inject_fault(StoreOp::DeleteTaskList, BackendError::Internal("corrupt".into()), 1)
            .await;

        let err = f.scavenger.delete_task_list(&q1()).await.unwrap_err();
        assert!(matches!(err, ScavengerError::Backend(BackendError::Internal(_))));
        assert_eq!(f.store.call_count(StoreOp::DeleteTaskList).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_retry_forever_loop() {
        let f = fixture();
        f.store
            .inject_fault(
                StoreOp::GetOrphanTasks,
                BackendError::Unavailable("down".into()),
                usize::MAX,
            )
            .await;

        let scavenger = f.scavenger.clone();
        let handle = tokio::spawn(async move { scavenger.get_orphan_tasks(10).await });

        tokio::time::sleep(Duration::from_secs(120)).await;
        let attempts_before_stop = f.store.call_count(StoreOp::GetOrphanTasks).await;
        assert!(attempts_before_stop > 1);

        f.scavenger.stop();
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ScavengerError::Backend(BackendError::Unavailable(_))));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(
            f.store.call_count(StoreOp::GetOrphanTasks).await,
            attempts_before_stop
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_lets_the_call_in_flight_finish() {
        let f = fixture();
        f.store.insert_task_list(q1()).await;
        f.store.mark_orphaned(&q1().key()).await;
        f.store
            .set_latency(StoreOp::GetOrphanTasks, Duration::from_secs(5))
            .await;

        let scavenger = f.scavenger.clone();
        let handle = tokio::spawn(async move { scavenger.get_orphan_tasks(10).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(f.scavenger.stop());
        assert!(!handle.is_finished());

        let candidates = handle.await.unwrap().unwrap();
        assert_eq!(candidates, vec![OrphanCandidate::TaskList(q1())]);
        assert_eq!(f.store.call_count(StoreOp::GetOrphanTasks).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn list_task_list_follows_tokens() {
        let f = fixture();
        for i in 0..5 {
            f.store
                .insert_task_list(TaskListInfo::new(
                    "d1",
                    format!("q{i}"),
                    TaskListType::Decision,
                    1,
                ))
                .await;
        }

        let first = f.scavenger.list_task_list(2, PageToken::start()).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(!first.is_last());
        let second = f.scavenger.list_task_list(2, first.next_page_token).await.unwrap();
        assert_eq!(second.items[0].name, "q2");
    }
}

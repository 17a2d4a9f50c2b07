//! One reclamation pass: orphan discovery through deletion.
//!
//! The backend's orphan view is authoritative; the pass never infers orphan
//! status from queue contents. Within a task list, completions go out in
//! increasing id order and a delete is only attempted after a fetch came back
//! empty.

use tracing::{debug, info, warn};

use super::reclaim::DeleteOutcome;
use super::report::{AuditReport, CandidateReport, CandidateState, PassReport};
use super::scavenger::Scavenger;
use crate::domain::{CompletionError, OrphanCandidate, ScavengerError, TaskListInfo, TaskRef};

impl Scavenger {
    /// Runs one pass over the backend's orphan candidates.
    ///
    /// Per-candidate failures are isolated and recorded in the report.
    /// Enumeration that ends because the scavenger stopped returns `Err`.
    pub async fn run_pass(&self) -> Result<PassReport, ScavengerError> {
        if !self.alive() {
            return Err(ScavengerError::NotRunning);
        }

        let mut report = PassReport::new();
        info!(pass_id = %report.pass_id, "starting reclamation pass");

        let candidates = self.get_orphan_tasks(self.config.orphan_batch_size).await?;
        debug!(
            pass_id = %report.pass_id,
            candidates = candidates.len(),
            "fetched orphan candidates"
        );

        for candidate in candidates {
            if !self.alive() {
                return Err(ScavengerError::NotRunning);
            }
            match candidate {
                OrphanCandidate::TaskList(info) => {
                    let candidate = self.reclaim_task_list(&info).await?;
                    debug_assert!(candidate.state.is_terminal());
                    report.record(candidate);
                }
                OrphanCandidate::Task(task) => self.reclaim_orphan_task(&task, &mut report).await?,
            }
        }

        if self.config.audit_task_lists {
            report.audit = Some(self.audit_task_lists().await?);
        }

        report.finish();
        info!(
            pass_id = %report.pass_id,
            deleted = report.count(CandidateState::Deleted),
            conflicts = report.count(CandidateState::DeleteConflict),
            skipped = report.count(CandidateState::Skipped),
            undrained = report.count(CandidateState::Undrained),
            tasks_completed = report.tasks_completed(),
            orphan_tasks_completed = report.orphan_tasks_completed,
            escalations = report.escalations.len(),
            "reclamation pass finished"
        );
        Ok(report)
    }

    /// Drains one orphaned task list and then deletes it.
    async fn reclaim_task_list(
        &self,
        info: &TaskListInfo,
    ) -> Result<CandidateReport, ScavengerError> {
        let key = info.key();
        let batch_size = self.config.task_batch_size;
        let mut candidate = CandidateReport::discovered(info);
        candidate.advance(CandidateState::TasksDraining);

        let drained = loop {
            let tasks = match self.get_tasks(info, batch_size).await {
                Ok(tasks) => tasks,
                Err(ScavengerError::DomainResolution(err)) => {
                    warn!(task_list = %key, error = %err, "skipping task list, domain unresolved");
                    candidate.advance_with(CandidateState::Skipped, err.to_string());
                    return Ok(candidate);
                }
                Err(err) => return Err(err),
            };

            let Some(max_task_id) = tasks.iter().map(|t| t.task_id).max() else {
                break true;
            };
            if candidate.tasks_completed >= self.config.max_tasks_per_task_list {
                debug!(
                    task_list = %key,
                    completed = candidate.tasks_completed,
                    "task budget reached"
                );
                break false;
            }

            match self.complete_through(info, max_task_id, batch_size).await {
                Ok(0) => {
                    debug!(task_list = %key, max_task_id, "no progress, treating as caught up");
                    break false;
                }
                Ok(completed) => candidate.tasks_completed += completed,
                Err(CompletionError { completed, source }) => {
                    candidate.tasks_completed += completed;
                    if let ScavengerError::DomainResolution(err) = source {
                        warn!(
                            task_list = %key,
                            error = %err,
                            "skipping task list, domain unresolved"
                        );
                        candidate.advance_with(CandidateState::Skipped, err.to_string());
                        return Ok(candidate);
                    }
                    warn!(
                        task_list = %key,
                        completed = candidate.tasks_completed,
                        error = %source,
                        "task completion stopped"
                    );
                    return Err(source);
                }
            }
        };

        if !drained {
            candidate.advance(CandidateState::Undrained);
            return Ok(candidate);
        }

        candidate.advance(CandidateState::Drained);
        match self.delete_task_list(info).await {
            Ok(DeleteOutcome::Deleted) => {
                info!(
                    task_list = %key,
                    range_id = info.range_id,
                    tasks_completed = candidate.tasks_completed,
                    "deleted task list"
                );
                candidate.advance(CandidateState::Deleted);
            }
            Ok(outcome) => {
                info!(
                    task_list = %key,
                    range_id = info.range_id,
                    ?outcome,
                    "task list delete lost the race"
                );
                let detail = match outcome {
                    DeleteOutcome::NotFound => "not found",
                    _ => "fencing token mismatch",
                };
                candidate.advance_with(CandidateState::DeleteConflict, detail);
            }
            Err(ScavengerError::DomainResolution(err)) => {
                warn!(task_list = %key, error = %err, "skipping task list, domain unresolved");
                candidate.advance_with(CandidateState::Skipped, err.to_string());
            }
            Err(ScavengerError::Backend(err)) if self.alive() => {
                warn!(task_list = %key, error = %err, "task list delete failed");
                candidate.advance_with(CandidateState::Failed, err.to_string());
                candidate.escalation = Some(err);
            }
            Err(err) => return Err(err),
        }
        Ok(candidate)
    }

    /// Completes every task with an id up to and including `max_task_id`.
    ///
    /// `i64::MAX` has no exclusive upper bound, so that task is completed on its own.
    async fn complete_through(
        &self,
        info: &TaskListInfo,
        max_task_id: i64,
        batch_size: usize,
    ) -> Result<usize, CompletionError> {
        if let Some(bound) = max_task_id.checked_add(1) {
            return self.complete_tasks_less_than(info, bound, batch_size).await;
        }

        let completed = self.complete_tasks_less_than(info, max_task_id, batch_size).await?;
        match self.complete_task(info, max_task_id).await {
            Ok(()) => Ok(completed + 1),
            Err(source) => Err(CompletionError { completed, source }),
        }
    }

    async fn reclaim_orphan_task(
        &self,
        task: &TaskRef,
        report: &mut PassReport,
    ) -> Result<(), ScavengerError> {
        match self.complete_task(&task.task_list(), task.task_id).await {
            Ok(()) => {
                debug!(task_list = %task.key(), task_id = task.task_id, "completed orphan task");
                report.orphan_tasks_completed += 1;
                Ok(())
            }
            Err(ScavengerError::DomainResolution(err)) => {
                warn!(
                    task_list = %task.key(),
                    task_id = task.task_id,
                    error = %err,
                    "skipping orphan task, domain unresolved"
                );
                report.orphan_tasks_skipped += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Walks every task list, following cursors to the end.
    pub async fn audit_task_lists(&self) -> Result<AuditReport, ScavengerError> {
        let mut audit = AuditReport::default();
        let mut pages = self.task_list_pages();
        while let Some(items) = pages.next_page().await? {
            audit.record_page(&items);
        }
        debug!(task_lists = audit.task_lists, pages = audit.pages, "audited task lists");
        Ok(audit)
    }
}

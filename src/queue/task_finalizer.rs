//! # Task Finalizer
//!
//! Applies worker-reported outcomes. Exactly one of `completed_at` and
//! `failed_at` must be set: completion is terminal, failure consumes the
//! retry budget and ends in `failed_retrying` or terminal `failed`. The
//! held lease is cleared either way.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{load_task_with_definition, stale_write_error};
use crate::clock::Clock;
use crate::constants::operations;
use crate::error::QueueResult;
use crate::logging::log_task_operation;
use crate::models::{Task, TaskOutcome};
use crate::state_machine::{TaskEvent, TaskStateMachine, TaskStatus};
use crate::store::QueueStore;

#[derive(Debug, Clone)]
pub struct TaskFinalizer {
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
}

impl TaskFinalizer {
    pub fn new(store: Arc<dyn QueueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Drive the lifecycle transition for a reported outcome.
    ///
    /// Rejected outcomes leave the task untouched.
    #[instrument(skip(self, outcome), fields(task_uuid = %task_uuid))]
    pub async fn report_outcome(&self, task_uuid: Uuid, outcome: &TaskOutcome) -> QueueResult<Task> {
        let (task, definition) = load_task_with_definition(self.store.as_ref(), task_uuid).await?;

        let plan = TaskStateMachine::new(&task, definition.max_attempts)
            .plan_outcome(outcome, self.clock.now())
            .inspect_err(|err| {
                warn!(status = %task.status, error = %err, "Outcome rejected");
            })?;

        let finalized = match self.store.transition(task_uuid, &plan).await? {
            Some(task) => task,
            None => return Err(stale_write_error(self.store.as_ref(), task_uuid).await),
        };

        let operation = match plan.event {
            TaskEvent::Complete => operations::COMPLETE,
            _ => operations::FAIL,
        };
        let details = (finalized.status == TaskStatus::FailedRetrying).then(|| {
            format!(
                "attempt {} of {}",
                finalized.attempts, definition.max_attempts
            )
        });

        log_task_operation(
            operation,
            Some(finalized.task_uuid),
            Some(&finalized.task_definition_name),
            finalized.status.as_str(),
            details.as_deref(),
        );
        info!(
            operation = operation,
            status = %finalized.status,
            attempts = finalized.attempts,
            "Task outcome recorded"
        );
        Ok(finalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ErrorKind;
    use crate::models::{DefinitionPolicy, NewTask, Priority, TaskDefinition};
    use crate::store::InMemoryQueueStore;
    use chrono::{Duration, Utc};

    async fn setup(max_attempts: i32) -> (Arc<InMemoryQueueStore>, Arc<ManualClock>, TaskFinalizer, Uuid) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryQueueStore::with_clock(clock.clone()));
        let definition = TaskDefinition::from_policy(
            "foo",
            &DefinitionPolicy::default().with_max_attempts(max_attempts),
            clock.now(),
        );
        store.upsert_definition(&definition).await.unwrap();
        let task = store
            .insert_task(&NewTask {
                task_uuid: Uuid::new_v4(),
                task_definition_name: "foo".to_string(),
                priority: Priority::Normal,
                unique_token: None,
                run_at: None,
                payload: None,
            })
            .await
            .unwrap();
        let finalizer = TaskFinalizer::new(store.clone(), clock.clone());
        (store, clock, finalizer, task.task_uuid)
    }

    async fn claim(store: &InMemoryQueueStore) -> Vec<Task> {
        store
            .claim_batch(&["foo".to_string()], "worker-1", 1)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_completion_is_terminal() {
        let (store, clock, finalizer, task_uuid) = setup(1).await;
        claim(&store).await;

        let reported_at = clock.now() - Duration::seconds(3);
        let done = finalizer
            .report_outcome(task_uuid, &TaskOutcome::completed(reported_at))
            .await
            .unwrap();

        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.completed_at, Some(reported_at));
        assert_eq!(done.failed_at, None);
        assert_eq!(done.worker_id, None);
        assert_eq!(done.lease_expires_at, None);
        assert!(claim(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_with_budget_retries() {
        let (store, clock, finalizer, task_uuid) = setup(2).await;
        claim(&store).await;

        let failed = finalizer
            .report_outcome(task_uuid, &TaskOutcome::failed(clock.now()))
            .await
            .unwrap();
        assert_eq!(failed.status, TaskStatus::FailedRetrying);

        let retried = claim(&store).await;
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].attempts, 2);
        assert_eq!(retried[0].failed_at, None);

        let exhausted = finalizer
            .report_outcome(task_uuid, &TaskOutcome::failed(clock.now()))
            .await
            .unwrap();
        assert_eq!(exhausted.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_conflicting_outcome_leaves_task_unchanged() {
        let (store, clock, finalizer, task_uuid) = setup(1).await;
        let before = claim(&store).await.remove(0);

        let outcome = TaskOutcome {
            completed_at: Some(clock.now()),
            failed_at: Some(clock.now()),
        };
        let err = finalizer.report_outcome(task_uuid, &outcome).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let after = store.get_task(task_uuid).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_outcome_on_queued_task_rejected() {
        let (_store, clock, finalizer, task_uuid) = setup(1).await;
        let err = finalizer
            .report_outcome(task_uuid, &TaskOutcome::completed(clock.now()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}

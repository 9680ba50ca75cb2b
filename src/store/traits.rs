//! # Queue Store Traits
//!
//! Storage capability the queue engine is built on. A provider must offer
//! one atomic primitive beyond plain reads and writes: select the top `limit`
//! eligible rows in claim order, skipping rows another in-flight claim holds,
//! and mark them in the same indivisible step ([`QueueStore::claim_batch`]).
//!
//! Every other mutation is a guarded compare-and-set
//! ([`QueueStore::transition`]) that returns `None` instead of overwriting a
//! row that changed since the caller read it.

use async_trait::async_trait;
use std::fmt::Debug;
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::models::{NewTask, Task, TaskDefinition, TaskFilter, TaskUpdate};
use crate::state_machine::{TaskEvent, TransitionPlan};

#[async_trait]
pub trait QueueStore: Send + Sync + Debug + 'static {
    /// Insert a definition; an existing name is a `Conflict`
    async fn insert_definition(&self, definition: &TaskDefinition) -> QueueResult<TaskDefinition>;

    /// Insert the definition unless the name exists, returning whichever row won
    async fn upsert_definition(&self, definition: &TaskDefinition) -> QueueResult<TaskDefinition>;

    /// Replace the policy fields of an existing definition
    async fn update_definition(
        &self,
        definition: &TaskDefinition,
    ) -> QueueResult<Option<TaskDefinition>>;

    async fn get_definition(&self, name: &str) -> QueueResult<Option<TaskDefinition>>;

    async fn list_definitions(&self) -> QueueResult<Vec<TaskDefinition>>;

    /// Insert a queued task. A `unique_token` already used by an active task
    /// of the same definition yields [`QueueError::unique_token_conflict`].
    async fn insert_task(&self, new_task: &NewTask) -> QueueResult<Task>;

    async fn get_task(&self, task_uuid: Uuid) -> QueueResult<Option<Task>>;

    async fn list_tasks(&self, filter: &TaskFilter) -> QueueResult<Vec<Task>>;

    /// Atomically select and mark up to `limit` eligible tasks for `worker_id`.
    ///
    /// Returned tasks are in claim order: priority rank, then `run_at`.
    async fn claim_batch(
        &self,
        definition_names: &[String],
        worker_id: &str,
        limit: i64,
    ) -> QueueResult<Vec<Task>>;

    /// Persist `plan` only if the row still matches its snapshot.
    async fn transition(&self, task_uuid: Uuid, plan: &TransitionPlan) -> QueueResult<Option<Task>>;

    /// Lease extension; a touch plan is an ordinary guarded transition.
    async fn extend_lease(
        &self,
        task_uuid: Uuid,
        plan: &TransitionPlan,
    ) -> QueueResult<Option<Task>> {
        if plan.event != TaskEvent::Touch {
            return Err(QueueError::Internal(format!(
                "extend_lease called with a {} plan",
                plan.event.event_type()
            )));
        }
        self.transition(task_uuid, plan).await
    }

    /// Update producer-owned fields of a `queued` or `failed_retrying` task
    async fn update_task_fields(
        &self,
        task_uuid: Uuid,
        update: &TaskUpdate,
    ) -> QueueResult<Option<Task>>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> QueueResult<bool>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

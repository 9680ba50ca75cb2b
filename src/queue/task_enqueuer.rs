//! # Task Enqueuer
//!
//! Producer-side entry point. Validates a typed [`EnqueueTaskRequest`],
//! resolves (or implicitly creates) its definition, enforces the priority
//! allow-list and inserts the task. Dedup collisions surface as `Conflict`.
//!
//! Also owns producer edits of a waiting task (`priority`, `run_at`,
//! `payload`).

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::registry::DefinitionRegistry;
use super::stale_write_error;
use crate::constants::operations;
use crate::error::{QueueError, QueueResult, ValidationErrors};
use crate::logging::log_task_operation;
use crate::models::{EnqueueTaskRequest, Priority, Task, TaskDefinition, TaskUpdate};
use crate::state_machine::TaskStatus;
use crate::store::QueueStore;
use crate::validation;

#[derive(Debug, Clone)]
pub struct TaskEnqueuer {
    store: Arc<dyn QueueStore>,
    registry: DefinitionRegistry,
}

fn check_priority(definition: &TaskDefinition, priority: Priority) -> QueueResult<()> {
    let mut errors = ValidationErrors::new();
    if !definition.allows_priority(priority) {
        errors.add(
            "priority",
            format!(
                "`{priority}` is not allowed for `{}`",
                definition.name
            ),
        );
    }
    errors.into_result()
}

impl TaskEnqueuer {
    pub fn new(store: Arc<dyn QueueStore>, registry: DefinitionRegistry) -> Self {
        Self { store, registry }
    }

    /// Create a `queued` task
    #[instrument(skip(self, request), fields(definition = %request.task_definition_name))]
    pub async fn enqueue(&self, request: EnqueueTaskRequest) -> QueueResult<Task> {
        request.validate().into_result()?;

        let priority = request.effective_priority();
        self.registry
            .ensure_definition(&request.task_definition_name, |definition| {
                check_priority(definition, priority)
            })
            .await?;

        let new_task = request.into_new_task();
        let task = match self.store.insert_task(&new_task).await {
            Ok(task) => task,
            Err(err @ QueueError::Conflict(_)) => {
                warn!(
                    unique_token = ?new_task.unique_token,
                    "Enqueue rejected: unique token held by an active task"
                );
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        log_task_operation(
            operations::ENQUEUE,
            Some(task.task_uuid),
            Some(&task.task_definition_name),
            task.status.as_str(),
            None,
        );
        Ok(task)
    }

    /// Change producer-owned fields of a task that is not held and not terminal.
    #[instrument(skip(self, update), fields(task_uuid = %task_uuid))]
    pub async fn update_task(&self, task_uuid: Uuid, update: &TaskUpdate) -> QueueResult<Task> {
        if let Some(payload) = &update.payload {
            validation::validate_payload(payload)?;
        }

        let task = self
            .store
            .get_task(task_uuid)
            .await?
            .ok_or(QueueError::TaskNotFound(task_uuid))?;

        if !matches!(task.status, TaskStatus::Queued | TaskStatus::FailedRetrying) {
            return Err(QueueError::InvalidState(format!(
                "Task {task_uuid} is {} and can no longer be edited",
                task.status
            )));
        }

        if let Some(priority) = update.priority {
            let definition = self
                .registry
                .get_definition(&task.task_definition_name)
                .await?;
            check_priority(&definition, priority)?;
        }

        let updated = match self.store.update_task_fields(task_uuid, update).await? {
            Some(task) => task,
            None => return Err(stale_write_error(self.store.as_ref(), task_uuid).await),
        };

        info!(
            operation = operations::UPDATE_TASK,
            priority = %updated.priority,
            run_at = %updated.run_at,
            "Task updated"
        );
        Ok(updated)
    }
}

//! # Lease Manager
//!
//! Cooperative hold management for claimed tasks:
//!
//! - `touch`: push `lease_expires_at` out to `now + extension`
//! - `release`: hand the task back to `queued` without consuming an attempt
//! - `dequeue`: forfeit the task permanently (terminal `dequeued`)
//!
//! Each operation plans its change through the lifecycle state machine and
//! persists it as a compare-and-set, so a lease that was reclaimed by another
//! worker in the meantime is rejected rather than overwritten.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use super::{load_task_with_definition, stale_write_error};
use crate::clock::Clock;
use crate::config::QueueSettings;
use crate::constants::operations;
use crate::error::QueueResult;
use crate::models::Task;
use crate::state_machine::TaskStateMachine;
use crate::store::QueueStore;
use crate::validation;

#[derive(Debug, Clone)]
pub struct LeaseManager {
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    settings: QueueSettings,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn QueueStore>, clock: Arc<dyn Clock>, settings: QueueSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Extend the lease of an `in_progress` task.
    #[instrument(skip(self), fields(task_uuid = %task_uuid))]
    pub async fn touch(&self, task_uuid: Uuid, extension_seconds: i64) -> QueueResult<Task> {
        validation::validate_touch_seconds(extension_seconds, self.settings.max_touch_seconds)?;

        let (task, definition) = load_task_with_definition(self.store.as_ref(), task_uuid).await?;
        let plan = TaskStateMachine::new(&task, definition.max_attempts)
            .plan_touch(extension_seconds, self.clock.now())?;

        let touched = match self.store.extend_lease(task_uuid, &plan).await? {
            Some(task) => task,
            None => return Err(stale_write_error(self.store.as_ref(), task_uuid).await),
        };

        info!(
            operation = operations::TOUCH,
            worker_id = ?touched.worker_id,
            lease_expires_at = ?touched.lease_expires_at,
            "Task lease extended"
        );
        Ok(touched)
    }

    /// Return an `in_progress` task to the queue; `attempts` is left as is.
    #[instrument(skip(self), fields(task_uuid = %task_uuid))]
    pub async fn release(&self, task_uuid: Uuid) -> QueueResult<Task> {
        let (task, definition) = load_task_with_definition(self.store.as_ref(), task_uuid).await?;
        let plan = TaskStateMachine::new(&task, definition.max_attempts)
            .plan_release(self.clock.now())?;

        let released = match self.store.transition(task_uuid, &plan).await? {
            Some(task) => task,
            None => return Err(stale_write_error(self.store.as_ref(), task_uuid).await),
        };

        info!(
            operation = operations::RELEASE,
            previous_worker = ?task.worker_id,
            attempts = released.attempts,
            "Task released back to queue"
        );
        Ok(released)
    }

    /// Permanently forfeit a non-terminal task.
    #[instrument(skip(self), fields(task_uuid = %task_uuid))]
    pub async fn dequeue(&self, task_uuid: Uuid) -> QueueResult<Task> {
        let (task, definition) = load_task_with_definition(self.store.as_ref(), task_uuid).await?;
        let plan = TaskStateMachine::new(&task, definition.max_attempts)
            .plan_dequeue(self.clock.now())?;

        let dequeued = match self.store.transition(task_uuid, &plan).await? {
            Some(task) => task,
            None => return Err(stale_write_error(self.store.as_ref(), task_uuid).await),
        };

        info!(
            operation = operations::DEQUEUE,
            from = %task.status,
            "Task dequeued"
        );
        Ok(dequeued)
    }
}

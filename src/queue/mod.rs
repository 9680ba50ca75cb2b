//! # Queue Service
//!
//! The operation set exposed to producers and workers, composed from
//! single-purpose components over one shared [`QueueStore`]:
//!
//! - [`DefinitionRegistry`]: per-type policy, validated and defaulted
//! - [`TaskEnqueuer`]: producer-side creation and updates
//! - [`TaskClaimer`]: the atomic, priority-ordered claim
//! - [`LeaseManager`]: touch, release and dequeue of held tasks
//! - [`TaskFinalizer`]: worker-reported completion and failure
//!
//! [`TaskQueue`] wires them together. Mutating operations require a
//! [`ServiceIdentity`]; reads are open.
//!
//! ## Usage
//!
//! ```rust
//! use taskqueue_core::queue::{ServiceIdentity, TaskQueue};
//! use taskqueue_core::models::{EnqueueTaskRequest, TaskOutcome};
//!
//! # async fn example() -> Result<(), taskqueue_core::error::QueueError> {
//! let queue = TaskQueue::in_memory();
//! let worker = ServiceIdentity::new("worker-1");
//!
//! queue
//!     .enqueue_task(Some(&worker), EnqueueTaskRequest::new("classifier-search"))
//!     .await?;
//!
//! let names = vec!["classifier-search".to_string()];
//! for task in queue.claim(Some(&worker), &names, None, 5).await? {
//!     let outcome = TaskOutcome::completed(chrono::Utc::now());
//!     queue.report_outcome(Some(&worker), task.task_uuid, outcome).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod lease_manager;
pub mod registry;
pub mod task_claimer;
pub mod task_enqueuer;
pub mod task_finalizer;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub use lease_manager::LeaseManager;
pub use registry::DefinitionRegistry;
pub use task_claimer::TaskClaimer;
pub use task_enqueuer::TaskEnqueuer;
pub use task_finalizer::TaskFinalizer;

use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::logging::log_error;
use crate::models::{
    DefinitionPolicy, EnqueueTaskRequest, Task, TaskDefinition, TaskFilter, TaskOutcome,
    TaskUpdate,
};
use crate::store::{InMemoryQueueStore, PostgresQueueStore, QueueStore};

/// Authenticated calling principal, supplied by the transport layer.
///
/// The engine does not verify credentials; it only requires that one was
/// presented for writes and uses the subject as the default worker id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity {
    subject: String,
}

impl ServiceIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subject)
    }
}

fn require_identity(identity: Option<&ServiceIdentity>) -> QueueResult<&ServiceIdentity> {
    identity.ok_or(QueueError::Unauthenticated)
}

/// Explain why a guarded update matched no row.
pub(crate) async fn stale_write_error(store: &dyn QueueStore, task_uuid: Uuid) -> QueueError {
    match store.get_task(task_uuid).await {
        Ok(Some(task)) => {
            debug!(task_uuid = %task_uuid, status = %task.status, "Guarded update lost a race");
            QueueError::InvalidState(format!(
                "Task {task_uuid} changed concurrently and is now {}",
                task.status
            ))
        }
        Ok(None) => QueueError::TaskNotFound(task_uuid),
        Err(err) => {
            log_error(
                "queue",
                "stale_write_recheck",
                &err.to_string(),
                Some(&task_uuid.to_string()),
            );
            err
        }
    }
}

/// Load a task together with the definition whose policy governs it.
pub(crate) async fn load_task_with_definition(
    store: &dyn QueueStore,
    task_uuid: Uuid,
) -> QueueResult<(Task, TaskDefinition)> {
    let task = store
        .get_task(task_uuid)
        .await?
        .ok_or(QueueError::TaskNotFound(task_uuid))?;
    let definition = store
        .get_definition(&task.task_definition_name)
        .await?
        .ok_or_else(|| {
            log_error(
                "queue",
                "load_task_with_definition",
                "definition missing for task",
                Some(&task.task_definition_name),
            );
            QueueError::Internal(format!(
                "Task {task_uuid} references missing definition `{}`",
                task.task_definition_name
            ))
        })?;
    Ok((task, definition))
}

/// Facade over the queue components
#[derive(Debug, Clone)]
pub struct TaskQueue {
    store: Arc<dyn QueueStore>,
    config: Arc<QueueConfig>,
    registry: DefinitionRegistry,
    enqueuer: TaskEnqueuer,
    claimer: TaskClaimer,
    lease_manager: LeaseManager,
    finalizer: TaskFinalizer,
}

impl TaskQueue {
    pub fn new(store: Arc<dyn QueueStore>, config: Arc<QueueConfig>, clock: Arc<dyn Clock>) -> Self {
        let settings = config.queue.clone();
        let registry = DefinitionRegistry::new(store.clone(), clock.clone(), settings.clone());
        let enqueuer = TaskEnqueuer::new(store.clone(), registry.clone());
        let claimer = TaskClaimer::new(store.clone(), settings.clone());
        let lease_manager = LeaseManager::new(store.clone(), clock.clone(), settings);
        let finalizer = TaskFinalizer::new(store.clone(), clock);

        Self {
            store,
            config,
            registry,
            enqueuer,
            claimer,
            lease_manager,
            finalizer,
        }
    }

    /// Queue over a fresh in-memory store with default configuration
    pub fn in_memory() -> Self {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(InMemoryQueueStore::with_clock(clock.clone()));
        Self::new(store, Arc::new(QueueConfig::default()), clock)
    }

    /// Queue backed by Postgres; lease and claim times come from the database clock
    pub fn postgres(pool: sqlx::PgPool, config: QueueConfig) -> Self {
        Self::new(
            Arc::new(PostgresQueueStore::new(pool)),
            Arc::new(config),
            Arc::new(SystemClock),
        )
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub async fn create_definition(
        &self,
        identity: Option<&ServiceIdentity>,
        name: &str,
        policy: DefinitionPolicy,
    ) -> QueueResult<TaskDefinition> {
        require_identity(identity)?;
        self.registry.create_definition(name, &policy).await
    }

    pub async fn update_definition(
        &self,
        identity: Option<&ServiceIdentity>,
        name: &str,
        policy: DefinitionPolicy,
    ) -> QueueResult<TaskDefinition> {
        require_identity(identity)?;
        self.registry.update_definition(name, &policy).await
    }

    pub async fn get_definition(&self, name: &str) -> QueueResult<TaskDefinition> {
        self.registry.get_definition(name).await
    }

    pub async fn list_definitions(&self) -> QueueResult<Vec<TaskDefinition>> {
        self.registry.list_definitions().await
    }

    pub async fn enqueue_task(
        &self,
        identity: Option<&ServiceIdentity>,
        request: EnqueueTaskRequest,
    ) -> QueueResult<Task> {
        require_identity(identity)?;
        self.enqueuer.enqueue(request).await
    }

    pub async fn get_task(&self, task_uuid: Uuid) -> QueueResult<Task> {
        self.store
            .get_task(task_uuid)
            .await?
            .ok_or(QueueError::TaskNotFound(task_uuid))
    }

    pub async fn list_tasks(&self, filter: &TaskFilter) -> QueueResult<Vec<Task>> {
        self.store.list_tasks(filter).await
    }

    pub async fn update_task(
        &self,
        identity: Option<&ServiceIdentity>,
        task_uuid: Uuid,
        update: TaskUpdate,
    ) -> QueueResult<Task> {
        require_identity(identity)?;
        self.enqueuer.update_task(task_uuid, &update).await
    }

    pub async fn report_outcome(
        &self,
        identity: Option<&ServiceIdentity>,
        task_uuid: Uuid,
        outcome: TaskOutcome,
    ) -> QueueResult<Task> {
        require_identity(identity)?;
        self.finalizer.report_outcome(task_uuid, &outcome).await
    }

    /// Claim up to `limit` tasks. `worker_id` defaults to the caller's subject.
    pub async fn claim(
        &self,
        identity: Option<&ServiceIdentity>,
        definition_names: &[String],
        worker_id: Option<&str>,
        limit: i64,
    ) -> QueueResult<Vec<Task>> {
        let identity = require_identity(identity)?;
        let worker_id = worker_id.unwrap_or_else(|| identity.subject());
        self.claimer.claim(definition_names, worker_id, limit).await
    }

    pub async fn touch(
        &self,
        identity: Option<&ServiceIdentity>,
        task_uuid: Uuid,
        extension_seconds: i64,
    ) -> QueueResult<Task> {
        require_identity(identity)?;
        self.lease_manager.touch(task_uuid, extension_seconds).await
    }

    pub async fn release(
        &self,
        identity: Option<&ServiceIdentity>,
        task_uuid: Uuid,
    ) -> QueueResult<Task> {
        require_identity(identity)?;
        self.lease_manager.release(task_uuid).await
    }

    pub async fn dequeue(
        &self,
        identity: Option<&ServiceIdentity>,
        task_uuid: Uuid,
    ) -> QueueResult<Task> {
        require_identity(identity)?;
        self.lease_manager.dequeue(task_uuid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_writes_require_identity() {
        let queue = TaskQueue::in_memory();

        let err = queue
            .enqueue_task(None, EnqueueTaskRequest::new("foo"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        let err = queue
            .claim(None, &["foo".to_string()], None, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        // Reads stay open
        assert!(queue.list_definitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_attributes_worker_to_identity() {
        let queue = TaskQueue::in_memory();
        let identity = ServiceIdentity::new("svc-classifier");

        queue
            .enqueue_task(Some(&identity), EnqueueTaskRequest::new("foo"))
            .await
            .unwrap();
        let claimed = queue
            .claim(Some(&identity), &["foo".to_string()], None, 1)
            .await
            .unwrap();

        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].worker_id.as_deref(), Some("svc-classifier"));
    }

    #[tokio::test]
    async fn test_get_task_not_found() {
        let queue = TaskQueue::in_memory();
        let err = queue.get_task(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

//! # PostgreSQL Queue Store
//!
//! Production provider. Claims rely on `FOR UPDATE ... SKIP LOCKED` inside a
//! single `UPDATE ... RETURNING` statement, so concurrent claimers never
//! block on or receive each other's rows. Eligibility is evaluated against
//! the database clock.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::models::{NewTask, Task, TaskDefinition, TaskFilter, TaskUpdate};
use crate::state_machine::TransitionPlan;
use crate::store::traits::QueueStore;

#[derive(Debug, Clone)]
pub struct PostgresQueueStore {
    pool: PgPool,
}

impl PostgresQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueueStore for PostgresQueueStore {
    async fn insert_definition(&self, definition: &TaskDefinition) -> QueueResult<TaskDefinition> {
        TaskDefinition::create(&self.pool, definition).await
    }

    #[instrument(skip(self, definition), fields(definition = %definition.name))]
    async fn upsert_definition(&self, definition: &TaskDefinition) -> QueueResult<TaskDefinition> {
        if let Some(existing) = TaskDefinition::insert_if_absent(&self.pool, definition).await? {
            return Ok(existing);
        }

        // Inserted concurrently after this statement's snapshot was taken
        debug!("Definition appeared concurrently, re-reading");
        TaskDefinition::find_by_name(&self.pool, &definition.name)
            .await?
            .ok_or_else(|| {
                error!(definition = %definition.name, "Definition vanished during upsert");
                QueueError::Internal(format!(
                    "Task definition `{}` could not be created or read",
                    definition.name
                ))
            })
    }

    async fn update_definition(
        &self,
        definition: &TaskDefinition,
    ) -> QueueResult<Option<TaskDefinition>> {
        TaskDefinition::update_policy(&self.pool, definition).await
    }

    async fn get_definition(&self, name: &str) -> QueueResult<Option<TaskDefinition>> {
        TaskDefinition::find_by_name(&self.pool, name).await
    }

    async fn list_definitions(&self) -> QueueResult<Vec<TaskDefinition>> {
        TaskDefinition::list(&self.pool).await
    }

    async fn insert_task(&self, new_task: &NewTask) -> QueueResult<Task> {
        Task::create(&self.pool, new_task).await
    }

    async fn get_task(&self, task_uuid: Uuid) -> QueueResult<Option<Task>> {
        Task::find_by_uuid(&self.pool, task_uuid).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> QueueResult<Vec<Task>> {
        Task::list(&self.pool, filter).await
    }

    async fn claim_batch(
        &self,
        definition_names: &[String],
        worker_id: &str,
        limit: i64,
    ) -> QueueResult<Vec<Task>> {
        Task::claim_batch(&self.pool, definition_names, worker_id, limit).await
    }

    async fn transition(&self, task_uuid: Uuid, plan: &TransitionPlan) -> QueueResult<Option<Task>> {
        Task::apply_transition(&self.pool, task_uuid, plan).await
    }

    async fn update_task_fields(
        &self,
        task_uuid: Uuid,
        update: &TaskUpdate,
    ) -> QueueResult<Option<Task>> {
        Task::update_waiting_fields(&self.pool, task_uuid, update).await
    }

    async fn health_check(&self) -> QueueResult<bool> {
        let (one,): (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(one == 1)
    }

    fn provider_name(&self) -> &'static str {
        "postgres"
    }
}

//! # Task Model
//!
//! A single unit of queued work and its lifecycle state.
//!
//! ## Overview
//!
//! Tasks are created `queued` by producers and afterwards mutated only by the
//! claim engine, by worker-reported outcomes and by the lease operations.
//! Terminal tasks are retained for audit; the engine never deletes rows.
//!
//! ## Database Schema
//!
//! Maps to the `tasks` table:
//! - `task_uuid`: Primary key (UUID), assigned by the engine
//! - `task_definition_name`: references `task_definitions.name`
//! - `status` / `priority`: TEXT with CHECK constraints
//! - `worker_id`, `lease_expires_at`: current holder and lease
//! - `payload`: JSONB passed through unexamined
//!
//! ## Deduplication
//!
//! `unique_token` is unique per definition among active tasks, enforced by a
//! partial unique index so terminal tasks free their token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use super::priority::Priority;
use crate::constants::limits;
use crate::error::{QueueError, QueueResult};
use crate::state_machine::{TaskStatus, TransitionPlan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_uuid: Uuid,
    pub task_definition_name: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub unique_token: Option<String>,
    pub run_at: DateTime<Utc>,
    pub worker_id: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub payload: Option<serde_json::Value>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New Task for creation (engine-generated fields already resolved)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub task_uuid: Uuid,
    pub task_definition_name: String,
    pub priority: Priority,
    pub unique_token: Option<String>,
    /// Defaults to creation time when absent
    pub run_at: Option<DateTime<Utc>>,
    pub payload: Option<serde_json::Value>,
}

/// Outcome reported by the worker holding a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl TaskOutcome {
    pub fn completed(at: DateTime<Utc>) -> Self {
        Self {
            completed_at: Some(at),
            failed_at: None,
        }
    }

    pub fn failed(at: DateTime<Utc>) -> Self {
        Self {
            completed_at: None,
            failed_at: Some(at),
        }
    }
}

/// Producer-owned fields that may change while a task waits in the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub priority: Option<Priority>,
    pub run_at: Option<DateTime<Utc>>,
    pub payload: Option<serde_json::Value>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.run_at.is_none() && self.payload.is_none()
    }

    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(run_at) = self.run_at {
            task.run_at = run_at;
        }
        if let Some(payload) = &self.payload {
            task.payload = Some(payload.clone());
        }
        task.updated_at = now;
    }
}

/// Read-side filter for task listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub definition_names: Vec<String>,
    pub statuses: Vec<TaskStatus>,
    pub worker_id: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub run_at_before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl TaskFilter {
    pub fn for_definition(name: impl Into<String>) -> Self {
        Self {
            definition_names: vec![name.into()],
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.statuses.push(status);
        self
    }

    /// Effective page size, clamped to the listing bounds
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(limits::DEFAULT_LIST_LIMIT)
            .clamp(1, limits::MAX_LIST_LIMIT)
    }

    pub fn matches(&self, task: &Task) -> bool {
        (self.definition_names.is_empty()
            || self.definition_names.contains(&task.task_definition_name))
            && (self.statuses.is_empty() || self.statuses.contains(&task.status))
            && self
                .worker_id
                .as_ref()
                .map_or(true, |w| task.worker_id.as_ref() == Some(w))
            && self.created_after.map_or(true, |t| task.created_at >= t)
            && self.created_before.map_or(true, |t| task.created_at < t)
            && self.run_at_before.map_or(true, |t| task.run_at <= t)
    }
}

impl Task {
    /// Claim-engine sort key: priority rank, then scheduled time
    pub fn claim_order_key(&self) -> (i32, DateTime<Utc>) {
        (self.priority.rank(), self.run_at)
    }

    /// Create a new queued task
    pub async fn create<'e>(executor: impl PgExecutor<'e>, new_task: &NewTask) -> QueueResult<Task> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            INSERT INTO tasks (
                task_uuid, task_definition_name, status, priority, unique_token,
                run_at, payload, attempts, created_at, updated_at
            )
            VALUES ($1, $2, 'queued', $3, $4, COALESCE($5, NOW()), $6, 0, NOW(), NOW())
            RETURNING task_uuid, task_definition_name, status, priority, unique_token, run_at,
                      worker_id, lease_expires_at, started_at, completed_at, failed_at,
                      payload, attempts, created_at, updated_at
            "#,
        )
        .bind(new_task.task_uuid)
        .bind(&new_task.task_definition_name)
        .bind(new_task.priority.as_str())
        .bind(&new_task.unique_token)
        .bind(new_task.run_at)
        .bind(&new_task.payload)
        .fetch_one(executor)
        .await?;

        row.try_into()
    }

    /// Find a task by UUID
    pub async fn find_by_uuid<'e>(
        executor: impl PgExecutor<'e>,
        task_uuid: Uuid,
    ) -> QueueResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT task_uuid, task_definition_name, status, priority, unique_token, run_at,
                   worker_id, lease_expires_at, started_at, completed_at, failed_at,
                   payload, attempts, created_at, updated_at
            FROM tasks
            WHERE task_uuid = $1
            "#,
        )
        .bind(task_uuid)
        .fetch_optional(executor)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List tasks matching `filter`, oldest first
    pub async fn list<'e>(executor: impl PgExecutor<'e>, filter: &TaskFilter) -> QueueResult<Vec<Task>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT task_uuid, task_definition_name, status, priority, unique_token, run_at,
                   worker_id, lease_expires_at, started_at, completed_at, failed_at,
                   payload, attempts, created_at, updated_at
            FROM tasks
            WHERE TRUE
            "#,
        );

        if !filter.definition_names.is_empty() {
            query
                .push(" AND task_definition_name = ANY(")
                .push_bind(filter.definition_names.clone())
                .push(")");
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<String> = filter.statuses.iter().map(|s| s.to_string()).collect();
            query.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if let Some(worker_id) = &filter.worker_id {
            query.push(" AND worker_id = ").push_bind(worker_id.clone());
        }
        if let Some(created_after) = filter.created_after {
            query.push(" AND created_at >= ").push_bind(created_after);
        }
        if let Some(created_before) = filter.created_before {
            query.push(" AND created_at < ").push_bind(created_before);
        }
        if let Some(run_at_before) = filter.run_at_before {
            query.push(" AND run_at <= ").push_bind(run_at_before);
        }

        query
            .push(" ORDER BY created_at, task_uuid LIMIT ")
            .push_bind(filter.effective_limit());

        let rows = query
            .build_query_as::<TaskRow>()
            .fetch_all(executor)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Select, lock and mark up to `limit` eligible tasks in one statement.
    ///
    /// Rows locked by a concurrent claim are skipped rather than waited on.
    /// Policy (`max_attempts`, `default_timeout_seconds`) is read from the
    /// definition at evaluation time. `UPDATE ... RETURNING` does not keep
    /// the CTE order, so the result is re-sorted into claim order.
    pub async fn claim_batch<'e>(
        executor: impl PgExecutor<'e>,
        definition_names: &[String],
        worker_id: &str,
        limit: i64,
    ) -> QueueResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            WITH next_tasks AS (
                SELECT t.task_uuid
                FROM tasks t
                JOIN task_definitions d ON d.name = t.task_definition_name
                WHERE t.task_definition_name = ANY($1)
                  AND t.run_at <= NOW()
                  AND (
                        t.status = 'queued'
                     OR (t.status = 'in_progress'
                         AND (t.lease_expires_at IS NULL OR t.lease_expires_at < NOW()))
                     OR (t.status = 'failed_retrying' AND t.attempts < d.max_attempts)
                  )
                ORDER BY
                    CASE t.priority
                        WHEN 'critical' THEN 1
                        WHEN 'high' THEN 2
                        WHEN 'normal' THEN 3
                        ELSE 4
                    END,
                    t.run_at,
                    t.created_at
                LIMIT $3
                FOR UPDATE OF t SKIP LOCKED
            )
            UPDATE tasks
            SET status = 'in_progress',
                worker_id = $2,
                lease_expires_at = NOW() + d.default_timeout_seconds * INTERVAL '1 second',
                started_at = COALESCE(tasks.started_at, NOW()),
                failed_at = NULL,
                attempts = tasks.attempts + 1,
                updated_at = NOW()
            FROM next_tasks, task_definitions d
            WHERE tasks.task_uuid = next_tasks.task_uuid
              AND d.name = tasks.task_definition_name
            RETURNING tasks.task_uuid, tasks.task_definition_name, tasks.status, tasks.priority,
                      tasks.unique_token, tasks.run_at, tasks.worker_id, tasks.lease_expires_at,
                      tasks.started_at, tasks.completed_at, tasks.failed_at, tasks.payload,
                      tasks.attempts, tasks.created_at, tasks.updated_at
            "#,
        )
        .bind(definition_names)
        .bind(worker_id)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        let mut tasks = rows
            .into_iter()
            .map(Task::try_from)
            .collect::<QueueResult<Vec<_>>>()?;
        tasks.sort_by_key(|t| (t.claim_order_key(), t.created_at));
        Ok(tasks)
    }

    /// Persist `plan` if the row still matches the snapshot it was made from.
    ///
    /// Returns `None` when the status or attempts changed underneath.
    pub async fn apply_transition<'e>(
        executor: impl PgExecutor<'e>,
        task_uuid: Uuid,
        plan: &TransitionPlan,
    ) -> QueueResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            UPDATE tasks
            SET status = $4,
                worker_id = CASE WHEN $5 THEN NULL ELSE worker_id END,
                lease_expires_at = CASE WHEN $5 THEN NULL ELSE COALESCE($6, lease_expires_at) END,
                completed_at = COALESCE($7, completed_at),
                failed_at = COALESCE($8, failed_at),
                updated_at = NOW()
            WHERE task_uuid = $1 AND status = $2 AND attempts = $3
            RETURNING task_uuid, task_definition_name, status, priority, unique_token, run_at,
                      worker_id, lease_expires_at, started_at, completed_at, failed_at,
                      payload, attempts, created_at, updated_at
            "#,
        )
        .bind(task_uuid)
        .bind(plan.from.as_str())
        .bind(plan.expected_attempts)
        .bind(plan.to.as_str())
        .bind(plan.clear_lease)
        .bind(plan.lease_expires_at)
        .bind(plan.completed_at)
        .bind(plan.failed_at)
        .fetch_optional(executor)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Update producer-owned fields while the task is waiting in the queue.
    ///
    /// Returns `None` when the task is held or terminal.
    pub async fn update_waiting_fields<'e>(
        executor: impl PgExecutor<'e>,
        task_uuid: Uuid,
        update: &TaskUpdate,
    ) -> QueueResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            UPDATE tasks
            SET priority = COALESCE($2, priority),
                run_at = COALESCE($3, run_at),
                payload = COALESCE($4, payload),
                updated_at = NOW()
            WHERE task_uuid = $1 AND status IN ('queued', 'failed_retrying')
            RETURNING task_uuid, task_definition_name, status, priority, unique_token, run_at,
                      worker_id, lease_expires_at, started_at, completed_at, failed_at,
                      payload, attempts, created_at, updated_at
            "#,
        )
        .bind(task_uuid)
        .bind(update.priority.map(|p| p.as_str()))
        .bind(update.run_at)
        .bind(&update.payload)
        .fetch_optional(executor)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

/// Raw `tasks` row; status and priority are stored as text
#[derive(FromRow)]
pub(crate) struct TaskRow {
    task_uuid: Uuid,
    task_definition_name: String,
    status: String,
    priority: String,
    unique_token: Option<String>,
    run_at: DateTime<Utc>,
    worker_id: Option<String>,
    lease_expires_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    attempts: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = QueueError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            task_uuid: row.task_uuid,
            task_definition_name: row.task_definition_name,
            status: row.status.parse().map_err(QueueError::Internal)?,
            priority: row.priority.parse().map_err(QueueError::Internal)?,
            unique_token: row.unique_token,
            run_at: row.run_at,
            worker_id: row.worker_id,
            lease_expires_at: row.lease_expires_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            failed_at: row.failed_at,
            payload: row.payload,
            attempts: row.attempts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            task_uuid: Uuid::new_v4(),
            task_definition_name: "classifier-search".to_string(),
            status: TaskStatus::Queued,
            priority: Priority::Normal,
            unique_token: Some("classifier-1".to_string()),
            run_at: now,
            worker_id: None,
            lease_expires_at: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            payload: Some(json!({"foo": "bar"})),
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_filter_matching() {
        let task = sample_task();

        assert!(TaskFilter::default().matches(&task));
        assert!(TaskFilter::for_definition("classifier-search").matches(&task));
        assert!(!TaskFilter::for_definition("cleanup-workers").matches(&task));
        assert!(TaskFilter::default()
            .with_status(TaskStatus::Queued)
            .matches(&task));
        assert!(!TaskFilter::default()
            .with_status(TaskStatus::Completed)
            .matches(&task));

        let created_later = TaskFilter {
            created_after: Some(task.created_at + Duration::seconds(1)),
            ..TaskFilter::default()
        };
        assert!(!created_later.matches(&task));

        let by_worker = TaskFilter {
            worker_id: Some("foo".to_string()),
            ..TaskFilter::default()
        };
        assert!(!by_worker.matches(&task));
    }

    #[test]
    fn test_filter_limit_clamped() {
        assert_eq!(TaskFilter::default().effective_limit(), 100);
        let huge = TaskFilter {
            limit: Some(50_000),
            ..TaskFilter::default()
        };
        assert_eq!(huge.effective_limit(), 1_000);
        let zero = TaskFilter {
            limit: Some(0),
            ..TaskFilter::default()
        };
        assert_eq!(zero.effective_limit(), 1);
    }

    #[test]
    fn test_update_applies_present_fields_only() {
        let mut task = sample_task();
        let original_run_at = task.run_at;
        let update = TaskUpdate {
            priority: Some(Priority::High),
            ..TaskUpdate::default()
        };

        assert!(!update.is_empty());
        update.apply(&mut task, Utc::now());

        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.run_at, original_run_at);
        assert_eq!(task.payload, Some(json!({"foo": "bar"})));
    }

    #[test]
    fn test_claim_order_key() {
        let mut high = sample_task();
        high.priority = Priority::High;
        let mut older_normal = sample_task();
        older_normal.run_at = high.run_at - Duration::minutes(10);

        assert!(high.claim_order_key() < older_normal.claim_order_key());
    }
}

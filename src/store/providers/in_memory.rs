//! # In-Memory Queue Store
//!
//! Thread-safe in-memory provider for testing and development.
//!
//! ## Features
//!
//! - **Batch Lock**: one `parking_lot::Mutex` is held across the whole
//!   select-and-mark step of a claim, standing in for skip-locked rows
//! - **Injectable Clock**: lease expiry and `run_at` are evaluated against a
//!   [`Clock`], so tests can move time forward deterministically
//! - **Same Guards**: eligibility and transitions go through the same
//!   [`TaskStateMachine`] rules the Postgres provider encodes in SQL

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{QueueError, QueueResult};
use crate::models::{NewTask, Task, TaskDefinition, TaskFilter, TaskUpdate};
use crate::state_machine::{TaskStateMachine, TaskStatus, TransitionPlan};
use crate::store::traits::QueueStore;

#[derive(Debug, Default)]
struct InMemoryState {
    definitions: BTreeMap<String, TaskDefinition>,
    tasks: HashMap<Uuid, Task>,
}

impl InMemoryState {
    fn token_in_use(&self, definition: &str, token: &str) -> bool {
        self.tasks.values().any(|t| {
            t.status.is_active()
                && t.task_definition_name == definition
                && t.unique_token.as_deref() == Some(token)
        })
    }
}

/// In-memory queue store
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use chrono::Utc;
/// use taskqueue_core::clock::ManualClock;
/// use taskqueue_core::store::{InMemoryQueueStore, QueueStore};
///
/// let clock = Arc::new(ManualClock::new(Utc::now()));
/// let store = InMemoryQueueStore::with_clock(clock);
/// assert_eq!(store.provider_name(), "in_memory");
/// ```
#[derive(Debug)]
pub struct InMemoryQueueStore {
    state: Mutex<InMemoryState>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(InMemoryState::default()),
            clock,
        }
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn insert_definition(&self, definition: &TaskDefinition) -> QueueResult<TaskDefinition> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if state.definitions.contains_key(&definition.name) {
            return Err(QueueError::Conflict(format!(
                "Task definition `{}` already exists",
                definition.name
            )));
        }

        let mut stored = definition.clone();
        stored.created_at = now;
        stored.updated_at = now;
        state
            .definitions
            .insert(stored.name.clone(), stored.clone());
        Ok(stored)
    }

    async fn upsert_definition(&self, definition: &TaskDefinition) -> QueueResult<TaskDefinition> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let stored = state
            .definitions
            .entry(definition.name.clone())
            .or_insert_with(|| {
                let mut fresh = definition.clone();
                fresh.created_at = now;
                fresh.updated_at = now;
                fresh
            });
        Ok(stored.clone())
    }

    async fn update_definition(
        &self,
        definition: &TaskDefinition,
    ) -> QueueResult<Option<TaskDefinition>> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        Ok(state.definitions.get_mut(&definition.name).map(|stored| {
            stored.allowed_priorities = definition.allowed_priorities.clone();
            stored.default_timeout_seconds = definition.default_timeout_seconds;
            stored.max_attempts = definition.max_attempts;
            stored.title = definition.title.clone();
            stored.description = definition.description.clone();
            stored.updated_at = now;
            stored.clone()
        }))
    }

    async fn get_definition(&self, name: &str) -> QueueResult<Option<TaskDefinition>> {
        Ok(self.state.lock().definitions.get(name).cloned())
    }

    async fn list_definitions(&self) -> QueueResult<Vec<TaskDefinition>> {
        Ok(self.state.lock().definitions.values().cloned().collect())
    }

    async fn insert_task(&self, new_task: &NewTask) -> QueueResult<Task> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if !state
            .definitions
            .contains_key(&new_task.task_definition_name)
        {
            return Err(QueueError::DefinitionNotFound(
                new_task.task_definition_name.clone(),
            ));
        }

        if let Some(token) = &new_task.unique_token {
            if state.token_in_use(&new_task.task_definition_name, token) {
                return Err(QueueError::unique_token_conflict());
            }
        }

        let task = Task {
            task_uuid: new_task.task_uuid,
            task_definition_name: new_task.task_definition_name.clone(),
            status: TaskStatus::Queued,
            priority: new_task.priority,
            unique_token: new_task.unique_token.clone(),
            run_at: new_task.run_at.unwrap_or(now),
            worker_id: None,
            lease_expires_at: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            payload: new_task.payload.clone(),
            attempts: 0,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(task.task_uuid, task.clone());
        Ok(task)
    }

    async fn get_task(&self, task_uuid: Uuid) -> QueueResult<Option<Task>> {
        Ok(self.state.lock().tasks.get(&task_uuid).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> QueueResult<Vec<Task>> {
        let state = self.state.lock();
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.created_at, t.task_uuid));
        tasks.truncate(filter.effective_limit() as usize);
        Ok(tasks)
    }

    async fn claim_batch(
        &self,
        definition_names: &[String],
        worker_id: &str,
        limit: i64,
    ) -> QueueResult<Vec<Task>> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let InMemoryState { definitions, tasks } = &mut *state;

        let mut eligible: Vec<&mut Task> = tasks
            .values_mut()
            .filter(|task| {
                definition_names.contains(&task.task_definition_name)
                    && definitions
                        .get(&task.task_definition_name)
                        .is_some_and(|d| TaskStateMachine::new(task, d.max_attempts).is_claimable(now))
            })
            .collect();

        eligible.sort_by_key(|t| (t.claim_order_key(), t.created_at));
        eligible.truncate(limit.max(0) as usize);

        let claimed = eligible
            .into_iter()
            .filter_map(|task| {
                let definition = definitions.get(&task.task_definition_name)?;
                task.status = TaskStatus::InProgress;
                task.worker_id = Some(worker_id.to_string());
                task.lease_expires_at =
                    Some(now + Duration::seconds(i64::from(definition.default_timeout_seconds)));
                task.started_at.get_or_insert(now);
                task.failed_at = None;
                task.attempts += 1;
                task.updated_at = now;
                Some(task.clone())
            })
            .collect();

        Ok(claimed)
    }

    async fn transition(&self, task_uuid: Uuid, plan: &TransitionPlan) -> QueueResult<Option<Task>> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        match state.tasks.get_mut(&task_uuid) {
            Some(task) if plan.matches(task) => {
                plan.apply(task, now);
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn update_task_fields(
        &self,
        task_uuid: Uuid,
        update: &TaskUpdate,
    ) -> QueueResult<Option<Task>> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        match state.tasks.get_mut(&task_uuid) {
            Some(task) if matches!(task.status, TaskStatus::Queued | TaskStatus::FailedRetrying) => {
                update.apply(task, now);
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn health_check(&self) -> QueueResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{DefinitionPolicy, Priority};
    use chrono::Utc;

    fn store_with_clock() -> (InMemoryQueueStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (InMemoryQueueStore::with_clock(clock.clone()), clock)
    }

    fn new_task(definition: &str, priority: Priority) -> NewTask {
        NewTask {
            task_uuid: Uuid::new_v4(),
            task_definition_name: definition.to_string(),
            priority,
            unique_token: None,
            run_at: None,
            payload: None,
        }
    }

    async fn define(store: &InMemoryQueueStore, name: &str, policy: DefinitionPolicy) {
        let definition = TaskDefinition::from_policy(name, &policy, Utc::now());
        store.upsert_definition(&definition).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_returns_existing_row() {
        let (store, _) = store_with_clock();
        define(&store, "foo", DefinitionPolicy::default().with_max_attempts(3)).await;

        let again = TaskDefinition::from_policy("foo", &DefinitionPolicy::default(), Utc::now());
        let stored = store.upsert_definition(&again).await.unwrap();
        assert_eq!(stored.max_attempts, 3);

        let err = store.insert_definition(&again).await.unwrap_err();
        assert!(matches!(err, QueueError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_insert_requires_definition() {
        let (store, _) = store_with_clock();
        let err = store
            .insert_task(&new_task("missing", Priority::Normal))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::DefinitionNotFound(_)));
    }

    #[tokio::test]
    async fn test_claim_marks_and_orders() {
        let (store, clock) = store_with_clock();
        define(
            &store,
            "foo",
            DefinitionPolicy::default()
                .with_priorities(Priority::ALL.to_vec())
                .with_timeout_seconds(30),
        )
        .await;

        let low = store.insert_task(&new_task("foo", Priority::Low)).await.unwrap();
        let high = store.insert_task(&new_task("foo", Priority::High)).await.unwrap();

        let claimed = store
            .claim_batch(&["foo".to_string()], "worker-1", 10)
            .await
            .unwrap();

        assert_eq!(
            claimed.iter().map(|t| t.task_uuid).collect::<Vec<_>>(),
            vec![high.task_uuid, low.task_uuid]
        );
        for task in &claimed {
            assert_eq!(task.status, TaskStatus::InProgress);
            assert_eq!(task.worker_id.as_deref(), Some("worker-1"));
            assert_eq!(task.attempts, 1);
            assert_eq!(task.started_at, Some(clock.now()));
            assert_eq!(
                task.lease_expires_at,
                Some(clock.now() + Duration::seconds(30))
            );
        }

        let nothing_left = store
            .claim_batch(&["foo".to_string()], "worker-2", 10)
            .await
            .unwrap();
        assert!(nothing_left.is_empty());
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let (store, _) = store_with_clock();
        define(&store, "foo", DefinitionPolicy::default()).await;
        store.insert_task(&new_task("foo", Priority::Normal)).await.unwrap();

        let claimed = store
            .claim_batch(&["foo".to_string()], "worker-1", 1)
            .await
            .unwrap()
            .remove(0);

        let plan = TaskStateMachine::new(&claimed, 1)
            .plan_release(Utc::now())
            .unwrap();
        assert!(store.transition(claimed.task_uuid, &plan).await.unwrap().is_some());
        // Second application no longer matches the snapshot
        assert!(store.transition(claimed.task_uuid, &plan).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_fields_only_while_waiting() {
        let (store, _) = store_with_clock();
        define(&store, "foo", DefinitionPolicy::default()).await;
        let task = store.insert_task(&new_task("foo", Priority::Normal)).await.unwrap();

        let update = TaskUpdate {
            payload: Some(serde_json::json!({"foo": "baz"})),
            ..TaskUpdate::default()
        };
        assert!(store
            .update_task_fields(task.task_uuid, &update)
            .await
            .unwrap()
            .is_some());

        store
            .claim_batch(&["foo".to_string()], "worker-1", 1)
            .await
            .unwrap();
        assert!(store
            .update_task_fields(task.task_uuid, &update)
            .await
            .unwrap()
            .is_none());
    }
}

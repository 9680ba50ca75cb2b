//! # Task Claimer
//!
//! ## Architecture: Atomic Priority-Ordered Claiming
//!
//! Workers poll with a set of definition names and a batch size. The store
//! selects eligible tasks in claim order, skips rows another claimer holds
//! and marks the selection `in_progress` in one indivisible step, so
//! concurrent callers always receive disjoint batches.
//!
//! ## Key Features
//!
//! - **Atomic Claiming**: `FOR UPDATE SKIP LOCKED` (or the in-memory batch lock)
//! - **Strict Priority**: `critical` > `high` > `normal` > `low`, then oldest `run_at`
//! - **Crash Recovery**: `in_progress` tasks whose lease lapsed are eligible again
//! - **Retry Budget**: `failed_retrying` tasks are eligible while `attempts < max_attempts`
//! - **Bounded Batches**: `limit` must lie within the configured claim bounds

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::QueueSettings;
use crate::constants::operations;
use crate::error::{QueueError, QueueResult};
use crate::models::{Priority, Task};
use crate::store::QueueStore;
use crate::validation;

/// Task claiming component
#[derive(Debug, Clone)]
pub struct TaskClaimer {
    store: Arc<dyn QueueStore>,
    settings: QueueSettings,
}

impl TaskClaimer {
    pub fn new(store: Arc<dyn QueueStore>, settings: QueueSettings) -> Self {
        Self { store, settings }
    }

    /// Claim up to `limit` eligible tasks for `worker_id`.
    ///
    /// An empty result is not an error.
    #[instrument(skip(self, definition_names), fields(worker_id = %worker_id, limit = limit))]
    pub async fn claim(
        &self,
        definition_names: &[String],
        worker_id: &str,
        limit: i64,
    ) -> QueueResult<Vec<Task>> {
        if definition_names.is_empty() {
            return Err(QueueError::InvalidArgument(
                "at least one task definition name is required".to_string(),
            ));
        }
        validation::validate_worker_id(worker_id)?;
        validation::validate_claim_limit(
            limit,
            self.settings.claim_limit_min,
            self.settings.claim_limit_max,
        )?;

        let names: Vec<String> = definition_names
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!(definitions = ?names, "Claiming eligible tasks");

        let claimed = self.store.claim_batch(&names, worker_id, limit).await?;

        if !claimed.is_empty() {
            info!(
                operation = operations::CLAIM,
                claimed_count = claimed.len(),
                "Successfully claimed tasks"
            );

            let priority_summary = summarize_claimed_priorities(&claimed);
            debug!(priority_summary = ?priority_summary, "Claimed task priority distribution");
        } else {
            debug!("No eligible tasks available for claiming");
        }

        Ok(claimed)
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }
}

/// Priority distribution of a claimed batch for monitoring
#[derive(Debug, Default, PartialEq, Eq)]
struct PrioritySummary {
    critical_count: usize,
    high_count: usize,
    normal_count: usize,
    low_count: usize,
    /// Claims that took over an abandoned lease or a retry
    reclaimed_count: usize,
}

fn summarize_claimed_priorities(tasks: &[Task]) -> PrioritySummary {
    let mut summary = PrioritySummary::default();

    for task in tasks {
        match task.priority {
            Priority::Critical => summary.critical_count += 1,
            Priority::High => summary.high_count += 1,
            Priority::Normal => summary.normal_count += 1,
            Priority::Low => summary.low_count += 1,
        }
        if task.attempts > 1 {
            summary.reclaimed_count += 1;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{DefinitionPolicy, NewTask, TaskDefinition};
    use crate::state_machine::TaskStatus;
    use crate::store::InMemoryQueueStore;
    use chrono::Utc;
    use uuid::Uuid;

    async fn seeded_claimer(priorities: &[Priority]) -> TaskClaimer {
        let store = Arc::new(InMemoryQueueStore::new());
        let definition = TaskDefinition::from_policy(
            "foo",
            &DefinitionPolicy::default().with_priorities(Priority::ALL.to_vec()),
            Utc::now(),
        );
        store.upsert_definition(&definition).await.unwrap();
        for priority in priorities {
            store
                .insert_task(&NewTask {
                    task_uuid: Uuid::new_v4(),
                    task_definition_name: "foo".to_string(),
                    priority: *priority,
                    unique_token: None,
                    run_at: None,
                    payload: None,
                })
                .await
                .unwrap();
        }
        TaskClaimer::new(store, QueueSettings::default())
    }

    #[tokio::test]
    async fn test_argument_validation() {
        let claimer = seeded_claimer(&[]).await;

        let err = claimer.claim(&[], "worker-1", 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let names = vec!["foo".to_string()];
        for limit in [0, 11, -3] {
            let err = claimer.claim(&names, "worker-1", limit).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "limit {limit}");
        }

        assert!(claimer.claim(&names, "worker-1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_respects_limit_and_priority() {
        let claimer = seeded_claimer(&[Priority::Low, Priority::Critical, Priority::Normal]).await;
        let names = vec!["foo".to_string(), "foo".to_string()];

        let first = claimer.claim(&names, "worker-1", 2).await.unwrap();
        assert_eq!(
            first.iter().map(|t| t.priority).collect::<Vec<_>>(),
            vec![Priority::Critical, Priority::Normal]
        );
        assert!(first.iter().all(|t| t.status == TaskStatus::InProgress));

        let second = claimer.claim(&names, "worker-2", 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].priority, Priority::Low);
    }

    #[test]
    fn test_priority_summary() {
        let now = Utc::now();
        let task = |priority, attempts| Task {
            task_uuid: Uuid::new_v4(),
            task_definition_name: "foo".to_string(),
            status: TaskStatus::InProgress,
            priority,
            unique_token: None,
            run_at: now,
            worker_id: Some("worker-1".to_string()),
            lease_expires_at: None,
            started_at: Some(now),
            completed_at: None,
            failed_at: None,
            payload: None,
            attempts,
            created_at: now,
            updated_at: now,
        };

        let summary = summarize_claimed_priorities(&[
            task(Priority::High, 1),
            task(Priority::High, 2),
            task(Priority::Low, 1),
        ]);
        assert_eq!(
            summary,
            PrioritySummary {
                critical_count: 0,
                high_count: 2,
                normal_count: 0,
                low_count: 1,
                reclaimed_count: 1,
            }
        );
    }
}

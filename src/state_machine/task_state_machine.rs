use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskStatus,
};
use crate::models::{Task, TaskOutcome};

/// Field effects of a legal transition, persisted by a store as one
/// compare-and-set against `from` and `expected_attempts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub event: TaskEvent,
    pub from: TaskStatus,
    pub to: TaskStatus,
    /// Attempts observed when the plan was made; a reclaim in between bumps it
    pub expected_attempts: i32,
    /// Clears `worker_id` and `lease_expires_at`
    pub clear_lease: bool,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl TransitionPlan {
    fn new(event: TaskEvent, task: &Task, to: TaskStatus) -> Self {
        Self {
            event,
            from: task.status,
            to,
            expected_attempts: task.attempts,
            clear_lease: false,
            lease_expires_at: None,
            completed_at: None,
            failed_at: None,
        }
    }

    /// Check whether `task` still matches the snapshot this plan was made from.
    pub fn matches(&self, task: &Task) -> bool {
        task.status == self.from && task.attempts == self.expected_attempts
    }

    /// Apply the plan to an in-memory task record.
    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) {
        task.status = self.to;
        if self.clear_lease {
            task.worker_id = None;
            task.lease_expires_at = None;
        } else if let Some(expires_at) = self.lease_expires_at {
            task.lease_expires_at = Some(expires_at);
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = Some(completed_at);
        }
        if let Some(failed_at) = self.failed_at {
            task.failed_at = Some(failed_at);
        }
        task.updated_at = now;
    }
}

/// Decides legal status changes for a single task snapshot.
///
/// The machine never touches storage. Callers hand the resulting
/// [`TransitionPlan`] to a store, which persists it only if the row still
/// matches the snapshot.
#[derive(Debug, Clone, Copy)]
pub struct TaskStateMachine<'a> {
    task: &'a Task,
    max_attempts: i32,
}

impl<'a> TaskStateMachine<'a> {
    /// `max_attempts` is read from the owning definition at evaluation time.
    pub fn new(task: &'a Task, max_attempts: i32) -> Self {
        Self { task, max_attempts }
    }

    fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.task
            .lease_expires_at
            .map_or(true, |expires_at| now > expires_at)
    }

    fn within_retry_budget(&self) -> bool {
        self.task.attempts < self.max_attempts
    }

    /// Claim eligibility, excluding the definition-name filter which the
    /// store applies before evaluating rows.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        if self.task.run_at > now {
            return false;
        }
        match self.task.status {
            TaskStatus::Queued => true,
            TaskStatus::InProgress => self.lease_expired(now),
            TaskStatus::FailedRetrying => self.within_retry_budget(),
            _ => false,
        }
    }

    /// Determine the target state for `event` or reject the transition.
    pub fn determine_target_state(
        &self,
        event: TaskEvent,
        now: DateTime<Utc>,
    ) -> StateMachineResult<TaskStatus> {
        let current = self.task.status;
        let target = match (current, event) {
            (TaskStatus::Queued, TaskEvent::Claim) => TaskStatus::InProgress,
            (TaskStatus::InProgress, TaskEvent::Claim) => {
                if !self.lease_expired(now) {
                    return Err(StateMachineError::GuardFailed {
                        reason: format!("Task {} lease has not expired", self.task.task_uuid),
                    });
                }
                TaskStatus::InProgress
            }
            (TaskStatus::FailedRetrying, TaskEvent::Claim) => {
                if !self.within_retry_budget() {
                    return Err(StateMachineError::GuardFailed {
                        reason: format!(
                            "Task {} exhausted its retry budget ({} of {})",
                            self.task.task_uuid, self.task.attempts, self.max_attempts
                        ),
                    });
                }
                TaskStatus::InProgress
            }

            (TaskStatus::InProgress, TaskEvent::Complete) => TaskStatus::Completed,
            (TaskStatus::InProgress, TaskEvent::Fail) => {
                if self.within_retry_budget() {
                    TaskStatus::FailedRetrying
                } else {
                    TaskStatus::Failed
                }
            }

            (TaskStatus::InProgress, TaskEvent::Release) => TaskStatus::Queued,
            (TaskStatus::InProgress, TaskEvent::Touch) => TaskStatus::InProgress,

            (from, TaskEvent::Dequeue) if !from.is_terminal() => TaskStatus::Dequeued,

            (from, event) => return Err(StateMachineError::InvalidTransition { from, event }),
        };

        Ok(target)
    }

    /// Plan the transition for a worker-reported outcome.
    pub fn plan_outcome(
        &self,
        outcome: &TaskOutcome,
        now: DateTime<Utc>,
    ) -> StateMachineResult<TransitionPlan> {
        let (event, completed_at, failed_at) = match (outcome.completed_at, outcome.failed_at) {
            (Some(_), Some(_)) => return Err(StateMachineError::ConflictingOutcome),
            (Some(completed_at), None) => (TaskEvent::Complete, Some(completed_at), None),
            (None, Some(failed_at)) => (TaskEvent::Fail, None, Some(failed_at)),
            (None, None) => {
                return Err(StateMachineError::GuardFailed {
                    reason: "Outcome must set completed_at or failed_at".to_string(),
                })
            }
        };

        let to = self.determine_target_state(event, now)?;
        let mut plan = TransitionPlan::new(event, self.task, to);
        plan.clear_lease = true;
        plan.completed_at = completed_at;
        plan.failed_at = failed_at;
        Ok(plan)
    }

    /// Plan a lease extension to `now + extension_seconds`.
    pub fn plan_touch(
        &self,
        extension_seconds: i64,
        now: DateTime<Utc>,
    ) -> StateMachineResult<TransitionPlan> {
        let to = self.determine_target_state(TaskEvent::Touch, now)?;
        let mut plan = TransitionPlan::new(TaskEvent::Touch, self.task, to);
        plan.lease_expires_at = Some(now + chrono::Duration::seconds(extension_seconds));
        Ok(plan)
    }

    /// Plan a hand-back to the queue; attempts are left untouched.
    pub fn plan_release(&self, now: DateTime<Utc>) -> StateMachineResult<TransitionPlan> {
        let to = self.determine_target_state(TaskEvent::Release, now)?;
        let mut plan = TransitionPlan::new(TaskEvent::Release, self.task, to);
        plan.clear_lease = true;
        Ok(plan)
    }

    /// Plan a permanent forfeit of the task.
    pub fn plan_dequeue(&self, now: DateTime<Utc>) -> StateMachineResult<TransitionPlan> {
        let to = self.determine_target_state(TaskEvent::Dequeue, now)?;
        let mut plan = TransitionPlan::new(TaskEvent::Dequeue, self.task, to);
        plan.clear_lease = true;
        Ok(plan)
    }
}

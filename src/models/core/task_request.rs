//! Enqueue requests
//!
//! Typed input for creating a task. Field-level checks run through
//! [`EnqueueTaskRequest::validate`] before the request reaches storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::priority::Priority;
use super::task::NewTask;
use crate::constants::fields;
use crate::error::ValidationErrors;
use crate::validation;

/// Producer request to enqueue a single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnqueueTaskRequest {
    /// Definition to enqueue against; created with defaults when unseen
    pub task_definition_name: String,

    /// Defaults to `normal`
    #[serde(default)]
    pub priority: Option<Priority>,

    /// Earliest claim time; defaults to enqueue time
    #[serde(default)]
    pub run_at: Option<DateTime<Utc>>,

    /// Deduplication key among active tasks of the same definition
    #[serde(default)]
    pub unique_token: Option<String>,

    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl EnqueueTaskRequest {
    pub fn new(task_definition_name: impl Into<String>) -> Self {
        Self {
            task_definition_name: task_definition_name.into(),
            priority: None,
            run_at: None,
            unique_token: None,
            payload: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = Some(run_at);
        self
    }

    pub fn with_unique_token(mut self, token: impl Into<String>) -> Self {
        self.unique_token = Some(token.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }

    /// Collect every field error instead of stopping at the first one.
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        validation::check_definition_name(&mut errors, "task_definition_name", &self.task_definition_name);

        if let Some(token) = &self.unique_token {
            if token.trim().is_empty() {
                errors.add("unique_token", "must not be blank");
            } else if token.chars().count() > fields::UNIQUE_TOKEN_MAX_LENGTH {
                errors.add(
                    "unique_token",
                    format!(
                        "must be at most {} characters",
                        fields::UNIQUE_TOKEN_MAX_LENGTH
                    ),
                );
            }
        }

        if let Some(payload) = &self.payload {
            if let Err(message) = validation::check_payload(payload) {
                errors.add("payload", message);
            }
        }

        errors
    }

    /// Resolve engine-assigned fields for insertion.
    ///
    /// An absent `run_at` stays absent; the store stamps creation time from
    /// its own clock.
    pub fn into_new_task(self) -> NewTask {
        let priority = self.effective_priority();
        NewTask {
            task_uuid: Uuid::new_v4(),
            task_definition_name: self.task_definition_name,
            priority,
            unique_token: self.unique_token,
            run_at: self.run_at,
            payload: self.payload,
        }
    }
}

//! # Task Definition Model
//!
//! Per-task-type policy: lease timeout, retry budget and the priority bands
//! tasks of this type may use. Definitions are keyed by `name`, which is
//! immutable once tasks reference it.
//!
//! ## Database Schema
//!
//! Maps to the `task_definitions` table:
//! - `name`: Primary key (VARCHAR(255))
//! - `allowed_priorities`: TEXT[] of priority names, rank ordered
//! - `default_timeout_seconds`: lease granted on claim (INTEGER)
//! - `max_attempts`: retry budget (INTEGER)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use super::priority::Priority;
use crate::constants::defaults;
use crate::error::{QueueError, QueueResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub allowed_priorities: Vec<Priority>,
    pub default_timeout_seconds: i32,
    pub max_attempts: i32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Policy fields supplied on create or update.
///
/// Absent fields fall back to the defaults on create and keep their current
/// value on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionPolicy {
    pub allowed_priorities: Option<Vec<Priority>>,
    pub default_timeout_seconds: Option<i32>,
    pub max_attempts: Option<i32>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl DefinitionPolicy {
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: i32) -> Self {
        self.default_timeout_seconds = Some(seconds);
        self
    }

    pub fn with_priorities(mut self, priorities: Vec<Priority>) -> Self {
        self.allowed_priorities = Some(priorities);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl TaskDefinition {
    /// Build a definition from `policy`, filling absent fields with defaults.
    pub fn from_policy(name: &str, policy: &DefinitionPolicy, now: DateTime<Utc>) -> Self {
        let allowed_priorities = match &policy.allowed_priorities {
            Some(priorities) => Priority::normalize(priorities),
            None => default_priorities(),
        };

        Self {
            name: name.to_string(),
            allowed_priorities,
            default_timeout_seconds: policy
                .default_timeout_seconds
                .unwrap_or(defaults::TIMEOUT_SECONDS),
            max_attempts: policy.max_attempts.unwrap_or(defaults::MAX_ATTEMPTS),
            title: policy.title.clone(),
            description: policy.description.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overlay the fields present in `policy`; `name` never changes.
    pub fn merge_policy(&mut self, policy: &DefinitionPolicy, now: DateTime<Utc>) {
        if let Some(priorities) = &policy.allowed_priorities {
            self.allowed_priorities = Priority::normalize(priorities);
        }
        if let Some(timeout) = policy.default_timeout_seconds {
            self.default_timeout_seconds = timeout;
        }
        if let Some(max_attempts) = policy.max_attempts {
            self.max_attempts = max_attempts;
        }
        if policy.title.is_some() {
            self.title = policy.title.clone();
        }
        if policy.description.is_some() {
            self.description = policy.description.clone();
        }
        self.updated_at = now;
    }

    /// An empty allow-list permits every priority.
    pub fn allows_priority(&self, priority: Priority) -> bool {
        self.allowed_priorities.is_empty() || self.allowed_priorities.contains(&priority)
    }

    fn priority_names(&self) -> Vec<String> {
        self.allowed_priorities
            .iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }

    /// Insert a new definition; a duplicate name is a conflict.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        definition: &TaskDefinition,
    ) -> QueueResult<TaskDefinition> {
        let row = sqlx::query_as::<_, TaskDefinitionRow>(
            r#"
            INSERT INTO task_definitions (
                name, allowed_priorities, default_timeout_seconds, max_attempts,
                title, description, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING name, allowed_priorities, default_timeout_seconds, max_attempts,
                      title, description, created_at, updated_at
            "#,
        )
        .bind(&definition.name)
        .bind(definition.priority_names())
        .bind(definition.default_timeout_seconds)
        .bind(definition.max_attempts)
        .bind(&definition.title)
        .bind(&definition.description)
        .fetch_one(executor)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                QueueError::Conflict(format!(
                    "Task definition `{}` already exists",
                    definition.name
                ))
            }
            other => QueueError::from(other),
        })?;

        row.try_into()
    }

    /// Insert the definition unless one with the same name exists.
    ///
    /// Returns `None` when another transaction inserted the row after this
    /// statement's snapshot; the caller re-reads in that case.
    pub async fn insert_if_absent<'e>(
        executor: impl PgExecutor<'e>,
        definition: &TaskDefinition,
    ) -> QueueResult<Option<TaskDefinition>> {
        let row = sqlx::query_as::<_, TaskDefinitionRow>(
            r#"
            WITH inserted AS (
                INSERT INTO task_definitions (
                    name, allowed_priorities, default_timeout_seconds, max_attempts,
                    title, description, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
                ON CONFLICT (name) DO NOTHING
                RETURNING name, allowed_priorities, default_timeout_seconds, max_attempts,
                          title, description, created_at, updated_at
            )
            SELECT * FROM inserted
            UNION ALL
            SELECT name, allowed_priorities, default_timeout_seconds, max_attempts,
                   title, description, created_at, updated_at
            FROM task_definitions
            WHERE name = $1
            LIMIT 1
            "#,
        )
        .bind(&definition.name)
        .bind(definition.priority_names())
        .bind(definition.default_timeout_seconds)
        .bind(definition.max_attempts)
        .bind(&definition.title)
        .bind(&definition.description)
        .fetch_optional(executor)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Find a definition by name
    pub async fn find_by_name<'e>(
        executor: impl PgExecutor<'e>,
        name: &str,
    ) -> QueueResult<Option<TaskDefinition>> {
        let row = sqlx::query_as::<_, TaskDefinitionRow>(
            r#"
            SELECT name, allowed_priorities, default_timeout_seconds, max_attempts,
                   title, description, created_at, updated_at
            FROM task_definitions
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(executor)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List all definitions ordered by name
    pub async fn list<'e>(executor: impl PgExecutor<'e>) -> QueueResult<Vec<TaskDefinition>> {
        let rows = sqlx::query_as::<_, TaskDefinitionRow>(
            r#"
            SELECT name, allowed_priorities, default_timeout_seconds, max_attempts,
                   title, description, created_at, updated_at
            FROM task_definitions
            ORDER BY name
            "#,
        )
        .fetch_all(executor)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Persist the policy fields of an already-merged definition.
    pub async fn update_policy<'e>(
        executor: impl PgExecutor<'e>,
        definition: &TaskDefinition,
    ) -> QueueResult<Option<TaskDefinition>> {
        let row = sqlx::query_as::<_, TaskDefinitionRow>(
            r#"
            UPDATE task_definitions
            SET allowed_priorities = $2,
                default_timeout_seconds = $3,
                max_attempts = $4,
                title = $5,
                description = $6,
                updated_at = NOW()
            WHERE name = $1
            RETURNING name, allowed_priorities, default_timeout_seconds, max_attempts,
                      title, description, created_at, updated_at
            "#,
        )
        .bind(&definition.name)
        .bind(definition.priority_names())
        .bind(definition.default_timeout_seconds)
        .bind(definition.max_attempts)
        .bind(&definition.title)
        .bind(&definition.description)
        .fetch_optional(executor)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

fn default_priorities() -> Vec<Priority> {
    defaults::PRIORITY_LEVELS
        .iter()
        .filter_map(|p| p.parse().ok())
        .collect()
}

/// Raw `task_definitions` row
#[derive(FromRow)]
struct TaskDefinitionRow {
    name: String,
    allowed_priorities: Vec<String>,
    default_timeout_seconds: i32,
    max_attempts: i32,
    title: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskDefinitionRow> for TaskDefinition {
    type Error = QueueError;

    fn try_from(row: TaskDefinitionRow) -> Result<Self, Self::Error> {
        let allowed_priorities = row
            .allowed_priorities
            .iter()
            .map(|p| p.parse::<Priority>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(QueueError::Internal)?;

        Ok(TaskDefinition {
            name: row.name,
            allowed_priorities,
            default_timeout_seconds: row.default_timeout_seconds,
            max_attempts: row.max_attempts,
            title: row.title,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let definition =
            TaskDefinition::from_policy("classifier-search", &DefinitionPolicy::default(), Utc::now());

        assert_eq!(definition.name, "classifier-search");
        assert_eq!(definition.allowed_priorities, vec![Priority::Normal]);
        assert_eq!(definition.default_timeout_seconds, 600);
        assert_eq!(definition.max_attempts, 1);
        assert_eq!(definition.title, None);
        assert_eq!(definition.description, None);
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let now = Utc::now();
        let mut definition = TaskDefinition::from_policy(
            "classifier-search",
            &DefinitionPolicy::default().with_title("Classifier Search"),
            now,
        );

        definition.merge_policy(&DefinitionPolicy::default().with_max_attempts(3), now);

        assert_eq!(definition.max_attempts, 3);
        assert_eq!(definition.title.as_deref(), Some("Classifier Search"));
        assert_eq!(definition.default_timeout_seconds, 600);
    }

    #[test]
    fn test_priority_allow_list() {
        let now = Utc::now();
        let definition = TaskDefinition::from_policy(
            "cleanup-workers",
            &DefinitionPolicy::default().with_priorities(vec![Priority::Low, Priority::High]),
            now,
        );
        assert_eq!(
            definition.allowed_priorities,
            vec![Priority::High, Priority::Low]
        );
        assert!(definition.allows_priority(Priority::High));
        assert!(!definition.allows_priority(Priority::Critical));

        let open = TaskDefinition::from_policy(
            "open",
            &DefinitionPolicy::default().with_priorities(vec![]),
            now,
        );
        assert!(open.allows_priority(Priority::Critical));
    }

    #[test]
    fn test_row_conversion_rejects_unknown_priority() {
        let now = Utc::now();
        let row = TaskDefinitionRow {
            name: "x".to_string(),
            allowed_priorities: vec!["urgent".to_string()],
            default_timeout_seconds: 600,
            max_attempts: 1,
            title: None,
            description: None,
            created_at: now,
            updated_at: now,
        };
        assert!(TaskDefinition::try_from(row).is_err());
    }
}

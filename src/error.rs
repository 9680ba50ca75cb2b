//! Error types for the task queue.
//!

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Name of the partial unique index guarding active dedup tokens.
pub const UNIQUE_TOKEN_INDEX: &str = "index_tasks_on_definition_and_active_unique_token";

/// Coarse error classification exposed to callers of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    InvalidState,
    Conflict,
    Unauthenticated,
    Forbidden,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::InvalidState => "invalid_state",
            Self::Conflict => "conflict",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// A single rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Structured list of field errors collected by the request validators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// True when at least one error was recorded against `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Convert the collected errors into a result, `Ok` when nothing was recorded.
    pub fn into_result(self) -> QueueResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(QueueError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueueError {
    #[error("Task definition not found: {0}")]
    DefinitionNotFound(String),
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Authentication credentials were not provided")]
    Unauthenticated,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Classify this error into the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DefinitionNotFound(_) | Self::TaskNotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) | Self::Validation(_) => ErrorKind::InvalidArgument,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::DatabaseError(_)
            | Self::ConfigurationError(_)
            | Self::SerializationError(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn unique_token_conflict() -> Self {
        Self::Conflict("Task `unique_token` field conflict".to_string())
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(error: serde_json::Error) -> Self {
        QueueError::SerializationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() && db_err.constraint() == Some(UNIQUE_TOKEN_INDEX) {
                return QueueError::unique_token_conflict();
            }
        }
        QueueError::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for QueueError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        QueueError::DatabaseError(format!("Migration failed: {err}"))
    }
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(
            QueueError::DefinitionNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            QueueError::TaskNotFound(Uuid::new_v4()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            QueueError::Validation(ValidationErrors::new()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            QueueError::unique_token_conflict().kind(),
            ErrorKind::Conflict
        );
        assert_eq!(QueueError::Unauthenticated.kind(), ErrorKind::Unauthenticated);
        assert_eq!(
            QueueError::DatabaseError("boom".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_validation_errors_collect_fields() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("name", "must not be blank");
        errors.add("max_attempts", "must be at least 1");

        assert_eq!(errors.len(), 2);
        assert!(errors.has_field("name"));
        assert!(!errors.has_field("priority"));
        assert_eq!(
            errors.to_string(),
            "name: must not be blank; max_attempts: must be at least 1"
        );

        let err = errors.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_conflict_message() {
        assert_eq!(
            QueueError::unique_token_conflict().to_string(),
            "Conflict: Task `unique_token` field conflict"
        );
    }
}

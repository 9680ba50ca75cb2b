use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial state when the task is enqueued
    Queued,
    /// Task is held by a worker under a lease
    InProgress,
    /// Task failed and is eligible for another attempt
    FailedRetrying,
    /// Task was forfeited by its worker and will not run again
    Dequeued,
    /// Task exhausted its retry budget
    Failed,
    /// Task completed successfully
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        Self::Queued,
        Self::InProgress,
        Self::FailedRetrying,
        Self::Dequeued,
        Self::Failed,
        Self::Completed,
    ];

    /// Statuses that participate in dedup token uniqueness
    pub const ACTIVE: [TaskStatus; 3] = [Self::Queued, Self::InProgress, Self::FailedRetrying];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dequeued | Self::Failed | Self::Completed)
    }

    /// Check if this state still counts for dedup token collisions
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::FailedRetrying => "failed_retrying",
            Self::Dequeued => "dequeued",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "failed_retrying" => Ok(Self::FailedRetrying),
            "dequeued" => Ok(Self::Dequeued),
            "failed" => Ok(Self::Failed),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Dequeued.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::FailedRetrying.is_terminal());
    }

    #[test]
    fn test_active_matches_non_terminal() {
        for status in TaskStatus::ALL {
            assert_eq!(
                status.is_active(),
                TaskStatus::ACTIVE.contains(&status),
                "{status}"
            );
        }
    }

    #[test]
    fn test_status_string_conversion() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("complete".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&TaskStatus::FailedRetrying).unwrap();
        assert_eq!(json, "\"failed_retrying\"");
        let parsed: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TaskStatus::FailedRetrying);
    }
}

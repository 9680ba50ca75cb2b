use serde::{Deserialize, Serialize};

/// Events that drive task status transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A worker took the task through the claim engine
    Claim,
    /// The worker reported success
    Complete,
    /// The worker reported failure
    Fail,
    /// The worker handed the task back without consuming an attempt
    Release,
    /// The task was forfeited permanently
    Dequeue,
    /// The worker extended its lease
    Touch,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Release => "release",
            Self::Dequeue => "dequeue",
            Self::Touch => "touch",
        }
    }
}

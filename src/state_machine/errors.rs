use crate::error::QueueError;
use thiserror::Error;

use super::{events::TaskEvent, states::TaskStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} on {}", event.event_type())]
    InvalidTransition { from: TaskStatus, event: TaskEvent },

    #[error("Guard condition failed: {reason}")]
    GuardFailed { reason: String },

    #[error("Outcome must set exactly one of completed_at and failed_at")]
    ConflictingOutcome,
}

impl From<StateMachineError> for QueueError {
    fn from(err: StateMachineError) -> Self {
        QueueError::InvalidState(err.to_string())
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

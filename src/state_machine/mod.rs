// Lifecycle state machine for queued tasks.
//
// Status changes are decided here as pure functions; the stores persist the
// resulting plan with a compare-and-set on the previous status.

pub mod errors;
pub mod events;
pub mod states;
pub mod task_state_machine;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::TaskEvent;
pub use states::TaskStatus;
pub use task_state_machine::{TaskStateMachine, TransitionPlan};

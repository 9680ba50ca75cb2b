//! # Models
//!
//! Durable records of the queue: task definitions (per-type policy) and task
//! instances. Each model owns the SQL for its own relation.

pub mod core;

pub use self::core::priority::Priority;
pub use self::core::task::{NewTask, Task, TaskFilter, TaskOutcome, TaskUpdate};
pub use self::core::task_definition::{DefinitionPolicy, TaskDefinition};
pub use self::core::task_request::EnqueueTaskRequest;

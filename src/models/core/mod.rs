pub mod priority;
pub mod task;
pub mod task_definition;
pub mod task_request;

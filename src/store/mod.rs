//! # Queue Storage
//!
//! Provider-agnostic persistence for task definitions and tasks. The queue
//! service talks to an `Arc<dyn QueueStore>` and never to a provider
//! directly.

pub mod providers;
pub mod traits;

pub use providers::{InMemoryQueueStore, PostgresQueueStore};
pub use traits::QueueStore;

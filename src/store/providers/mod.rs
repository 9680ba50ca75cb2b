//! # Queue Store Providers
//!
//! Concrete implementations of the [`QueueStore`](super::QueueStore) trait.
//!
//! ## Providers
//!
//! - [`PostgresQueueStore`] - PostgreSQL with `FOR UPDATE SKIP LOCKED` claims
//! - [`InMemoryQueueStore`] - Mutex-guarded maps for tests and development

mod in_memory;
mod postgres;

pub use in_memory::InMemoryQueueStore;
pub use postgres::PostgresQueueStore;

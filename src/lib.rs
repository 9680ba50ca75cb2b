#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Task Queue Core
//!
//! Database-backed distributed task queue with atomic, priority-ordered
//! claiming and lease-based crash recovery.
//!
//! ## Overview
//!
//! Producers enqueue typed tasks against a **task definition** (per-type
//! policy: allowed priorities, lease timeout, retry budget). Workers poll for
//! batches, hold each claimed task under a **lease**, and report completion or
//! failure. A worker that disappears simply lets its lease lapse; the task
//! becomes claimable again for the next poll.
//!
//! ## Key Features
//!
//! - **Atomic Claiming**: `FOR UPDATE SKIP LOCKED` batches, never double-assigned
//! - **Strict Priority**: `critical` > `high` > `normal` > `low`, then oldest `run_at`
//! - **Leases**: touch to extend, release to hand back, dequeue to forfeit
//! - **Retry Budget**: failures re-enter the queue until `max_attempts` is spent
//! - **Deduplication**: one active task per `unique_token` and definition
//! - **Pluggable Storage**: PostgreSQL in production, in-memory for tests
//!
//! ## Module Organization
//!
//! - [`queue`] - Service facade and its components (registry, enqueuer, claimer, leases, finalizer)
//! - [`state_machine`] - Pure task lifecycle transitions
//! - [`store`] - Storage seam with Postgres and in-memory providers
//! - [`models`] - Task, definition and request types with their SQL
//! - [`database`] - Connection pooling and migrations
//! - [`config`] - Layered TOML/environment configuration
//! - [`validation`] - Request boundary checks
//! - [`error`] - Structured error handling
//! - [`logging`] - `tracing` subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use taskqueue_core::models::{EnqueueTaskRequest, Priority, TaskOutcome};
//! use taskqueue_core::queue::{ServiceIdentity, TaskQueue};
//!
//! # tokio_test::block_on(async {
//! let queue = TaskQueue::in_memory();
//! let producer = ServiceIdentity::new("producer");
//! let worker = ServiceIdentity::new("worker-1");
//!
//! queue
//!     .enqueue_task(
//!         Some(&producer),
//!         EnqueueTaskRequest::new("classifier-search").with_unique_token("doc-42"),
//!     )
//!     .await?;
//!
//! let names = vec!["classifier-search".to_string()];
//! let claimed = queue.claim(Some(&worker), &names, None, 10).await?;
//! for task in claimed {
//!     assert_eq!(task.priority, Priority::Normal);
//!     queue
//!         .report_outcome(Some(&worker), task.task_uuid, TaskOutcome::completed(chrono::Utc::now()))
//!         .await?;
//! }
//! # Ok::<(), taskqueue_core::QueueError>(())
//! # }).unwrap();
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test                      # Unit and in-memory integration tests
//! cargo test --features test-db   # Postgres integration tests (DATABASE_URL)
//! ```

pub mod clock;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod queue;
pub mod state_machine;
pub mod store;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigManager, QueueConfig};
pub use error::{ErrorKind, QueueError, QueueResult, ValidationErrors};
pub use models::{
    DefinitionPolicy, EnqueueTaskRequest, Priority, Task, TaskDefinition, TaskFilter,
    TaskOutcome, TaskUpdate,
};
pub use queue::{ServiceIdentity, TaskQueue};
pub use state_machine::{TaskEvent, TaskStatus};
pub use store::{InMemoryQueueStore, PostgresQueueStore, QueueStore};

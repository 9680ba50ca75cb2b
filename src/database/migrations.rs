//! # Schema Migrations
//!
//! Migrations live in the crate-root `migrations/` directory and are embedded
//! at compile time. The same migrator backs `#[sqlx::test]`:
//!
//! ```rust,ignore
//! #[sqlx::test(migrator = "taskqueue_core::database::MIGRATOR")]
//! async fn test_something(pool: PgPool) { /* ... */ }
//! ```

use sqlx::PgPool;
use tracing::info;

use crate::error::QueueResult;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply every pending migration; already-applied versions are skipped.
pub async fn run_migrations(pool: &PgPool) -> QueueResult<()> {
    info!("Running task queue migrations...");
    MIGRATOR.run(pool).await?;
    info!("Task queue migrations complete");
    Ok(())
}

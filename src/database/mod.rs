//! # Database Operations
//!
//! Connection pooling and schema migrations for the PostgreSQL backend.
//!
//! - [`connection`] - Pool construction from [`DatabaseConfig`](crate::config::DatabaseConfig)
//! - [`migrations`] - Embedded `sqlx` migrator for the `migrations/` directory
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use taskqueue_core::config::ConfigManager;
//! use taskqueue_core::database::{migrations, DatabaseConnection};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let db = DatabaseConnection::connect(&manager.config().database).await?;
//! migrations::run_migrations(db.pool()).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod migrations;

pub use connection::{create_pool, DatabaseConnection};
pub use migrations::{run_migrations, MIGRATOR};

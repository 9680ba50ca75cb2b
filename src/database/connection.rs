use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::config::{redact_url, DatabaseConfig};
use crate::error::QueueResult;

/// Build a connection pool sized by `config`; the URL must be configured.
pub async fn create_pool(config: &DatabaseConfig) -> QueueResult<PgPool> {
    let database_url = config.database_url()?;
    info!(
        url = %redact_url(database_url),
        max_connections = config.max_connections,
        "Creating database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(database_url)
        .await?;

    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    pub async fn connect(config: &DatabaseConfig) -> QueueResult<Self> {
        Ok(Self {
            pool: create_pool(config).await?,
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> QueueResult<bool> {
        let row = sqlx::query("SELECT 1 as health")
            .fetch_one(&self.pool)
            .await?;

        let health: i32 = row.get("health");
        Ok(health == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

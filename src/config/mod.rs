//! # Queue Configuration
//!
//! Typed configuration for the queue engine, loaded in layers by
//! [`ConfigManager`]:
//!
//! 1. `config/taskqueue.toml` (base, optional)
//! 2. `config/{environment}.toml` (optional override)
//! 3. `TASKQUEUE__SECTION__KEY` environment variables
//! 4. `DATABASE_URL`
//!
//! Every field has a default, so an empty configuration directory yields a
//! usable development setup.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use taskqueue_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let claim_max = manager.config().queue.claim_limit_max;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{redact_url, ConfigManager};

use crate::constants::{defaults, limits};
use crate::models::{DefinitionPolicy, Priority};

/// Root configuration structure mirroring `config/taskqueue.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Database connection and pooling configuration
    pub database: DatabaseConfig,

    /// Claim, lease and definition-default settings
    pub queue: QueueSettings,

    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL; `DATABASE_URL` overrides it when set
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    /// Connection URL, failing when neither the file nor the environment set one
    pub fn database_url(&self) -> ConfigResult<&str> {
        match self.url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(ConfigurationError::missing_required_field(
                "database.url",
                "database configuration (or DATABASE_URL)",
            )),
        }
    }
}

/// Queue engine settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Smallest batch a claim call may request
    pub claim_limit_min: i64,
    /// Largest batch a claim call may request
    pub claim_limit_max: i64,
    /// Upper bound for a lease extension
    pub max_touch_seconds: i64,
    /// Lease granted by definitions created without an explicit timeout
    pub default_timeout_seconds: i32,
    /// Retry budget of definitions created without an explicit value
    pub default_max_attempts: i32,
    /// Priority allow-list of definitions created without one
    pub default_priorities: Vec<Priority>,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            claim_limit_min: limits::CLAIM_LIMIT_MIN,
            claim_limit_max: limits::CLAIM_LIMIT_MAX,
            max_touch_seconds: limits::MAX_TOUCH_SECONDS,
            default_timeout_seconds: defaults::TIMEOUT_SECONDS,
            default_max_attempts: defaults::MAX_ATTEMPTS,
            default_priorities: vec![Priority::Normal],
        }
    }
}

impl QueueSettings {
    /// Fill the fields `policy` leaves open with the configured defaults.
    pub fn apply_defaults(&self, policy: &DefinitionPolicy) -> DefinitionPolicy {
        DefinitionPolicy {
            allowed_priorities: Some(
                policy
                    .allowed_priorities
                    .clone()
                    .unwrap_or_else(|| self.default_priorities.clone()),
            ),
            default_timeout_seconds: Some(
                policy
                    .default_timeout_seconds
                    .unwrap_or(self.default_timeout_seconds),
            ),
            max_attempts: Some(policy.max_attempts.unwrap_or(self.default_max_attempts)),
            title: policy.title.clone(),
            description: policy.description.clone(),
        }
    }
}

/// Console log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; falls back to the environment default
    pub level: Option<String>,
    pub format: LogFormat,
}

impl QueueConfig {
    /// Validate configuration for consistency and required fields
    pub fn validate(&self) -> ConfigResult<()> {
        let queue = &self.queue;

        if queue.claim_limit_min < 1 {
            return Err(ConfigurationError::invalid_value(
                "queue.claim_limit_min",
                queue.claim_limit_min.to_string(),
                "claim limit minimum must be at least 1",
            ));
        }

        if queue.claim_limit_min > queue.claim_limit_max {
            return Err(ConfigurationError::invalid_value(
                "queue.claim_limit_max",
                queue.claim_limit_max.to_string(),
                format!(
                    "claim limit maximum must not be below the minimum ({})",
                    queue.claim_limit_min
                ),
            ));
        }

        if queue.max_touch_seconds < 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.max_touch_seconds",
                queue.max_touch_seconds.to_string(),
                "lease extension bound must not be negative",
            ));
        }

        if queue.default_timeout_seconds < 1 {
            return Err(ConfigurationError::invalid_value(
                "queue.default_timeout_seconds",
                queue.default_timeout_seconds.to_string(),
                "default timeout must be at least 1 second",
            ));
        }

        if queue.default_max_attempts < 1 {
            return Err(ConfigurationError::invalid_value(
                "queue.default_max_attempts",
                queue.default_max_attempts.to_string(),
                "default max attempts must be at least 1",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "pool size must be greater than 0",
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigurationError::invalid_value(
                "database.min_connections",
                self.database.min_connections.to_string(),
                format!(
                    "must not exceed database.max_connections ({})",
                    self.database.max_connections
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.claim_limit_min, 1);
        assert_eq!(config.queue.claim_limit_max, 10);
        assert_eq!(config.queue.max_touch_seconds, 86_400);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_inverted_claim_bounds_rejected() {
        let mut config = QueueConfig::default();
        config.queue.claim_limit_min = 5;
        config.queue.claim_limit_max = 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { ref field, .. }) if field == "queue.claim_limit_max"
        ));

        config.queue.claim_limit_min = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_pool_rejected() {
        let mut config = QueueConfig::default();
        config.database.max_connections = 0;
        config.database.min_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_defaults_keeps_explicit_fields() {
        let settings = QueueSettings {
            default_max_attempts: 3,
            ..QueueSettings::default()
        };
        let filled = settings.apply_defaults(&DefinitionPolicy::default().with_timeout_seconds(30));

        assert_eq!(filled.default_timeout_seconds, Some(30));
        assert_eq!(filled.max_attempts, Some(3));
        assert_eq!(filled.allowed_priorities, Some(vec![Priority::Normal]));
    }

    #[test]
    fn test_missing_database_url() {
        let database = DatabaseConfig::default();
        assert!(database.database_url().is_err());

        let database = DatabaseConfig {
            url: Some("postgresql://localhost/taskqueue_test".to_string()),
            ..DatabaseConfig::default()
        };
        assert_eq!(
            database.database_url().unwrap(),
            "postgresql://localhost/taskqueue_test"
        );
    }
}

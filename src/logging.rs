//! # Structured Logging Module
//!
//! Environment-aware structured logging for the queue engine. Console output
//! is human readable by default and switches to JSON lines when configured.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

use crate::config::{ConfigManager, LogFormat, LoggingConfig};

static SUBSCRIBER_INSTALLED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber with the environment's default level
pub fn init_structured_logging() {
    init_with_config(&LoggingConfig::default());
}

/// Install the global subscriber from a loaded `[logging]` section.
///
/// `RUST_LOG` wins over both the configured level and the environment
/// default. Only the first call in a process has any effect.
pub fn init_with_config(config: &LoggingConfig) {
    SUBSCRIBER_INSTALLED.get_or_init(|| {
        let environment = ConfigManager::detect_environment();
        let level = config
            .level
            .clone()
            .unwrap_or_else(|| default_level(&environment).to_string());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

        let base = fmt::layer().with_target(true).with_thread_ids(true);
        let layer = match config.format {
            LogFormat::Json => base.with_ansi(false).json().with_filter(filter).boxed(),
            LogFormat::Pretty => base.with_ansi(true).with_filter(filter).boxed(),
        };

        // An embedding application may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already installed, keeping it");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            level = %level,
            format = ?config.format,
            "Queue logging initialized"
        );
    });
}

/// Default filter directive per environment
pub fn default_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        "test" => "warn",
        _ => "debug",
    }
}

/// Record a task lifecycle event with the fields operators filter on
pub fn log_task_operation(
    operation: &str,
    task_uuid: Option<Uuid>,
    definition: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_uuid = task_uuid.map(tracing::field::display),
        definition = definition,
        status = %status,
        details = details,
        "TASK_OPERATION"
    );
}

pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        "QUEUE_ERROR"
    );
}

//! # Task Queue Configuration Validator
//!
//! Command-line tool for validating task queue configuration across environments.
//! Loads the same layered configuration the engine uses and reports problems
//! before a service is started against it.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use taskqueue_core::config::{ConfigManager, QueueConfig};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate task queue configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    match validate(&cli) {
        Ok(()) => {
            info!("Configuration validation completed successfully");
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn validate(cli: &Cli) -> Result<()> {
    let manager =
        ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
            .with_context(|| {
                format!(
                    "failed to load configuration for environment `{}`",
                    cli.environment
                )
            })?;

    match cli.format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "environment": manager.environment(),
                "config_directory": manager.config_directory().display().to_string(),
                "valid": true,
                "config": manager.debug_config(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => print_table(&manager),
    }

    Ok(())
}

fn print_table(manager: &ConfigManager) {
    let config: &QueueConfig = manager.config();
    let sanitized = manager.debug_config();
    let url = sanitized
        .pointer("/database/url")
        .and_then(|v| v.as_str())
        .unwrap_or("(not set)");

    println!("🔧 Validating Task Queue Configuration");
    println!("Environment: {}", manager.environment());
    println!("Config Directory: {}", manager.config_directory().display());
    println!();

    println!("🗄️  Database");
    println!("   url:                     {url}");
    println!(
        "   pool:                    min {} / max {}",
        config.database.min_connections, config.database.max_connections
    );
    println!(
        "   acquire timeout:         {}s",
        config.database.acquire_timeout_seconds
    );

    println!("📬 Queue");
    println!(
        "   claim limit:             {}..={}",
        config.queue.claim_limit_min, config.queue.claim_limit_max
    );
    println!(
        "   max touch:               {}s",
        config.queue.max_touch_seconds
    );
    println!(
        "   default timeout:         {}s",
        config.queue.default_timeout_seconds
    );
    println!(
        "   default max attempts:    {}",
        config.queue.default_max_attempts
    );
    println!(
        "   default priorities:      {}",
        config
            .queue
            .default_priorities
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    println!("📊 Logging");
    println!(
        "   level:                   {}",
        config.logging.level.as_deref().unwrap_or("(environment default)")
    );
    println!("   format:                  {:?}", config.logging.format);

    println!("\n🎉 All configuration validation checks passed!");
}

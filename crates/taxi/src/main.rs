//! Taxi - NYC taxi trip analytics
//!
//! # Usage
//!
//! ```bash
//! # Check the configured trip store
//! taxi status
//!
//! # Run one metric family
//! taxi metric congestion
//! taxi metric surge-zones --threshold 0.3 --format json
//! taxi metric zone-revenue --limit 10 --start 2025-01-01 --end 2025-05-01
//!
//! # Threshold simulation
//! taxi simulate --threshold 1.5
//! taxi sensitivity --thresholds 0.5,1.0,2.0
//! ```

mod cmd;
mod context;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use taxi_config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Taxi - NYC taxi trip analytics over SQLite or PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "taxi")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true, env = "TAXI_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the trip store connection
    Status(cmd::status::StatusArgs),

    /// Headline totals for the analysis window
    Overview(cmd::overview::OverviewArgs),

    /// Run one metric family by name
    Metric(cmd::metric::MetricArgs),

    /// Remove trips below a distance threshold and compare totals
    Simulate(cmd::simulate::SimulateArgs),

    /// Repeat the simulation over several thresholds
    Sensitivity(cmd::simulate::SensitivityArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let log_level = resolve_log_level(cli.log_level.as_deref(), &config);
    init_logging(&log_level, config.log.format)?;

    match cli.command {
        Command::Status(args) => cmd::status::run(args, config).await,
        Command::Overview(args) => cmd::overview::run(args, config).await,
        Command::Metric(args) => cmd::metric::run(args, config).await,
        Command::Simulate(args) => cmd::simulate::run_simulate(args, config).await,
        Command::Sensitivity(args) => cmd::simulate::run_sensitivity(args, config).await,
    }
}

/// Load config from the given path, or `taxi.toml` when present
fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let path = match path {
        Some(p) if !p.exists() => {
            anyhow::bail!("config file not found: {}", p.display());
        }
        Some(p) => Some(p.to_path_buf()),
        None => ["configs/taxi.toml", "taxi.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists()),
    };

    Config::load(path.as_deref()).with_context(|| match &path {
        Some(p) => format!("failed to load config: {}", p.display()),
        None => "failed to load default config".to_string(),
    })
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> String {
    cli_level
        .map(str::to_string)
        .unwrap_or_else(|| config.log.level.as_str().to_string())
}

/// Initialize the tracing subscriber for logging
///
/// Logs go to stderr; stdout carries only reports.
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cli_parses_metric() {
        let cli = Cli::try_parse_from([
            "taxi",
            "--log-level",
            "debug",
            "metric",
            "surge-zones",
            "--threshold",
            "0.3",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Metric(_)));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_sensitivity() {
        let cli = Cli::try_parse_from(["taxi", "sensitivity", "--thresholds", "0.5,1.0,2.0"]).unwrap();
        match cli.command {
            Command::Sensitivity(args) => assert_eq!(args.thresholds, vec![0.5, 1.0, 2.0]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["taxi"]).is_err());
    }

    #[test]
    fn test_log_level_precedence() {
        let config = Config::from_str("[log]\nlevel = \"warn\"").unwrap();
        assert_eq!(resolve_log_level(Some("trace"), &config), "trace");
        assert_eq!(resolve_log_level(None, &config), "warn");
        assert_eq!(resolve_log_level(None, &Config::default()), "info");
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Some(std::path::Path::new("/nonexistent/taxi.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxi.toml");
        std::fs::write(&path, "[analysis]\nlimit = 5\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.analysis.limit, Some(5));
    }
}

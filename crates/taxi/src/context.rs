//! Shared command setup: backend connection, analysis window, output format

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use taxi_analytics::{AnalysisWindow, MetricsEngine};
use taxi_config::{AnalysisConfig, Config};
use taxi_query::{CapabilityProfile, OutputFormat, QueryEngine, ResolvedQueryConfig};

/// Analysis window flags, falling back to `[analysis]`
#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// First day of the window (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Day after the window (YYYY-MM-DD, exclusive)
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

impl WindowArgs {
    /// Resolve against configured defaults
    pub fn resolve(&self, analysis: &AnalysisConfig) -> Result<AnalysisWindow> {
        let start = self.start.unwrap_or(analysis.window_start);
        let end = self.end.unwrap_or(analysis.window_end);
        AnalysisWindow::from_dates(start, end).context("invalid analysis window")
    }
}

/// Output format flag
#[derive(Args, Debug, Clone)]
pub struct FormatArgs {
    /// Output format (table, json, csv)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

impl FormatArgs {
    pub fn parse(&self) -> Result<OutputFormat> {
        self.format
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid format: {}", e))
    }
}

/// Connected metrics engine plus the config it was built from
pub struct AppContext {
    pub config: Config,
    pub engine: MetricsEngine,
    pub profile: CapabilityProfile,
}

impl AppContext {
    /// Open the pool once and fix the capability profile for the process
    pub async fn connect(config: Config) -> Result<Self> {
        let resolved = ResolvedQueryConfig::from_config(&config.database)
            .context("invalid [database] configuration")?;
        let profile = resolved.backend.profile();

        let query_engine = QueryEngine::from_resolved_config(&resolved)
            .await
            .context("failed to connect to trip store")?;

        tracing::debug!(
            backend = query_engine.backend_name(),
            profile = %profile,
            "metrics engine ready"
        );

        let engine = MetricsEngine::new(Arc::new(query_engine), profile);
        Ok(Self {
            config,
            engine,
            profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    #[test]
    fn test_window_defaults_from_config() {
        let window = WindowArgs::default()
            .resolve(&AnalysisConfig::default())
            .unwrap();
        assert_eq!(window.start.date(), date("2025-01-01"));
        assert_eq!(window.end.date(), date("2025-02-01"));
    }

    #[test]
    fn test_window_flags_override() {
        let args = WindowArgs {
            start: None,
            end: Some(date("2025-05-01")),
        };
        let window = args.resolve(&AnalysisConfig::default()).unwrap();
        assert_eq!(window.start.date(), date("2025-01-01"));
        assert_eq!(window.end.date(), date("2025-05-01"));
    }

    #[test]
    fn test_inverted_window_rejected() {
        let args = WindowArgs {
            start: Some(date("2025-03-01")),
            end: Some(date("2025-01-01")),
        };
        assert!(args.resolve(&AnalysisConfig::default()).is_err());
    }

    #[test]
    fn test_format_flag() {
        let args = FormatArgs {
            format: "csv".to_string(),
        };
        assert_eq!(args.parse().unwrap(), OutputFormat::Csv);

        let args = FormatArgs {
            format: "yaml".to_string(),
        };
        assert!(args.parse().is_err());
    }

    #[tokio::test]
    async fn test_connect_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("ctx.db").display());
        let mut config = Config::default();
        config.apply_database_url(Some(url)).unwrap();

        let ctx = AppContext::connect(config).await.unwrap();
        assert_eq!(ctx.profile, CapabilityProfile::Reduced);
        assert_eq!(ctx.engine.backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn test_connect_without_url() {
        let err = AppContext::connect(Config::default()).await.err().unwrap();
        assert!(err.to_string().contains("[database]"));
    }
}

//! Configuration validation
//!
//! Validates values serde cannot check on its own:
//! - Backend name is one of the supported stores
//! - Pool size is positive
//! - Analysis window is non-empty
//! - Thresholds and costs are finite and non-negative

use crate::Config;
use crate::error::{ConfigError, Result};

/// Backend names accepted in `[database].backend`
const KNOWN_BACKENDS: &[&str] = &["sqlite", "postgres", "postgresql"];

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_database(config)?;
    validate_analysis(config)?;
    Ok(())
}

fn validate_database(config: &Config) -> Result<()> {
    let db = &config.database;

    if let Some(ref backend) = db.backend
        && !KNOWN_BACKENDS.contains(&backend.as_str())
    {
        return Err(ConfigError::invalid_value(
            "database",
            "backend",
            format!("unknown backend '{}' (expected sqlite or postgres)", backend),
        ));
    }

    if db.max_connections == 0 {
        return Err(ConfigError::invalid_value(
            "database",
            "max_connections",
            "must be at least 1",
        ));
    }

    if db.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
        return Err(ConfigError::invalid_value("database", "url", "must not be empty"));
    }

    Ok(())
}

fn validate_analysis(config: &Config) -> Result<()> {
    let analysis = &config.analysis;

    if analysis.window_end <= analysis.window_start {
        return Err(ConfigError::invalid_value(
            "analysis",
            "window_end",
            format!(
                "{} must be after window_start {}",
                analysis.window_end, analysis.window_start
            ),
        ));
    }

    non_negative("short_trip_threshold", analysis.short_trip_threshold)?;
    non_negative("surge_threshold", analysis.surge_threshold)?;
    non_negative("idle_cost_per_hour", analysis.idle_cost_per_hour)?;

    if analysis.limit == Some(0) {
        return Err(ConfigError::invalid_value(
            "analysis",
            "limit",
            "must be at least 1",
        ));
    }

    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid_value(
            "analysis",
            field,
            format!("must be a finite non-negative number, got {}", value),
        ));
    }
    Ok(())
}

//! Simulation commands - Minimum trip distance policy
//!
//! # Usage
//!
//! ```bash
//! taxi simulate --threshold 1.5
//! taxi sensitivity
//! taxi sensitivity --thresholds 0.25,0.5,1.0 --format csv
//! ```

use anyhow::{Context, Result};
use clap::Args;
use taxi_analytics::DEFAULT_SENSITIVITY_THRESHOLDS;
use taxi_config::Config;

use crate::context::{AppContext, FormatArgs, WindowArgs};
use crate::output;

/// Simulate command arguments
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Minimum trip distance in miles (default from [analysis])
    #[arg(short, long)]
    pub threshold: Option<f64>,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub format: FormatArgs,
}

/// Sensitivity command arguments
#[derive(Args, Debug)]
pub struct SensitivityArgs {
    /// Comma-separated thresholds in miles
    #[arg(short, long, value_delimiter = ',')]
    pub thresholds: Vec<f64>,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub format: FormatArgs,
}

/// Run the simulate command
pub async fn run_simulate(args: SimulateArgs, config: Config) -> Result<()> {
    let format = args.format.parse()?;
    let window = args.window.resolve(&config.analysis)?;
    let threshold = args
        .threshold
        .unwrap_or(config.analysis.short_trip_threshold);

    let ctx = AppContext::connect(config).await?;
    let report = ctx
        .engine
        .simulate_min_distance(&window, threshold)
        .await
        .with_context(|| format!("simulation at {} miles failed", threshold))?;

    let mut stdout = std::io::stdout().lock();
    output::write_report(&mut stdout, &report, format)
}

/// Run the sensitivity command
pub async fn run_sensitivity(args: SensitivityArgs, config: Config) -> Result<()> {
    let format = args.format.parse()?;
    let window = args.window.resolve(&config.analysis)?;
    let thresholds = resolve_thresholds(&args.thresholds);

    let ctx = AppContext::connect(config).await?;
    let report = ctx
        .engine
        .sensitivity(&window, &thresholds)
        .await
        .context("sensitivity analysis failed")?;

    let mut stdout = std::io::stdout().lock();
    output::write_report(&mut stdout, &report, format)
}

fn resolve_thresholds(requested: &[f64]) -> Vec<f64> {
    if requested.is_empty() {
        DEFAULT_SENSITIVITY_THRESHOLDS.to_vec()
    } else {
        requested.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        assert_eq!(resolve_thresholds(&[]), vec![0.5, 1.0, 1.5, 2.0]);
        assert_eq!(resolve_thresholds(&[0.25]), vec![0.25]);
    }
}

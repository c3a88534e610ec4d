//! Metric command - Run one metric family by name
//!
//! # Usage
//!
//! ```bash
//! taxi metric zone-revenue --limit 10
//! taxi metric congestion --format json
//! taxi metric short-trips --threshold 1.5
//! taxi metric surge-events --threshold 0.3 --limit 50
//! taxi metric net-profit --idle-cost 25
//! taxi metric wait-time --start 2025-01-01 --end 2025-05-01
//! taxi metric list
//! ```

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use taxi_analytics::{MetricKind, MetricParams};
use taxi_config::{AnalysisConfig, Config};

use crate::context::{AppContext, FormatArgs, WindowArgs};
use crate::output;

/// Metric command arguments
#[derive(Args, Debug)]
pub struct MetricArgs {
    /// Metric name (`list` prints every name)
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Short-trip distance (short-trips) or surge margin (surge-*)
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Maximum rows for ranked metrics
    #[arg(long)]
    pub limit: Option<u32>,

    /// Idle cost per vehicle-hour (net-profit, negative-zones)
    #[arg(long)]
    pub idle_cost: Option<f64>,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub format: FormatArgs,
}

/// Run the metric command
pub async fn run(args: MetricArgs, config: Config) -> Result<()> {
    if args.name == "list" {
        let mut stdout = std::io::stdout().lock();
        return write_metric_list(&mut stdout);
    }

    let kind: MetricKind = args.name.parse().map_err(|e| {
        anyhow::anyhow!("{} (run `taxi metric list` to see available metrics)", e)
    })?;
    let format = args.format.parse()?;
    let window = args.window.resolve(&config.analysis)?;
    let params = build_params(kind, &args, &config.analysis);

    let ctx = AppContext::connect(config).await?;
    let metric = kind.metric(&params);

    let report = ctx
        .engine
        .execute(metric.as_ref(), &window)
        .await
        .with_context(|| format!("metric {} failed", kind))?;

    let mut stdout = std::io::stdout().lock();
    output::write_result_report(&mut stdout, &report, format)?;

    eprintln!(
        "\n{} row(s) in {}ms [{}, {}]",
        report.data.row_count,
        report.data.execution_time_ms,
        ctx.engine.backend_name(),
        ctx.profile
    );

    Ok(())
}

/// Merge command-line overrides into configured defaults
fn build_params(kind: MetricKind, args: &MetricArgs, analysis: &AnalysisConfig) -> MetricParams {
    let mut params = MetricParams {
        limit: args.limit.or(analysis.limit),
        short_trip_threshold: analysis.short_trip_threshold,
        surge_threshold: analysis.surge_threshold,
        idle_cost_per_hour: args.idle_cost.unwrap_or(analysis.idle_cost_per_hour),
    };

    if let Some(threshold) = args.threshold {
        if is_surge(kind) {
            params.surge_threshold = threshold;
        } else {
            params.short_trip_threshold = threshold;
        }
    }

    params
}

fn is_surge(kind: MetricKind) -> bool {
    matches!(
        kind,
        MetricKind::SurgeEvents | MetricKind::SurgeZones | MetricKind::SurgeCorrelation
    )
}

fn write_metric_list<W: Write>(out: &mut W) -> Result<()> {
    for kind in MetricKind::ALL {
        match kind.default_limit() {
            Some(limit) => writeln!(out, "{:<24} (limit {})", kind.as_str(), limit)?,
            None => writeln!(out, "{}", kind)?,
        }
    }
    Ok(())
}

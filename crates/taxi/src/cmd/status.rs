//! Status command - Check the trip store connection
//!
//! # Usage
//!
//! ```bash
//! taxi status
//! taxi status --json
//! ```

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use taxi_config::Config;

use crate::context::AppContext;

/// Status command arguments
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    status: &'static str,
    backend: &'static str,
    profile: String,
    exact_percentiles: bool,
}

/// Run the status command
pub async fn run(args: StatusArgs, config: Config) -> Result<()> {
    let ctx = AppContext::connect(config).await?;

    ctx.engine
        .backend()
        .health_check()
        .await
        .context("trip store health check failed")?;

    let report = StatusReport {
        status: "ok",
        backend: ctx.engine.backend_name(),
        profile: ctx.profile.to_string(),
        exact_percentiles: ctx.profile.has_exact_percentiles(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Status:   {}", report.status);
        println!("Backend:  {}", report.backend);
        println!("Profile:  {}", report.profile);
        if !report.exact_percentiles {
            println!("Note:     medians and percentiles are approximated by the mean");
        }
    }

    Ok(())
}

//! Overview command - Headline totals for the analysis window

use anyhow::{Context, Result};
use clap::Args;
use taxi_config::Config;

use crate::context::{AppContext, FormatArgs, WindowArgs};
use crate::output;

/// Overview command arguments
#[derive(Args, Debug)]
pub struct OverviewArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub format: FormatArgs,
}

/// Run the overview command
pub async fn run(args: OverviewArgs, config: Config) -> Result<()> {
    let format = args.format.parse()?;
    let window = args.window.resolve(&config.analysis)?;

    let ctx = AppContext::connect(config).await?;
    let report = ctx
        .engine
        .overview(&window)
        .await
        .context("overview failed")?;

    let mut stdout = std::io::stdout().lock();
    output::write_report(&mut stdout, &report, format)
}

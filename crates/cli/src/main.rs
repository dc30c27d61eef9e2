mod cli;
mod offline;
mod stream;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use wellwatch_core::config::load_dotenv;
use wellwatch_core::Config;
use wellwatch_training::SyntheticConfig;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    load_dotenv();
    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    config.log_summary();

    match args.command {
        Command::Run { output, stats_interval } => stream::run(&config, &output, stats_interval).await?,
        Command::Replay { input, output } => stream::replay(&config, &input, &output).await?,
        Command::Label {
            telemetry,
            failures,
            output,
            window_size,
            horizon_hours,
            normalize,
        } => {
            offline::label(&config, &telemetry, &failures, &output, window_size, horizon_hours, normalize).await?
        }
        Command::Fit {
            telemetry,
            failures,
            out_dir,
            combined,
        } => offline::fit(&config, &telemetry, &failures, &out_dir, combined).await?,
        Command::Synth {
            out_dir,
            entities,
            samples,
            failure_rate,
            seed,
        } => {
            let synthetic = SyntheticConfig {
                entities,
                samples_per_entity: samples,
                failure_rate,
                seed,
                ramp_samples: SyntheticConfig::default().ramp_samples.min(samples.saturating_sub(1)),
                ..Default::default()
            };
            offline::synth(&out_dir, synthetic)?
        }
    }

    info!("wellwatch exited cleanly");
    Ok(())
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Real-time well telemetry scoring and offline training data tools.
///
/// Engine, queue and model settings come from the environment (see `.env`);
/// flags here only select inputs and outputs.
#[derive(Parser, Debug)]
#[command(name = "wellwatch", version, about = "Well telemetry windowing and predictive triggers")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Consume the configured SQS queue until SIGINT/SIGTERM.
    Run {
        #[command(flatten)]
        output: OutputArgs,

        /// Seconds between stats log lines (0 disables).
        #[arg(long, default_value = "60")]
        stats_interval: u64,
    },

    /// Push a JSONL telemetry file through the engine, then stop.
    Replay {
        /// One queue message body per line.
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Join telemetry with failure events into a labeled dataset.
    Label {
        /// Telemetry samples, JSONL.
        #[arg(long)]
        telemetry: PathBuf,

        /// Failure events, JSONL.
        #[arg(long)]
        failures: PathBuf,

        /// Dataset JSON to write.
        #[arg(long, short)]
        output: PathBuf,

        /// Overrides TRAINING_WINDOW_SIZE.
        #[arg(long)]
        window_size: Option<usize>,

        /// Overrides FAILURE_HORIZON_HOURS.
        #[arg(long)]
        horizon_hours: Option<u64>,

        /// Z-normalise the sequences and write the fitted normaliser next to
        /// the dataset.
        #[arg(long)]
        normalize: bool,
    },

    /// Fit anomaly and failure artifacts from historical data.
    Fit {
        #[arg(long)]
        telemetry: PathBuf,

        #[arg(long)]
        failures: PathBuf,

        /// Directory receiving anomaly.json and failure.json.
        #[arg(long, default_value = "models")]
        out_dir: PathBuf,

        /// Fit the anomaly model in combined (statistical + IQR) mode.
        #[arg(long)]
        combined: bool,
    },

    /// Write a seeded synthetic fleet: telemetry.jsonl and failures.jsonl.
    Synth {
        #[arg(long, default_value = "data")]
        out_dir: PathBuf,

        #[arg(long, default_value = "5")]
        entities: usize,

        #[arg(long, default_value = "500")]
        samples: usize,

        #[arg(long, default_value = "0.4")]
        failure_rate: f64,

        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct OutputArgs {
    /// Append predictions as JSONL to this file instead of stdout.
    #[arg(long)]
    pub predictions: Option<PathBuf>,

    /// Log predictions instead of writing JSON.
    #[arg(long, conflicts_with = "predictions")]
    pub log_only: bool,
}

//! `label`, `fit` and `synth`: offline dataset and artifact jobs.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use wellwatch_core::{Config, FailureEvent, TelemetrySample};
use wellwatch_engine::scoring::save_artifact;
use wellwatch_training::{
    fit_anomaly_artifact, fit_failure_artifact, generate, spawn_build, LabelJoiner, LabeledDataset, Normalizer,
    Progress, SyntheticConfig,
};

use crate::stream::shutdown_signal;

/// Read one JSON value per non-blank line.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut out = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), i + 1))?;
        out.push(value);
    }
    Ok(out)
}

pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    for item in items {
        serde_json::to_writer(&mut w, item)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer(&mut w, value)?;
    w.flush()?;
    Ok(())
}

fn load_inputs(telemetry: &Path, failures: &Path) -> Result<(Vec<TelemetrySample>, Vec<FailureEvent>)> {
    let samples: Vec<TelemetrySample> = read_jsonl(telemetry)?;
    let events: Vec<FailureEvent> = read_jsonl(failures)?;
    info!(samples = samples.len(), failures = events.len(), "Training inputs loaded");
    Ok((samples, events))
}

/// Build the dataset off the runtime, logging progress and cancelling on
/// SIGINT/SIGTERM.
async fn build_with_progress(
    config: &Config,
    joiner: LabelJoiner,
    samples: Vec<TelemetrySample>,
    events: Vec<FailureEvent>,
) -> Result<LabeledDataset> {
    let (tx, mut rx) = mpsc::channel::<Progress>(config.training.progress_channel_capacity);
    let cancel = CancellationToken::new();

    let logger = tokio::spawn(async move {
        let mut last_step = String::new();
        while let Some(p) = rx.recv().await {
            if p.step != last_step || p.percent % 10 == 0 {
                info!(percent = p.percent, step = %p.step, "Labeling progress");
                last_step = p.step;
            }
        }
    });
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, cancelling");
            cancel.cancel();
        })
    };

    let result = spawn_build(joiner, samples, events, Some(tx), cancel).await;
    watcher.abort();
    let _ = logger.await;
    Ok(result?)
}

pub async fn label(
    config: &Config,
    telemetry: &Path,
    failures: &Path,
    output: &Path,
    window_size: Option<usize>,
    horizon_hours: Option<u64>,
    normalize: bool,
) -> Result<()> {
    let window_size = window_size.unwrap_or(config.training.window_size);
    let horizon_ms = horizon_hours
        .map(|h| (h as i64).saturating_mul(3_600_000))
        .unwrap_or_else(|| config.training.horizon_ms());
    let joiner = LabelJoiner::new(window_size, horizon_ms)?;

    let (samples, events) = load_inputs(telemetry, failures)?;
    let mut dataset = build_with_progress(config, joiner, samples, events).await?;

    if normalize {
        let normalizer = Normalizer::fit(&dataset.sequences).context("no sequences to normalise")?;
        normalizer.apply(&mut dataset.sequences);
        let path = normalizer_path(output);
        write_json(&path, &normalizer)?;
        info!(path = %path.display(), "Normaliser written");
    }

    write_json(output, &dataset)?;
    info!(
        path = %output.display(),
        sequences = dataset.balance.total,
        positives = dataset.balance.positives,
        "Dataset written"
    );
    Ok(())
}

fn normalizer_path(output: &Path) -> PathBuf {
    output.with_extension("normalizer.json")
}

pub async fn fit(config: &Config, telemetry: &Path, failures: &Path, out_dir: &Path, combined: bool) -> Result<()> {
    let (samples, events) = load_inputs(telemetry, failures)?;
    fs::create_dir_all(out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;

    let anomaly = fit_anomaly_artifact(&samples, combined)?;
    let anomaly_path = out_dir.join("anomaly.json");
    save_artifact(&anomaly_path, &anomaly)?;
    info!(path = %anomaly_path.display(), features = anomaly.statistics.len(), "Anomaly artifact written");

    let joiner = LabelJoiner::new(config.training.window_size, config.training.horizon_ms())?;
    let dataset = build_with_progress(config, joiner, samples, events).await?;
    if dataset.sequences.is_empty() {
        bail!("no labeled windows; series shorter than window_size {}", config.training.window_size);
    }
    let failure = fit_failure_artifact(&dataset).context("failed to fit failure artifact")?;
    let failure_path = out_dir.join("failure.json");
    save_artifact(&failure_path, &failure)?;
    info!(path = %failure_path.display(), bias = failure.bias, "Failure artifact written");
    Ok(())
}

pub fn synth(out_dir: &Path, synthetic: SyntheticConfig) -> Result<()> {
    let data = generate(&synthetic)?;
    fs::create_dir_all(out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;
    write_jsonl(&out_dir.join("telemetry.jsonl"), &data.telemetry)?;
    write_jsonl(&out_dir.join("failures.jsonl"), &data.failures)?;
    info!(
        dir = %out_dir.display(),
        samples = data.telemetry.len(),
        failures = data.failures.len(),
        "Synthetic data written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "TRAINING_WINDOW_SIZE" => Some("12".into()),
            "FAILURE_HORIZON_HOURS" => Some("24".into()),
            _ => None,
        })
    }

    fn small_fleet() -> SyntheticConfig {
        SyntheticConfig {
            entities: 4,
            samples_per_entity: 150,
            failure_rate: 1.0,
            ramp_samples: 24,
            ..Default::default()
        }
    }

    #[test]
    fn jsonl_round_trip_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.jsonl");
        fs::write(
            &path,
            "{\"entityId\":\"w\",\"ts\":5,\"severity\":\"CRITICAL\"}\n\n{\"entityId\":\"w\",\"ts\":9,\"severity\":\"MINOR\"}\n",
        )
        .unwrap();
        let events: Vec<FailureEvent> = read_jsonl(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].ts, 9);

        fs::write(&path, "{\"entityId\":\"w\"}\n").unwrap();
        let err = read_jsonl::<FailureEvent>(&path).unwrap_err();
        assert!(err.to_string().contains(":1:"));
    }

    #[tokio::test]
    async fn synth_then_label_then_fit() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        synth(&data_dir, small_fleet()).unwrap();
        let telemetry = data_dir.join("telemetry.jsonl");
        let failures = data_dir.join("failures.jsonl");

        let dataset_path = dir.path().join("dataset.json");
        label(&config(), &telemetry, &failures, &dataset_path, None, None, true)
            .await
            .unwrap();
        let dataset: LabeledDataset = serde_json::from_slice(&fs::read(&dataset_path).unwrap()).unwrap();
        assert_eq!(dataset.window_size, 12);
        assert_eq!(dataset.sequences.len(), 4 * (150 - 12));
        assert!(dataset.balance.positives > 0);
        assert!(normalizer_path(&dataset_path).exists());

        let models = dir.path().join("models");
        fit(&config(), &telemetry, &failures, &models, true).await.unwrap();
        assert!(models.join("anomaly.json").exists());
        assert!(models.join("failure.json").exists());
    }
}

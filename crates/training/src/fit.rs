//! Artifact fitting from historical data.
//!
//! The anomaly artifact is per-feature population statistics. The failure
//! artifact is a baseline logistic read-out: class-mean differences of each
//! column's window level and slope, in units of the level spread, with the
//! bias set to the log-odds of the positive rate.

use chrono::Utc;
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::info;

use wellwatch_core::{FeatureStatistics, FeatureStatisticsTable, LabeledSequence, TelemetrySample};
use wellwatch_engine::scoring::{ANOMALY_ARTIFACT_VERSION, FAILURE_ARTIFACT_VERSION};
use wellwatch_engine::{AnomalyArtifact, FailureArtifact};

use crate::dataset::LabeledDataset;
use crate::error::TrainingError;
use crate::normalize::population_stats;

/// Fit per-feature statistics over every sample, features in first-seen order.
pub fn fit_anomaly_artifact(
    samples: &[TelemetrySample],
    combined: bool,
) -> Result<AnomalyArtifact, TrainingError> {
    let mut columns: IndexMap<&str, Vec<f64>> = IndexMap::new();
    for sample in samples {
        for (name, value) in sample.features() {
            columns.entry(name.as_str()).or_default().push(*value);
        }
    }
    if columns.is_empty() {
        return Err(TrainingError::InvalidInput("no telemetry to fit statistics on".into()));
    }

    let fitted: Vec<(String, Option<FeatureStatistics>)> = columns
        .into_iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(name, values)| (name.to_string(), FeatureStatistics::from_values(&values)))
        .collect();
    let statistics: FeatureStatisticsTable = fitted
        .into_iter()
        .filter_map(|(name, stats)| stats.map(|s| (name, s)))
        .collect();
    if statistics.is_empty() {
        return Err(TrainingError::InvalidInput("no finite feature values".into()));
    }

    info!(samples = samples.len(), features = statistics.len(), "Anomaly statistics fitted");
    Ok(AnomalyArtifact {
        version: ANOMALY_ARTIFACT_VERSION,
        trained_at: Utc::now(),
        samples: samples.len(),
        statistics,
        combined,
    })
}

/// Per-column window mean and per-step slope of one sequence.
fn level_and_slope(sequence: &[Vec<f64>], dim: usize) -> (Vec<f64>, Vec<f64>) {
    let rows = sequence.len();
    let mut level = vec![0.0; dim];
    for row in sequence {
        for (acc, v) in level.iter_mut().zip(row) {
            *acc += v;
        }
    }
    for l in &mut level {
        *l /= rows as f64;
    }
    let slope = match (sequence.first(), sequence.last()) {
        (Some(first), Some(last)) if rows > 1 => first
            .iter()
            .zip(last)
            .map(|(a, b)| (b - a) / (rows - 1) as f64)
            .collect(),
        _ => vec![0.0; dim],
    };
    (level, slope)
}

/// Mean window level and mean slope over the sequences of one class.
fn class_means(summaries: &[(u8, Vec<f64>, Vec<f64>)], label: u8, dim: usize) -> (Vec<f64>, Vec<f64>) {
    let mut level = vec![0.0; dim];
    let mut slope = vec![0.0; dim];
    let mut n = 0usize;
    for (_, l, s) in summaries.iter().filter(|s| s.0 == label) {
        for (acc, v) in level.iter_mut().zip(l) {
            *acc += v;
        }
        for (acc, v) in slope.iter_mut().zip(s) {
            *acc += v;
        }
        n += 1;
    }
    for v in level.iter_mut().chain(slope.iter_mut()) {
        *v /= n as f64;
    }
    (level, slope)
}

/// Fit the baseline failure read-out. Needs both classes present and the
/// dataset built with the sensor sequence layout.
pub fn fit_failure_artifact(dataset: &LabeledDataset) -> Result<FailureArtifact, TrainingError> {
    let balance = dataset.balance;
    if balance.positives == 0 || balance.negatives == 0 {
        return Err(TrainingError::InvalidInput(format!(
            "need both classes, got {} positive and {} negative sequences",
            balance.positives, balance.negatives
        )));
    }
    let dim = dataset.features.len();
    let usable: Vec<&LabeledSequence> = dataset
        .sequences
        .iter()
        .filter(|s| !s.sequence.is_empty() && s.sequence.iter().all(|r| r.len() == dim))
        .collect();
    if usable.len() != dataset.sequences.len() {
        return Err(TrainingError::InvalidInput(format!(
            "{} sequences are empty or not {dim} columns wide",
            dataset.sequences.len() - usable.len()
        )));
    }

    let summaries: Vec<(u8, Vec<f64>, Vec<f64>)> = usable
        .par_iter()
        .map(|s| {
            let (level, slope) = level_and_slope(&s.sequence, dim);
            (s.label, level, slope)
        })
        .collect();

    let levels: Vec<&[f64]> = summaries.iter().map(|(_, l, _)| l.as_slice()).collect();
    let (center, spread) = population_stats(&levels)
        .ok_or_else(|| TrainingError::InvalidInput("dataset has no columns".into()))?;
    let scale: Vec<f64> = spread.into_iter().map(|s| if s > f64::EPSILON { s } else { 1.0 }).collect();

    let (pos_level, pos_slope) = class_means(&summaries, 1, dim);
    let (neg_level, neg_slope) = class_means(&summaries, 0, dim);
    let weights = |pos: &[f64], neg: &[f64]| -> Vec<f64> {
        pos.iter().zip(neg).zip(&scale).map(|((p, n), s)| (p - n) / s).collect()
    };
    let level_weights = weights(&pos_level, &neg_level);
    let trend_weights = weights(&pos_slope, &neg_slope);

    let ratio = balance.positive_ratio;
    let artifact = FailureArtifact {
        version: FAILURE_ARTIFACT_VERSION,
        trained_at: Utc::now(),
        features: dataset.features.clone(),
        center,
        scale,
        level_weights,
        trend_weights,
        bias: (ratio / (1.0 - ratio)).ln(),
    };
    artifact.validate()?;

    info!(
        sequences = balance.total,
        positives = balance.positives,
        bias = artifact.bias,
        "Failure artifact fitted"
    );
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::ClassBalance;
    use wellwatch_core::catalog::SEQUENCE_FEATURES;
    use wellwatch_core::{FeatureMap, ScoreResult};
    use wellwatch_engine::{AnomalyAdapter, FailureAdapter, ScoringAdapter, ScoringInput};

    fn sample(ts: i64, pairs: &[(&str, f64)]) -> TelemetrySample {
        let f: FeatureMap = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        TelemetrySample::new("well-1", "t", ts, f).unwrap()
    }

    #[test]
    fn anomaly_statistics_follow_first_seen_order() {
        let samples = vec![
            sample(0, &[("pump_temperature", 140.0), ("oil_rate", 700.0)]),
            sample(1, &[("pump_temperature", 160.0), ("pump_vibration", 1.0)]),
            sample(2, &[("pump_temperature", 150.0), ("oil_rate", 900.0)]),
        ];
        let artifact = fit_anomaly_artifact(&samples, true).unwrap();
        let names: Vec<_> = artifact.statistics.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["pump_temperature", "oil_rate", "pump_vibration"]);
        assert_eq!(artifact.samples, 3);
        assert!(artifact.combined);

        let temp = &artifact.statistics["pump_temperature"];
        assert_eq!(temp.mean, 150.0);
        assert_eq!(temp.p50, 150.0);
        assert_eq!(artifact.statistics["oil_rate"].mean, 800.0);
    }

    #[test]
    fn fitted_anomaly_artifact_scores_outliers_higher() {
        let samples: Vec<_> = (0..100)
            .map(|i| sample(i, &[("pump_temperature", 140.0 + (i % 21) as f64)]))
            .collect();
        let adapter = AnomalyAdapter::Trained(fit_anomaly_artifact(&samples, false).unwrap());
        let score = |t: f64| -> ScoreResult {
            let f: FeatureMap = [("pump_temperature".to_string(), t)].into_iter().collect();
            adapter.score(&ScoringInput { features: &f, sequence: None, threshold: 0.5 }).unwrap()
        };
        assert!(score(230.0).score > score(150.0).score);
        assert!(score(230.0).is_flagged);
    }

    #[test]
    fn anomaly_fit_needs_data() {
        assert!(matches!(fit_anomaly_artifact(&[], false), Err(TrainingError::InvalidInput(_))));
    }

    fn window(temp: f64, rising: f64) -> Vec<Vec<f64>> {
        let idx = SEQUENCE_FEATURES.iter().position(|f| *f == "pump_temperature").unwrap();
        (0..6)
            .map(|i| {
                let mut row = vec![1.0; SEQUENCE_FEATURES.len()];
                row[idx] = temp + rising * i as f64;
                row
            })
            .collect()
    }

    fn dataset(sequences: Vec<LabeledSequence>) -> LabeledDataset {
        LabeledDataset {
            window_size: 6,
            horizon_ms: 1,
            features: SEQUENCE_FEATURES.iter().map(|s| s.to_string()).collect(),
            balance: ClassBalance::of(&sequences),
            sequences,
        }
    }

    fn labeled(sequence: Vec<Vec<f64>>, label: u8) -> LabeledSequence {
        LabeledSequence { entity_id: "w".into(), sequence, label, prediction_ts: 0 }
    }

    #[test]
    fn failure_read_out_separates_the_classes() {
        let mut sequences = Vec::new();
        for i in 0..30 {
            sequences.push(labeled(window(145.0 + (i % 5) as f64, 0.0), 0));
        }
        for i in 0..10 {
            sequences.push(labeled(window(185.0 + (i % 5) as f64, 3.0), 1));
        }
        let artifact = fit_failure_artifact(&dataset(sequences)).unwrap();
        assert!((artifact.bias - (0.25f64 / 0.75).ln()).abs() < 1e-12);

        let idx = SEQUENCE_FEATURES.iter().position(|f| *f == "pump_temperature").unwrap();
        assert!(artifact.level_weights[idx] > 0.0);
        assert!(artifact.trend_weights[idx] > 0.0);
        // Constant columns carry no signal and get unit scale.
        assert_eq!(artifact.level_weights[0], 0.0);
        assert_eq!(artifact.scale[0], 1.0);

        let adapter = FailureAdapter::from_artifact(artifact).unwrap();
        let f = FeatureMap::new();
        let p = |s: Vec<Vec<f64>>| {
            adapter
                .score(&ScoringInput { features: &f, sequence: Some(&s), threshold: 0.5 })
                .unwrap()
                .score
        };
        assert!(p(window(190.0, 3.0)) > 0.9);
        assert!(p(window(145.0, 0.0)) < 0.1);
    }

    #[test]
    fn failure_fit_needs_both_classes() {
        let only_negative = dataset(vec![labeled(window(150.0, 0.0), 0)]);
        assert!(matches!(fit_failure_artifact(&only_negative), Err(TrainingError::InvalidInput(_))));
    }

    #[test]
    fn failure_fit_rejects_foreign_layout() {
        let mut ds = dataset(vec![labeled(window(150.0, 0.0), 0), labeled(window(190.0, 1.0), 1)]);
        ds.features.swap(0, 1);
        assert!(matches!(fit_failure_artifact(&ds), Err(TrainingError::Scoring(_))));
    }
}

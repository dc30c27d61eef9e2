use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use wellwatch_core::{FeatureStatisticsTable, ScoreMethod, ScoreResult};

use super::artifact::load_artifact;
use super::fallback::{FallbackPolicy, FlagRule};
use super::{ScoringAdapter, ScoringInput};
use crate::error::ScoringError;

/// z-score that maps to a full anomaly score of 1.0.
const Z_SATURATION: f64 = 5.0;

/// IQR outliers needed to flag in combined mode.
const COMBINED_MIN_OUTLIERS: usize = 2;

pub const ANOMALY_ARTIFACT_VERSION: u32 = 1;

/// Fitted anomaly model: per-feature distributions from healthy history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyArtifact {
    pub version: u32,
    pub trained_at: DateTime<Utc>,
    /// Samples the statistics were fitted on.
    pub samples: usize,
    pub statistics: FeatureStatisticsTable,
    /// Also flag when several features are IQR outliers at once.
    #[serde(default)]
    pub combined: bool,
}

/// Tier-1 point scorer.
#[derive(Debug)]
pub enum AnomalyAdapter {
    Trained(AnomalyArtifact),
    Untrained(FallbackPolicy),
}

impl AnomalyAdapter {
    /// Placeholder flagging about one sample in ten at random.
    pub fn untrained() -> Self {
        Self::Untrained(FallbackPolicy::uniform(0.0, 1.0, FlagRule::Probability(0.1), None))
    }

    /// Trained when `path` names an existing artifact, untrained when no path
    /// is given or the file does not exist. A present but invalid file is an
    /// error.
    pub fn from_artifact_path(path: Option<&Path>) -> Result<Self, ScoringError> {
        match path {
            Some(p) if p.exists() => {
                let artifact: AnomalyArtifact = load_artifact(p)?;
                if artifact.statistics.is_empty() {
                    return Err(ScoringError::Artifact(format!(
                        "{} has no feature statistics",
                        p.display()
                    )));
                }
                Ok(Self::Trained(artifact))
            }
            Some(p) => {
                warn!(path = %p.display(), "Anomaly artifact not found, using untrained fallback");
                Ok(Self::untrained())
            }
            None => Ok(Self::untrained()),
        }
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

impl ScoringAdapter for AnomalyAdapter {
    fn name(&self) -> &str {
        "anomaly"
    }

    fn trained(&self) -> bool {
        matches!(self, AnomalyAdapter::Trained(_))
    }

    fn score(&self, input: &ScoringInput<'_>) -> Result<ScoreResult, ScoringError> {
        let artifact = match self {
            AnomalyAdapter::Trained(a) => a,
            AnomalyAdapter::Untrained(fallback) => return Ok(fallback.sample(input.threshold)),
        };

        let mut max_z: f64 = 0.0;
        let mut outliers = 0usize;
        for (name, value) in input.features {
            let Some(stats) = artifact.statistics.get(name) else {
                continue;
            };
            max_z = max_z.max(stats.z_score(*value));
            if stats.is_iqr_outlier(*value) {
                outliers += 1;
            }
        }

        let score = round4((max_z / Z_SATURATION).min(1.0));
        let statistical = score >= input.threshold;
        let (is_flagged, method) = if artifact.combined {
            (statistical || outliers >= COMBINED_MIN_OUTLIERS, ScoreMethod::Combined)
        } else {
            (statistical, ScoreMethod::Statistical)
        };

        Ok(ScoreResult { score, is_flagged, method })
    }

    fn feature_statistics(&self) -> Option<&FeatureStatisticsTable> {
        match self {
            AnomalyAdapter::Trained(a) => Some(&a.statistics),
            AnomalyAdapter::Untrained(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::save_artifact;
    use wellwatch_core::{FeatureMap, FeatureStatistics};

    fn stats(mean: f64, std: f64) -> FeatureStatistics {
        FeatureStatistics { mean, std, p25: mean - std, p50: mean, p75: mean + std, iqr: 2.0 * std }
    }

    fn artifact(combined: bool) -> AnomalyArtifact {
        let mut table = FeatureStatisticsTable::new();
        table.insert("pump_temperature".into(), stats(150.0, 20.0));
        table.insert("pump_vibration".into(), stats(1.0, 0.2));
        table.insert("motor_current".into(), stats(60.0, 5.0));
        AnomalyArtifact {
            version: ANOMALY_ARTIFACT_VERSION,
            trained_at: Utc::now(),
            samples: 1000,
            statistics: table,
            combined,
        }
    }

    fn features(pairs: &[(&str, f64)]) -> FeatureMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn trained_scores_max_z_over_five() {
        let a = AnomalyAdapter::Trained(artifact(false));
        let f = features(&[("pump_temperature", 210.0), ("pump_vibration", 1.2), ("unknown", 1e9)]);
        let r = a.score(&ScoringInput { features: &f, sequence: None, threshold: 0.5 }).unwrap();
        // z = 60 / 20 = 3.0
        assert!((r.score - 0.6).abs() < 1e-9);
        assert!(r.is_flagged);
        assert_eq!(r.method, ScoreMethod::Statistical);
        assert!(a.trained());
    }

    #[test]
    fn score_saturates_at_one() {
        let a = AnomalyAdapter::Trained(artifact(false));
        let f = features(&[("motor_current", 200.0)]);
        let r = a.score(&ScoringInput { features: &f, sequence: None, threshold: 0.99 }).unwrap();
        assert_eq!(r.score, 1.0);
        assert!(r.is_flagged);
    }

    #[test]
    fn combined_flags_on_two_iqr_outliers() {
        // z = 4.5 on both (score 0.9, under the threshold), and both sit past the
        // upper fence at mean + 4 std.
        let f = features(&[("pump_vibration", 1.0 + 0.2 * 4.5), ("motor_current", 60.0 + 5.0 * 4.5)]);
        let plain = AnomalyAdapter::Trained(artifact(false));
        let combined = AnomalyAdapter::Trained(artifact(true));
        let input = ScoringInput { features: &f, sequence: None, threshold: 0.95 };

        let r = plain.score(&input).unwrap();
        assert!(!r.is_flagged);
        let r = combined.score(&input).unwrap();
        assert!(r.is_flagged);
        assert_eq!(r.method, ScoreMethod::Combined);
    }

    #[test]
    fn untrained_uses_fallback() {
        let a = AnomalyAdapter::Untrained(FallbackPolicy::constant(0.3, FlagRule::Threshold));
        let f = features(&[("pump_temperature", 999.0)]);
        let r = a.score(&ScoringInput { features: &f, sequence: None, threshold: 0.2 }).unwrap();
        assert_eq!(r.score, 0.3);
        assert!(r.is_flagged);
        assert_eq!(r.method, ScoreMethod::Model);
        assert!(!a.trained());
        assert!(a.feature_statistics().is_none());
    }

    #[test]
    fn loads_from_artifact_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("anomaly.json");
        save_artifact(&path, &artifact(true)).unwrap();

        let a = AnomalyAdapter::from_artifact_path(Some(&path)).unwrap();
        assert!(a.trained());
        assert_eq!(a.feature_statistics().unwrap().len(), 3);

        let missing = AnomalyAdapter::from_artifact_path(Some(&dir.path().join("nope.json"))).unwrap();
        assert!(!missing.trained());
        assert!(!AnomalyAdapter::from_artifact_path(None).unwrap().trained());
    }

    #[test]
    fn invalid_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anomaly.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            AnomalyAdapter::from_artifact_path(Some(&path)),
            Err(ScoringError::Json(_))
        ));
    }
}

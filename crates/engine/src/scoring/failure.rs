use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use wellwatch_core::catalog::SEQUENCE_FEATURES;
use wellwatch_core::{ScoreMethod, ScoreResult};

use super::artifact::load_artifact;
use super::fallback::{FallbackPolicy, FlagRule};
use super::{ScoringAdapter, ScoringInput};
use crate::error::ScoringError;

pub const FAILURE_ARTIFACT_VERSION: u32 = 1;

/// Exported sequence model: a logistic read-out over each column's window
/// level and slope, standardised by `center`/`scale`.
///
/// Columns follow the sensor sequence layout; the artifact must list the same
/// features in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureArtifact {
    pub version: u32,
    pub trained_at: DateTime<Utc>,
    pub features: Vec<String>,
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
    pub level_weights: Vec<f64>,
    pub trend_weights: Vec<f64>,
    pub bias: f64,
}

impl FailureArtifact {
    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.features.len() != SEQUENCE_FEATURES.len()
            || self.features.iter().zip(SEQUENCE_FEATURES).any(|(a, b)| a != b)
        {
            return Err(ScoringError::Artifact(
                "feature layout does not match the sensor sequence layout".into(),
            ));
        }
        let n = self.features.len();
        for (name, len) in [
            ("center", self.center.len()),
            ("scale", self.scale.len()),
            ("level_weights", self.level_weights.len()),
            ("trend_weights", self.trend_weights.len()),
        ] {
            if len != n {
                return Err(ScoringError::Artifact(format!("{name} has {len} entries, expected {n}")));
            }
        }
        if self.scale.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(ScoringError::Artifact("scale entries must be positive".into()));
        }
        Ok(())
    }

    fn probability(&self, sequence: &[Vec<f64>]) -> Result<f64, ScoringError> {
        // `Trained` can be built directly, so never index past a short table.
        self.validate()?;
        let n = self.features.len();
        let rows = sequence.len();
        if rows == 0 {
            return Err(ScoringError::Input("empty sequence".into()));
        }
        if let Some(bad) = sequence.iter().find(|r| r.len() != n) {
            return Err(ScoringError::Input(format!(
                "sequence row has {} columns, expected {n}",
                bad.len()
            )));
        }

        let mut logit = self.bias;
        for col in 0..n {
            let mean = sequence.iter().map(|r| r[col]).sum::<f64>() / rows as f64;
            let slope = if rows > 1 {
                (sequence[rows - 1][col] - sequence[0][col]) / (rows - 1) as f64
            } else {
                0.0
            };
            let level = (mean - self.center[col]) / self.scale[col];
            let trend = slope / self.scale[col];
            logit += self.level_weights[col] * level + self.trend_weights[col] * trend;
        }
        if !logit.is_finite() {
            return Err(ScoringError::Model(format!("non-finite logit {logit}")));
        }
        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}

/// Tier-2 sequence scorer producing a failure probability.
#[derive(Debug)]
pub enum FailureAdapter {
    Trained(FailureArtifact),
    Untrained(FallbackPolicy),
}

impl FailureAdapter {
    /// Placeholder drawing probabilities uniformly from `[0.1, 0.9)`.
    pub fn untrained() -> Self {
        Self::Untrained(FallbackPolicy::uniform(0.1, 0.9, FlagRule::Threshold, None))
    }

    pub fn from_artifact(artifact: FailureArtifact) -> Result<Self, ScoringError> {
        artifact.validate()?;
        Ok(Self::Trained(artifact))
    }

    /// Same selection rules as the anomaly adapter.
    pub fn from_artifact_path(path: Option<&Path>) -> Result<Self, ScoringError> {
        match path {
            Some(p) if p.exists() => Self::from_artifact(load_artifact(p)?),
            Some(p) => {
                warn!(path = %p.display(), "Failure artifact not found, using untrained fallback");
                Ok(Self::untrained())
            }
            None => Ok(Self::untrained()),
        }
    }
}

impl ScoringAdapter for FailureAdapter {
    fn name(&self) -> &str {
        "failure"
    }

    fn trained(&self) -> bool {
        matches!(self, FailureAdapter::Trained(_))
    }

    fn score(&self, input: &ScoringInput<'_>) -> Result<ScoreResult, ScoringError> {
        let artifact = match self {
            FailureAdapter::Trained(a) => a,
            FailureAdapter::Untrained(fallback) => return Ok(fallback.sample(input.threshold)),
        };
        let sequence = input
            .sequence
            .ok_or_else(|| ScoringError::Input("failure model needs a window sequence".into()))?;
        let p = artifact.probability(sequence)?;
        Ok(ScoreResult {
            score: p,
            is_flagged: p > input.threshold,
            method: ScoreMethod::Model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wellwatch_core::FeatureMap;

    fn artifact() -> FailureArtifact {
        let n = SEQUENCE_FEATURES.len();
        let temp = SEQUENCE_FEATURES.iter().position(|f| *f == "pump_temperature").unwrap();
        let mut level_weights = vec![0.0; n];
        level_weights[temp] = 2.0;
        let mut trend_weights = vec![0.0; n];
        trend_weights[temp] = 10.0;
        let mut center = vec![0.0; n];
        center[temp] = 150.0;
        let mut scale = vec![1.0; n];
        scale[temp] = 20.0;
        FailureArtifact {
            version: FAILURE_ARTIFACT_VERSION,
            trained_at: Utc::now(),
            features: SEQUENCE_FEATURES.iter().map(|s| s.to_string()).collect(),
            center,
            scale,
            level_weights,
            trend_weights,
            bias: -2.0,
        }
    }

    fn flat(temp: f64, rows: usize) -> Vec<Vec<f64>> {
        let idx = SEQUENCE_FEATURES.iter().position(|f| *f == "pump_temperature").unwrap();
        (0..rows)
            .map(|_| {
                let mut r = vec![0.0; SEQUENCE_FEATURES.len()];
                r[idx] = temp;
                r
            })
            .collect()
    }

    #[test]
    fn hotter_windows_score_higher() {
        let a = FailureAdapter::from_artifact(artifact()).unwrap();
        let f = FeatureMap::new();
        let cool = flat(150.0, 24);
        let hot = flat(200.0, 24);
        let p_cool = a
            .score(&ScoringInput { features: &f, sequence: Some(&cool), threshold: 0.7 })
            .unwrap();
        let p_hot = a
            .score(&ScoringInput { features: &f, sequence: Some(&hot), threshold: 0.7 })
            .unwrap();
        // Level 0 -> sigmoid(-2); level 2.5 -> sigmoid(3).
        assert!((p_cool.score - 1.0 / (1.0 + 2f64.exp())).abs() < 1e-9);
        assert!(!p_cool.is_flagged);
        assert!(p_hot.score > 0.95);
        assert!(p_hot.is_flagged);
    }

    #[test]
    fn rising_trend_raises_probability() {
        let a = FailureAdapter::from_artifact(artifact()).unwrap();
        let f = FeatureMap::new();
        let idx = SEQUENCE_FEATURES.iter().position(|f| *f == "pump_temperature").unwrap();
        let mut rising = flat(150.0, 24);
        for (i, row) in rising.iter_mut().enumerate() {
            row[idx] = 140.0 + i as f64;
        }
        let flat_seq = flat(151.5, 24);
        let p = |s: &[Vec<f64>]| {
            a.score(&ScoringInput { features: &f, sequence: Some(s), threshold: 0.5 })
                .unwrap()
                .score
        };
        // Same window mean (151.5), but the rising window has a positive slope.
        assert!(p(rising.as_slice()) > p(flat_seq.as_slice()));
    }

    #[test]
    fn requires_sequence_of_right_width() {
        let a = FailureAdapter::from_artifact(artifact()).unwrap();
        let f = FeatureMap::new();
        let err = a.score(&ScoringInput { features: &f, sequence: None, threshold: 0.5 }).unwrap_err();
        assert!(matches!(err, ScoringError::Input(_)));
        let narrow = vec![vec![1.0, 2.0]];
        let err = a
            .score(&ScoringInput { features: &f, sequence: Some(&narrow), threshold: 0.5 })
            .unwrap_err();
        assert!(err.to_string().contains("columns"));
    }

    #[test]
    fn validate_rejects_mismatched_layout() {
        let mut bad = artifact();
        bad.features.swap(0, 1);
        assert!(FailureAdapter::from_artifact(bad).is_err());

        let mut bad = artifact();
        bad.scale[0] = 0.0;
        assert!(FailureAdapter::from_artifact(bad).is_err());

        let mut bad = artifact();
        bad.bias = 0.0;
        bad.trend_weights.pop();
        assert!(matches!(FailureAdapter::from_artifact(bad), Err(ScoringError::Artifact(_))));
    }

    #[test]
    fn directly_built_short_artifact_errors_instead_of_panicking() {
        let mut short = artifact();
        short.center.truncate(3);
        short.level_weights.clear();
        let a = FailureAdapter::Trained(short);
        let f = FeatureMap::new();
        let seq = flat(200.0, 24);
        let err = a
            .score(&ScoringInput { features: &f, sequence: Some(&seq), threshold: 0.5 })
            .unwrap_err();
        assert!(matches!(err, ScoringError::Artifact(_)));
    }

    #[test]
    fn untrained_draws_in_documented_range() {
        let a = FailureAdapter::untrained();
        assert!(!a.trained());
        let f = FeatureMap::new();
        for _ in 0..200 {
            let r = a.score(&ScoringInput { features: &f, sequence: None, threshold: 0.7 }).unwrap();
            assert!((0.1..0.9).contains(&r.score));
            assert_eq!(r.is_flagged, r.score >= 0.7);
        }
    }
}

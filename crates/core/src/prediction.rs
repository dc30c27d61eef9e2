//! Scoring and prediction output types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a [`ScoreResult`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreMethod {
    Model,
    Statistical,
    Combined,
}

/// Raw output of one scoring adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub is_flagged: bool,
    pub method: ScoreMethod,
}

/// One feature that sits outside its expected range or learned distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDeviation {
    pub feature: String,
    pub current_value: f64,
    pub expected_min: f64,
    pub expected_max: f64,
    /// Normalised to `[0, 1]`; `0.0` when no learned statistics exist.
    pub deviation_score: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionKind {
    Anomaly,
    Failure,
    Health,
}

impl std::fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictionKind::Anomaly => write!(f, "ANOMALY"),
            PredictionKind::Failure => write!(f, "FAILURE"),
            PredictionKind::Health => write!(f, "HEALTH"),
        }
    }
}

/// Severity of a contributing factor. Declaration order is the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactorTrend {
    Up,
    Down,
    Stable,
}

/// A thresholded feature pushing failure risk up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub feature: String,
    pub current_value: f64,
    pub threshold: f64,
    pub impact: Impact,
    pub trend: FactorTrend,
    pub unit: String,
}

/// Derived failure horizon attached to FAILURE predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailureOutlook {
    pub probability: f64,
    pub days_to_failure: Option<u32>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthLevel {
    Critical,
    Poor,
    Fair,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthTrend {
    Improving,
    Stable,
    Degrading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAssessment {
    /// 0–100, higher is healthier.
    pub score: u8,
    pub level: HealthLevel,
    pub trend: HealthTrend,
    pub component_scores: BTreeMap<String, u8>,
}

/// Why a Tier-2 (expensive) scoring run happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier2Reason {
    /// Tier-1 flagged the same message.
    Escalation,
    /// Periodic cadence hit.
    Cadence,
}

/// One emitted signal. Built once per trigger firing and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub id: Uuid,
    pub entity_id: String,
    pub tenant_id: String,
    pub kind: PredictionKind,
    pub produced_at: DateTime<Utc>,
    /// Timestamp (epoch ms) of the sample that fired the trigger.
    pub sample_timestamp_ms: i64,
    pub score_result: ScoreResult,
    /// Copied from the adapter: `false` means the score came from a placeholder.
    pub trained: bool,
    pub top_deviations: Vec<FeatureDeviation>,
    pub contributing_factors: Vec<ContributingFactor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureOutlook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier2_reason: Option<Tier2Reason>,
}

impl PredictionResult {
    pub fn is_anomaly(&self) -> bool {
        self.kind == PredictionKind::Anomaly && self.score_result.is_flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impact_orders_high_first() {
        let mut v = vec![Impact::Low, Impact::High, Impact::Medium];
        v.sort();
        assert_eq!(v, vec![Impact::High, Impact::Medium, Impact::Low]);
    }

    #[test]
    fn enums_serialize_upper_case() {
        assert_eq!(serde_json::to_string(&ScoreMethod::Combined).unwrap(), "\"COMBINED\"");
        assert_eq!(serde_json::to_string(&PredictionKind::Failure).unwrap(), "\"FAILURE\"");
        assert_eq!(serde_json::to_string(&Tier2Reason::Cadence).unwrap(), "\"CADENCE\"");
    }

    #[test]
    fn kind_display() {
        assert_eq!(PredictionKind::Health.to_string(), "HEALTH");
    }
}

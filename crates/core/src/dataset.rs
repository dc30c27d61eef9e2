use serde::{Deserialize, Serialize};

/// Severity of a recorded alarm. Only [`FailureSeverity::Critical`] and
/// [`FailureSeverity::Major`] count as failures when labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureSeverity {
    Critical,
    Major,
    Minor,
    Warning,
    Indeterminate,
}

impl FailureSeverity {
    pub fn is_failure(&self) -> bool {
        matches!(self, FailureSeverity::Critical | FailureSeverity::Major)
    }
}

/// A discrete failure (alarm) on one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEvent {
    pub entity_id: String,
    /// Epoch milliseconds.
    pub ts: i64,
    pub severity: FailureSeverity,
}

/// One supervised training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledSequence {
    pub entity_id: String,
    /// `window_size` rows, one feature vector per sample, oldest first.
    pub sequence: Vec<Vec<f64>>,
    pub label: u8,
    /// Timestamp of the sample right after the sequence.
    pub prediction_ts: i64,
}

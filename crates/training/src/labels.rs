//! Sliding-window label join for one entity.
//!
//! Window `i` covers `series[i .. i + window_size]`. Its prediction point is
//! the timestamp of `series[i + window_size]`, and it is labeled 1 iff a
//! failure of the same entity falls in `[end, end + horizon]`, both ends
//! inclusive. The last window therefore ends one sample before the series does.

use wellwatch_core::{FailureEvent, LabeledSequence, TelemetrySample};
use wellwatch_engine::SequenceBuilder;

use crate::error::TrainingError;

#[derive(Debug, Clone)]
pub struct LabelJoiner {
    window_size: usize,
    horizon_ms: i64,
    sequences: SequenceBuilder,
}

impl LabelJoiner {
    pub fn new(window_size: usize, horizon_ms: i64) -> Result<Self, TrainingError> {
        if window_size == 0 {
            return Err(TrainingError::InvalidInput("window_size must be > 0".into()));
        }
        if horizon_ms < 0 {
            return Err(TrainingError::InvalidInput("horizon must not be negative".into()));
        }
        Ok(Self {
            window_size,
            horizon_ms,
            sequences: SequenceBuilder::default(),
        })
    }

    /// Use a custom sequence layout instead of the failure-model columns.
    pub fn with_sequence_builder(mut self, sequences: SequenceBuilder) -> Self {
        self.sequences = sequences;
        self
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn horizon_ms(&self) -> i64 {
        self.horizon_ms
    }

    pub fn sequence_builder(&self) -> &SequenceBuilder {
        &self.sequences
    }

    /// Label every window of one entity's chronological series.
    ///
    /// Failures of other entities and non-failure severities are ignored.
    pub fn join_entity(
        &self,
        entity_id: &str,
        series: &[TelemetrySample],
        failures: &[FailureEvent],
    ) -> Vec<LabeledSequence> {
        let mut failure_ts: Vec<i64> = failures
            .iter()
            .filter(|f| f.entity_id == entity_id && f.severity.is_failure())
            .map(|f| f.ts)
            .collect();
        failure_ts.sort_unstable();

        if series.len() <= self.window_size {
            return Vec::new();
        }
        (0..series.len() - self.window_size)
            .map(|i| {
                let end = series[i + self.window_size].timestamp_ms();
                LabeledSequence {
                    entity_id: entity_id.to_string(),
                    sequence: self.sequences.build(&series[i..i + self.window_size]),
                    label: u8::from(failure_within(&failure_ts, end, end.saturating_add(self.horizon_ms))),
                    prediction_ts: end,
                }
            })
            .collect()
    }
}

/// Any timestamp in `[from, to]`; `sorted` must be ascending.
fn failure_within(sorted: &[i64], from: i64, to: i64) -> bool {
    let first = sorted.partition_point(|t| *t < from);
    sorted.get(first).is_some_and(|t| *t <= to)
}

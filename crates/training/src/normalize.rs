use serde::{Deserialize, Serialize};

use wellwatch_core::LabeledSequence;

/// Label counts of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassBalance {
    pub total: usize,
    pub positives: usize,
    pub negatives: usize,
    /// `positives / total`, 0 for an empty dataset.
    pub positive_ratio: f64,
}

impl ClassBalance {
    pub fn of(sequences: &[LabeledSequence]) -> Self {
        let total = sequences.len();
        let positives = sequences.iter().filter(|s| s.label == 1).count();
        Self {
            total,
            positives,
            negatives: total - positives,
            positive_ratio: if total == 0 { 0.0 } else { positives as f64 / total as f64 },
        }
    }
}

/// Per-column z-normalisation fitted across every row of every sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub mean: Vec<f64>,
    /// Population std; a constant column gets 1 so it normalises to 0.
    pub std: Vec<f64>,
}

impl Normalizer {
    /// `None` when there are no rows to fit on.
    pub fn fit(sequences: &[LabeledSequence]) -> Option<Self> {
        let rows: Vec<&[f64]> = sequences
            .iter()
            .flat_map(|s| s.sequence.iter().map(Vec::as_slice))
            .collect();
        let (mean, std) = population_stats(&rows)?;
        let std = std.into_iter().map(|s| if s > f64::EPSILON { s } else { 1.0 }).collect();
        Some(Self { mean, std })
    }

    pub fn apply(&self, sequences: &mut [LabeledSequence]) {
        for row in sequences.iter_mut().flat_map(|s| s.sequence.iter_mut()) {
            for ((v, m), s) in row.iter_mut().zip(&self.mean).zip(&self.std) {
                *v = (*v - m) / s;
            }
        }
    }
}

/// Per-column mean and population std over `rows`, sized by the first row.
/// Two passes, mean first.
pub fn population_stats(rows: &[&[f64]]) -> Option<(Vec<f64>, Vec<f64>)> {
    let dim = rows.first()?.len();
    if dim == 0 {
        return None;
    }
    let n = rows.len() as f64;

    let mut mean = vec![0.0; dim];
    for row in rows {
        for (m, v) in mean.iter_mut().zip(row.iter()) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n;
    }

    let mut variance = vec![0.0; dim];
    for row in rows {
        for ((acc, v), m) in variance.iter_mut().zip(row.iter()).zip(&mean) {
            *acc += (v - m) * (v - m);
        }
    }
    let std = variance.iter().map(|v| (v / n).sqrt()).collect();
    Some((mean, std))
}

//! Multi-entity dataset build: group, sort, label each entity in parallel.
//!
//! Progress is reported over a bounded channel the caller drains; events are
//! dropped rather than blocking the workers when the caller falls behind.
//! Cancellation is checked once per entity.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use wellwatch_core::{FailureEvent, LabeledSequence, TelemetrySample};

use crate::error::TrainingError;
use crate::labels::LabelJoiner;
use crate::normalize::ClassBalance;

/// One progress report from a running job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub percent: u8,
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledDataset {
    pub window_size: usize,
    pub horizon_ms: i64,
    pub features: Vec<String>,
    pub sequences: Vec<LabeledSequence>,
    pub balance: ClassBalance,
}

/// Group telemetry by entity, keeping arrival order for equal timestamps.
pub fn group_by_entity(telemetry: Vec<TelemetrySample>) -> BTreeMap<String, Vec<TelemetrySample>> {
    let mut grouped: BTreeMap<String, Vec<TelemetrySample>> = BTreeMap::new();
    for sample in telemetry {
        grouped.entry(sample.entity_id().to_string()).or_default().push(sample);
    }
    for series in grouped.values_mut() {
        series.sort_by_key(TelemetrySample::timestamp_ms);
    }
    grouped
}

fn report(progress: Option<&mpsc::Sender<Progress>>, percent: u8, step: &str, entity: Option<&str>) {
    if let Some(tx) = progress {
        let _ = tx.try_send(Progress {
            percent,
            step: step.to_string(),
            entity: entity.map(str::to_string),
        });
    }
}

/// Build the labeled dataset on the rayon pool. Blocking.
///
/// Output is ordered by entity id, then window start.
pub fn build_dataset(
    joiner: &LabelJoiner,
    telemetry: Vec<TelemetrySample>,
    failures: &[FailureEvent],
    progress: Option<&mpsc::Sender<Progress>>,
    cancel: &CancellationToken,
) -> Result<LabeledDataset, TrainingError> {
    report(progress, 0, "grouping", None);
    let grouped = group_by_entity(telemetry);
    let total = grouped.len();
    info!(entities = total, failures = failures.len(), "Building labeled dataset");

    let done = AtomicUsize::new(0);
    let per_entity: Vec<Vec<LabeledSequence>> = grouped
        .par_iter()
        .map(|(entity_id, series)| {
            if cancel.is_cancelled() {
                return Err(TrainingError::Cancelled);
            }
            let labeled = joiner.join_entity(entity_id, series, failures);
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(entity_id = %entity_id, windows = labeled.len(), "Entity labeled");
            report(progress, percent_of(finished, total), "labeling", Some(entity_id));
            Ok(labeled)
        })
        .collect::<Result<_, _>>()?;

    let sequences: Vec<LabeledSequence> = per_entity.into_iter().flatten().collect();
    let balance = ClassBalance::of(&sequences);
    report(progress, 100, "done", None);
    info!(
        sequences = balance.total,
        positives = balance.positives,
        ratio = balance.positive_ratio,
        "Labeled dataset ready"
    );

    Ok(LabeledDataset {
        window_size: joiner.window_size(),
        horizon_ms: joiner.horizon_ms(),
        features: joiner.sequence_builder().features().to_vec(),
        sequences,
        balance,
    })
}

/// [`build_dataset`] on a blocking thread, for async callers that drain
/// `progress` concurrently.
pub async fn spawn_build(
    joiner: LabelJoiner,
    telemetry: Vec<TelemetrySample>,
    failures: Vec<FailureEvent>,
    progress: Option<mpsc::Sender<Progress>>,
    cancel: CancellationToken,
) -> Result<LabeledDataset, TrainingError> {
    tokio::task::spawn_blocking(move || build_dataset(&joiner, telemetry, &failures, progress.as_ref(), &cancel))
        .await
        .map_err(|e| TrainingError::Join(e.to_string()))?
}

fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    // Leave 100 for the final "done" event.
    ((done * 99) / total) as u8
}

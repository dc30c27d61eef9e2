use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use wellwatch_core::{PredictionKind, TelemetrySample};

use super::counters::bump;
use super::tier2::Tier2Job;
use super::{SampleRef, Shared};
use crate::scoring::ScoringInput;
use crate::trigger::{TriggerDecision, TriggerPolicy, TriggerState};
use crate::window::EntityWindowStore;

/// Everything a shard owns. Handed back on shutdown and reused on restart.
pub(crate) struct ShardState {
    store: EntityWindowStore,
    triggers: HashMap<String, TriggerState>,
}

impl ShardState {
    pub(crate) fn new(window_size: usize) -> Self {
        Self {
            store: EntityWindowStore::new(window_size),
            triggers: HashMap::new(),
        }
    }

    pub(crate) fn entity_count(&self) -> usize {
        self.store.entity_count()
    }
}

/// Process samples until the reader hangs up, then return the state.
pub(crate) async fn run(
    id: usize,
    mut rx: mpsc::Receiver<TelemetrySample>,
    tier2: mpsc::Sender<Tier2Job>,
    shared: Arc<Shared>,
    mut state: ShardState,
) -> ShardState {
    debug!(shard = id, entities = state.entity_count(), "Shard started");
    while let Some(sample) = rx.recv().await {
        process(&mut state, sample, &tier2, &shared).await;
        bump(&shared.counters.processed);
    }
    info!(shard = id, entities = state.entity_count(), "Shard drained");
    state
}

async fn process(
    state: &mut ShardState,
    sample: TelemetrySample,
    tier2: &mpsc::Sender<Tier2Job>,
    shared: &Shared,
) {
    let at = SampleRef {
        entity_id: sample.entity_id().to_string(),
        tenant_id: sample.tenant_id().to_string(),
        timestamp_ms: sample.timestamp_ms(),
    };

    if state.store.append(sample) {
        shared.counters.buffered_entities.fetch_add(1, Ordering::Relaxed);
        debug!(entity_id = %at.entity_id, "New entity window");
    }

    let policy = TriggerPolicy::new(shared.settings.tier2_cadence());
    let trigger = state.triggers.entry(at.entity_id.clone()).or_default();
    let index = match policy.evaluate(trigger, state.store.is_ready(&at.entity_id)) {
        TriggerDecision::Skip => return,
        TriggerDecision::Tier1 { index } => index,
    };
    let Some(latest) = state.store.latest(&at.entity_id) else {
        return;
    };

    // Tier 1
    let anomaly = shared.anomaly.get();
    let input = ScoringInput {
        features: latest.features(),
        sequence: None,
        threshold: shared.settings.anomaly_threshold(),
    };
    bump(&shared.counters.tier1_runs);
    let scored = match anomaly.score(&input) {
        Ok(score) => Some(score),
        Err(e) => {
            bump(&shared.counters.errors);
            warn!(entity_id = %at.entity_id, adapter = anomaly.name(), error = %e, "Tier-1 scoring failed");
            None
        }
    };
    let flagged = scored.is_some_and(|s| s.is_flagged);
    let deviations = shared.analyzer.analyze(latest.features(), anomaly.feature_statistics());

    if let Some(score) = scored.filter(|s| s.is_flagged) {
        debug!(entity_id = %at.entity_id, score = score.score, "Tier-1 flagged sample");
        let mut result = at.result(PredictionKind::Anomaly, score, anomaly.trained());
        result.top_deviations = deviations.clone();
        shared.emit(result).await;
    }

    // Tier 2
    let Some(reason) = policy.escalate(trigger, index, flagged) else {
        return;
    };
    let window = match state.store.extract_sequence(&at.entity_id, shared.window_size) {
        Ok(window) => window,
        Err(e) => {
            bump(&shared.counters.errors);
            warn!(error = %e, "Tier-2 fired without a full window");
            return;
        }
    };
    let job = Tier2Job {
        features: latest.features().clone(),
        sequence: shared.sequences.build(window),
        deviations,
        reason,
        at,
    };
    match tier2.try_send(job) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(job)) => {
            bump(&shared.counters.tier2_dropped);
            bump(&shared.counters.errors);
            warn!(entity_id = %job.at.entity_id, reason = ?job.reason, "Tier-2 queue full, dropping trigger");
        }
        Err(mpsc::error::TrySendError::Closed(job)) => {
            bump(&shared.counters.errors);
            warn!(entity_id = %job.at.entity_id, "Tier-2 worker gone, dropping trigger");
        }
    }
}

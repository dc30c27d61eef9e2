use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use wellwatch_core::{FeatureDeviation, FeatureMap, HealthLevel, PredictionKind, ScoreMethod, ScoreResult, Tier2Reason};

use super::counters::bump;
use super::{SampleRef, Shared};
use crate::factors::{analyze_contributing_factors, failure_outlook};
use crate::health;
use crate::scoring::ScoringInput;

/// One expensive-scoring request, self-contained so the shard can move on.
pub(crate) struct Tier2Job {
    pub(crate) at: SampleRef,
    pub(crate) features: FeatureMap,
    pub(crate) sequence: Vec<Vec<f64>>,
    pub(crate) deviations: Vec<FeatureDeviation>,
    pub(crate) reason: Tier2Reason,
}

/// Drain the Tier-2 queue. Keeps each entity's last health score for trends
/// and returns that history when the shards hang up.
pub(crate) async fn run(
    mut rx: mpsc::Receiver<Tier2Job>,
    shared: Arc<Shared>,
    mut last_health: HashMap<String, u8>,
) -> HashMap<String, u8> {
    debug!("Tier-2 worker started");
    let mut discarded = 0u64;
    while let Some(job) = rx.recv().await {
        if !shared.emission_open() {
            discarded += 1;
            continue;
        }
        process(job, &shared, &mut last_health).await;
    }
    info!(discarded, "Tier-2 worker stopped");
    last_health
}

async fn process(job: Tier2Job, shared: &Shared, last_health: &mut HashMap<String, u8>) {
    let Tier2Job { at, features, sequence, deviations, reason } = job;
    let adapter = shared.failure.get();
    let trained = adapter.trained();
    let threshold = shared.settings.failure_threshold();

    // The expensive model runs off the async workers.
    let scorer = Arc::clone(&adapter);
    let joined = tokio::task::spawn_blocking(move || {
        let scored = scorer.score(&ScoringInput {
            features: &features,
            sequence: Some(&sequence),
            threshold,
        });
        (scored, features)
    })
    .await;
    bump(&shared.counters.tier2_runs);

    let (scored, features) = match joined {
        Ok(pair) => pair,
        Err(e) => {
            bump(&shared.counters.errors);
            warn!(entity_id = %at.entity_id, error = %e, "Tier-2 scoring task failed");
            return;
        }
    };
    let score = match scored {
        Ok(score) => score,
        Err(e) => {
            bump(&shared.counters.errors);
            warn!(entity_id = %at.entity_id, adapter = adapter.name(), error = %e, "Tier-2 scoring failed");
            return;
        }
    };

    let p = score.score;
    let at_risk = p > threshold;
    debug!(entity_id = %at.entity_id, probability = p, ?reason, at_risk, "Tier-2 scored");

    if at_risk {
        let factors = analyze_contributing_factors(&features);
        let mut result = at.result(PredictionKind::Failure, ScoreResult { is_flagged: true, ..score }, trained);
        result.failure = Some(failure_outlook(p, factors.len()));
        result.contributing_factors = factors;
        result.top_deviations = deviations.clone();
        result.tier2_reason = Some(reason);
        shared.emit(result).await;
    }

    if shared.settings.emit_health() {
        let anomaly = shared.anomaly.get();
        let assessment = health::assess(
            &features,
            anomaly.feature_statistics(),
            Some(p),
            last_health.get(&at.entity_id).copied(),
        );
        last_health.insert(at.entity_id.clone(), assessment.score);

        let health_score = ScoreResult {
            score: f64::from(assessment.score) / 100.0,
            is_flagged: assessment.level <= HealthLevel::Poor,
            method: ScoreMethod::Statistical,
        };
        let mut result = at.result(PredictionKind::Health, health_score, trained);
        result.health = Some(assessment);
        result.top_deviations = deviations;
        result.tier2_reason = Some(reason);
        shared.emit(result).await;
    }
}

//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use wellwatch_core::config::EngineConfig;
use wellwatch_core::{ConsumerStats, PredictionResult, ScoreMethod, ScoreResult};
use wellwatch_engine::scoring::FlagRule;
use wellwatch_engine::{
    AnomalyAdapter, ChannelEmitter, EmitError, FailureAdapter, FallbackPolicy, PredictionEmitter,
    ScoringAdapter, ScoringError, ScoringInput, TelemetryEngine,
};
use wellwatch_queue::{channel_queue, ChannelConsumer, ChannelProducer};

pub const TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_WAIT: Duration = Duration::from_millis(10);

pub fn engine_config(window_size: usize) -> EngineConfig {
    EngineConfig {
        window_size,
        poll_interval_ms: 5,
        emit_health: false,
        ..EngineConfig::default()
    }
}

/// Untrained anomaly scorer that always returns `score`.
pub fn constant_anomaly(score: f64) -> Arc<dyn ScoringAdapter> {
    Arc::new(AnomalyAdapter::Untrained(FallbackPolicy::constant(score, FlagRule::Threshold)))
}

/// Untrained failure scorer that always returns `p`.
pub fn constant_failure(p: f64) -> Arc<dyn ScoringAdapter> {
    Arc::new(FailureAdapter::Untrained(FallbackPolicy::constant(p, FlagRule::Threshold)))
}

/// Failure scorer that blocks its worker thread for `delay` per call.
pub struct SlowScorer {
    pub delay: Duration,
    pub calls: AtomicU64,
}

impl ScoringAdapter for SlowScorer {
    fn name(&self) -> &str {
        "slow"
    }

    fn trained(&self) -> bool {
        true
    }

    fn score(&self, _input: &ScoringInput<'_>) -> Result<ScoreResult, ScoringError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        std::thread::sleep(self.delay);
        Ok(ScoreResult { score: 0.0, is_flagged: false, method: ScoreMethod::Model })
    }
}

/// Scorer that always errors.
pub struct BrokenScorer;

impl ScoringAdapter for BrokenScorer {
    fn name(&self) -> &str {
        "broken"
    }

    fn trained(&self) -> bool {
        true
    }

    fn score(&self, _input: &ScoringInput<'_>) -> Result<ScoreResult, ScoringError> {
        Err(ScoringError::Model("model unavailable".into()))
    }
}

/// Emitter that rejects everything.
pub struct FailingEmitter;

#[async_trait::async_trait]
impl PredictionEmitter for FailingEmitter {
    async fn emit(&self, _result: &PredictionResult) -> Result<(), EmitError> {
        Err(EmitError::Sink("downstream unavailable".into()))
    }
}

pub struct Harness {
    pub engine: TelemetryEngine,
    pub producer: ChannelProducer,
    pub transport: Arc<ChannelConsumer>,
    pub results: mpsc::Receiver<PredictionResult>,
}

pub fn harness(
    config: EngineConfig,
    anomaly: Arc<dyn ScoringAdapter>,
    failure: Arc<dyn ScoringAdapter>,
) -> Harness {
    let (producer, consumer) = channel_queue(1024, POLL_WAIT);
    let transport = Arc::new(consumer);
    let (emitter, results) = ChannelEmitter::new(1024);
    let engine = TelemetryEngine::new(config, transport.clone(), anomaly, failure, Arc::new(emitter));
    Harness { engine, producer, transport, results }
}

pub fn telemetry(entity: &str, ts: i64, data: serde_json::Value) -> serde_json::Value {
    json!({ "entityId": entity, "tenantId": "tenant-a", "ts": ts, "data": data })
}

/// Poll `get_stats` until `done` holds or the timeout elapses.
pub async fn wait_for(engine: &TelemetryEngine, done: impl Fn(&ConsumerStats) -> bool) -> ConsumerStats {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let stats = engine.get_stats();
        if done(&stats) {
            return stats;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for engine stats, last: {stats:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn drain(results: &mut mpsc::Receiver<PredictionResult>) -> Vec<PredictionResult> {
    let mut out = Vec::new();
    while let Ok(r) = results.try_recv() {
        out.push(r);
    }
    out
}

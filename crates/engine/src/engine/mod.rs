//! Stream consumer loop.
//!
//! One reader task polls the transport, parses and filters messages, and
//! routes each sample to a shard by `hash(entity_id) % shards`, so all of an
//! entity's samples are handled in arrival order by one task. Shards own
//! their windows and trigger state and run Tier 1 inline. Tier-2 jobs go to a
//! single worker over a bounded queue; a full queue drops the job.
//!
//! Lifecycle: `stopped -> starting -> running -> stopping -> stopped`.

mod counters;
mod reader;
mod settings;
mod shard;
mod tier2;

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use wellwatch_core::config::EngineConfig;
use wellwatch_core::{ConsumerStats, LifecycleState, PredictionKind, PredictionResult, ScoreResult};
use wellwatch_queue::{QueueConsumer, QueueHealth};

use crate::deviation::FeatureDeviationAnalyzer;
use crate::emitter::PredictionEmitter;
use crate::error::EngineError;
use crate::scoring::{AdapterSlot, ScoringAdapter};
use crate::sequence::SequenceBuilder;

use counters::{bump, EngineCounters};
use settings::RuntimeSettings;
use shard::ShardState;

pub use settings::RuntimeSettingsUpdate;

/// State shared by the reader, shards and Tier-2 worker of one engine.
pub(crate) struct Shared {
    pub(crate) window_size: usize,
    pub(crate) settings: RuntimeSettings,
    pub(crate) counters: EngineCounters,
    pub(crate) anomaly: AdapterSlot,
    pub(crate) failure: AdapterSlot,
    pub(crate) analyzer: FeatureDeviationAnalyzer,
    pub(crate) sequences: SequenceBuilder,
    emitter: Arc<dyn PredictionEmitter>,
    /// Cleared during shutdown; results produced after that are discarded.
    emission_open: AtomicBool,
}

impl Shared {
    pub(crate) fn emission_open(&self) -> bool {
        self.emission_open.load(Ordering::Acquire)
    }

    pub(crate) async fn emit(&self, result: PredictionResult) {
        if !self.emission_open() {
            debug!(entity_id = %result.entity_id, kind = %result.kind, "Emission closed, discarding result");
            return;
        }
        match self.emitter.emit(&result).await {
            Ok(()) => bump(&self.counters.emitted),
            Err(e) => {
                bump(&self.counters.emit_failures);
                bump(&self.counters.errors);
                warn!(entity_id = %result.entity_id, kind = %result.kind, error = %e, "Failed to emit prediction");
            }
        }
    }
}

/// Identity of the sample a result is about.
#[derive(Debug, Clone)]
pub(crate) struct SampleRef {
    pub(crate) entity_id: String,
    pub(crate) tenant_id: String,
    pub(crate) timestamp_ms: i64,
}

impl SampleRef {
    pub(crate) fn result(&self, kind: PredictionKind, score_result: ScoreResult, trained: bool) -> PredictionResult {
        PredictionResult {
            id: Uuid::new_v4(),
            entity_id: self.entity_id.clone(),
            tenant_id: self.tenant_id.clone(),
            kind,
            produced_at: Utc::now(),
            sample_timestamp_ms: self.timestamp_ms,
            score_result,
            trained,
            top_deviations: Vec::new(),
            contributing_factors: Vec::new(),
            failure: None,
            health: None,
            tier2_reason: None,
        }
    }
}

struct Running {
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    shards: Vec<JoinHandle<ShardState>>,
    tier2: JoinHandle<HashMap<String, u8>>,
}

/// Held across start/stop so windows and health history survive a restart.
struct Lifecycle {
    running: Option<Running>,
    shards: Vec<ShardState>,
    last_health: HashMap<String, u8>,
}

/// Real-time telemetry engine for one tenant or process.
///
/// Every piece of mutable state lives in this value; separate instances are
/// independent and can be stopped independently.
pub struct TelemetryEngine {
    config: EngineConfig,
    transport: Arc<dyn QueueConsumer>,
    shared: Arc<Shared>,
    state: AtomicU8,
    lifecycle: Mutex<Lifecycle>,
}

impl TelemetryEngine {
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn QueueConsumer>,
        anomaly: Arc<dyn ScoringAdapter>,
        failure: Arc<dyn ScoringAdapter>,
        emitter: Arc<dyn PredictionEmitter>,
    ) -> Self {
        let shared = Arc::new(Shared {
            window_size: config.window_size,
            settings: RuntimeSettings::new(&config),
            counters: EngineCounters::default(),
            anomaly: AdapterSlot::new(anomaly),
            failure: AdapterSlot::new(failure),
            analyzer: FeatureDeviationAnalyzer::default(),
            sequences: SequenceBuilder::default(),
            emitter,
            emission_open: AtomicBool::new(false),
        });
        Self {
            config,
            transport,
            shared,
            state: AtomicU8::new(LifecycleState::Stopped.as_u8()),
            lifecycle: Mutex::new(Lifecycle {
                running: None,
                shards: Vec::new(),
                last_health: HashMap::new(),
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Open the transport and spawn the loop. A no-op when already running.
    ///
    /// Invalid configuration or a transport that cannot be opened is fatal:
    /// the error is returned and the engine stays stopped.
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.running.is_some() {
            debug!("Telemetry engine already running");
            return Ok(());
        }
        self.set_state(LifecycleState::Starting);

        if let Err(e) = self.config.validate() {
            self.set_state(LifecycleState::Stopped);
            error!(error = %e, "Invalid engine configuration");
            return Err(e.into());
        }
        if let Err(e) = self.transport.open().await {
            self.set_state(LifecycleState::Stopped);
            error!(error = %e, "Failed to open transport");
            return Err(e.into());
        }

        let shard_count = self.config.shards;
        let mut states = std::mem::take(&mut lifecycle.shards);
        states.resize_with(shard_count, || ShardState::new(self.config.window_size));

        let cancel = CancellationToken::new();
        let (tier2_tx, tier2_rx) = mpsc::channel(self.config.tier2_queue_capacity);
        self.shared.emission_open.store(true, Ordering::Release);

        let tier2 = tokio::spawn(tier2::run(
            tier2_rx,
            Arc::clone(&self.shared),
            std::mem::take(&mut lifecycle.last_health),
        ));

        let mut shard_txs = Vec::with_capacity(shard_count);
        let mut shards = Vec::with_capacity(shard_count);
        for (id, state) in states.into_iter().enumerate() {
            let (tx, rx) = mpsc::channel(self.config.shard_queue_capacity);
            shard_txs.push(tx);
            shards.push(tokio::spawn(shard::run(
                id,
                rx,
                tier2_tx.clone(),
                Arc::clone(&self.shared),
                state,
            )));
        }
        drop(tier2_tx);

        let reader = tokio::spawn(reader::run(
            reader::ReaderConfig {
                batch_size: self.config.poll_batch_size.max(1) as u32,
                poll_interval: std::time::Duration::from_millis(self.config.poll_interval_ms),
            },
            Arc::clone(&self.transport),
            shard_txs,
            Arc::clone(&self.shared),
            cancel.clone(),
        ));

        lifecycle.running = Some(Running { cancel, reader, shards, tier2 });
        self.set_state(LifecycleState::Running);
        info!(
            window_size = self.config.window_size,
            shards = shard_count,
            tier2_cadence = self.shared.settings.tier2_cadence(),
            anomaly_trained = self.shared.anomaly.get().trained(),
            failure_trained = self.shared.failure.get().trained(),
            "Telemetry engine started"
        );
        Ok(())
    }

    /// Stop between messages, drain the shards, discard late Tier-2 results
    /// and release the transport. Safe to call repeatedly.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(running) = lifecycle.running.take() else {
            self.set_state(LifecycleState::Stopped);
            return;
        };
        self.set_state(LifecycleState::Stopping);
        info!("Stopping telemetry engine");

        running.cancel.cancel();
        if let Err(e) = running.reader.await {
            warn!(error = %e, "Reader task ended abnormally");
        }

        let mut states = Vec::with_capacity(running.shards.len());
        for (id, handle) in running.shards.into_iter().enumerate() {
            match handle.await {
                Ok(state) => states.push(state),
                Err(e) => {
                    warn!(shard = id, error = %e, "Shard task ended abnormally, its windows are lost");
                    states.push(ShardState::new(self.config.window_size));
                }
            }
        }

        self.shared.emission_open.store(false, Ordering::Release);
        lifecycle.last_health = match running.tier2.await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Tier-2 worker ended abnormally");
                HashMap::new()
            }
        };

        let buffered: usize = states.iter().map(ShardState::entity_count).sum();
        self.shared.counters.buffered_entities.store(buffered, Ordering::Relaxed);
        lifecycle.shards = states;

        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Failed to close transport");
        }
        self.set_state(LifecycleState::Stopped);

        let stats = self.get_stats();
        info!(
            processed = stats.processed_count,
            errors = stats.error_count,
            emitted = stats.emitted_count,
            "Telemetry engine stopped"
        );
    }

    /// Read-only counter snapshot; safe to call while the loop runs.
    pub fn get_stats(&self) -> ConsumerStats {
        let monitored = self.shared.settings.monitored().len();
        self.shared.counters.snapshot(self.state(), monitored)
    }

    /// Replace the allow list. An empty set monitors every entity.
    pub fn set_monitored(&self, entities: BTreeSet<String>) {
        info!(count = entities.len(), "Monitored entity set updated");
        self.shared.settings.set_monitored(entities);
    }

    pub fn update_settings(&self, update: RuntimeSettingsUpdate) -> Result<(), EngineError> {
        update.validate()?;
        self.shared.settings.apply(&update);
        info!(?update, "Runtime settings updated");
        Ok(())
    }

    /// Swap the Tier-1 scorer without restarting. Returns the previous one.
    pub fn swap_anomaly_adapter(&self, adapter: Arc<dyn ScoringAdapter>) -> Arc<dyn ScoringAdapter> {
        info!(adapter = adapter.name(), trained = adapter.trained(), "Swapping anomaly adapter");
        self.shared.anomaly.swap(adapter)
    }

    /// Swap the Tier-2 scorer without restarting. Returns the previous one.
    pub fn swap_failure_adapter(&self, adapter: Arc<dyn ScoringAdapter>) -> Arc<dyn ScoringAdapter> {
        info!(adapter = adapter.name(), trained = adapter.trained(), "Swapping failure adapter");
        self.shared.failure.swap(adapter)
    }

    pub async fn transport_health(&self) -> Result<QueueHealth, EngineError> {
        Ok(self.transport.health_check().await?)
    }
}

//! Outbound side of the engine: where finished predictions go.
//!
//! Emitters never retry. A failed `emit` is logged and counted by the engine;
//! durability belongs to whatever sits behind the sink.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::info;

use wellwatch_core::PredictionResult;

use crate::error::EmitError;

#[async_trait::async_trait]
pub trait PredictionEmitter: Send + Sync {
    async fn emit(&self, result: &PredictionResult) -> Result<(), EmitError>;
}

/// Hands results to an in-process consumer over a bounded channel.
///
/// A full channel is reported as [`EmitError::Full`] rather than awaited, so a
/// slow consumer cannot stall scoring.
pub struct ChannelEmitter {
    tx: mpsc::Sender<PredictionResult>,
}

impl ChannelEmitter {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PredictionResult>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl PredictionEmitter for ChannelEmitter {
    async fn emit(&self, result: &PredictionResult) -> Result<(), EmitError> {
        self.tx.try_send(result.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EmitError::Full,
            mpsc::error::TrySendError::Closed(_) => EmitError::Closed,
        })
    }
}

/// Logs each result as a structured `info!` event.
#[derive(Debug, Default)]
pub struct LogEmitter;

#[async_trait::async_trait]
impl PredictionEmitter for LogEmitter {
    async fn emit(&self, result: &PredictionResult) -> Result<(), EmitError> {
        info!(
            entity_id = %result.entity_id,
            tenant_id = %result.tenant_id,
            kind = %result.kind,
            score = result.score_result.score,
            flagged = result.score_result.is_flagged,
            trained = result.trained,
            deviations = result.top_deviations.len(),
            factors = result.contributing_factors.len(),
            "Prediction"
        );
        Ok(())
    }
}

/// Writes one JSON object per line to any writer (stdout, a file).
///
/// The write and flush run on the blocking pool so a slow sink never stalls
/// the shard that emitted.
pub struct JsonLinesEmitter {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl JsonLinesEmitter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out: Arc::new(Mutex::new(out)) }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

#[async_trait::async_trait]
impl PredictionEmitter for JsonLinesEmitter {
    async fn emit(&self, result: &PredictionResult) -> Result<(), EmitError> {
        let mut line = serde_json::to_vec(result).map_err(|e| EmitError::Sink(e.to_string()))?;
        line.push(b'\n');
        let out = self.out.clone();
        tokio::task::spawn_blocking(move || {
            let mut out = out.lock().map_err(|_| EmitError::Sink("writer lock poisoned".into()))?;
            out.write_all(&line)
                .and_then(|_| out.flush())
                .map_err(|e| EmitError::Sink(e.to_string()))
        })
        .await
        .map_err(|e| EmitError::Sink(format!("writer task failed: {e}")))?
    }
}

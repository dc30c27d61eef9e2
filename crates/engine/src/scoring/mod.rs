//! Scoring adapter contract.
//!
//! Every scorer, trained or placeholder, sits behind [`ScoringAdapter`]. An
//! adapter's trained/untrained variant is fixed when it is built; the engine
//! never inspects it except to copy [`ScoringAdapter::trained`] onto results.

mod anomaly;
mod artifact;
mod failure;
mod fallback;

use std::sync::{Arc, RwLock};

use wellwatch_core::{FeatureMap, FeatureStatisticsTable, ScoreResult};

use crate::error::ScoringError;

pub use anomaly::{AnomalyAdapter, AnomalyArtifact, ANOMALY_ARTIFACT_VERSION};
pub use artifact::{load_artifact, save_artifact};
pub use failure::{FailureAdapter, FailureArtifact, FAILURE_ARTIFACT_VERSION};
pub use fallback::{FallbackPolicy, FlagRule};

/// What a scorer sees for one call.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    /// Features of the sample being scored.
    pub features: &'a FeatureMap,
    /// Window matrix for sequence models; `None` for point scorers.
    pub sequence: Option<&'a [Vec<f64>]>,
    /// Flag threshold in effect for this call.
    pub threshold: f64,
}

/// Uniform contract over anomaly and failure scorers.
///
/// `score` must not touch engine state. Calls may come from several shards at
/// once and from blocking worker threads.
pub trait ScoringAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// `false` when scores come from a fallback placeholder.
    fn trained(&self) -> bool;

    fn score(&self, input: &ScoringInput<'_>) -> Result<ScoreResult, ScoringError>;

    /// Learned per-feature statistics, when the model carries them.
    fn feature_statistics(&self) -> Option<&FeatureStatisticsTable> {
        None
    }
}

/// Hot-swappable adapter handle. Readers clone the current `Arc` and score
/// without holding the lock.
pub struct AdapterSlot {
    inner: RwLock<Arc<dyn ScoringAdapter>>,
}

impl AdapterSlot {
    pub fn new(adapter: Arc<dyn ScoringAdapter>) -> Self {
        Self {
            inner: RwLock::new(adapter),
        }
    }

    pub fn get(&self) -> Arc<dyn ScoringAdapter> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Replace the adapter; in-flight calls finish on the old one.
    pub fn swap(&self, adapter: Arc<dyn ScoringAdapter>) -> Arc<dyn ScoringAdapter> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, adapter)
    }
}

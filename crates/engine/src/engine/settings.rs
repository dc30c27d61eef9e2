use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use wellwatch_core::config::EngineConfig;
use wellwatch_core::CoreError;

/// Partial update of the runtime-tunable settings. `None` leaves a value as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettingsUpdate {
    pub tier2_cadence: Option<u64>,
    pub anomaly_threshold: Option<f64>,
    pub failure_threshold: Option<f64>,
    pub emit_health: Option<bool>,
}

impl RuntimeSettingsUpdate {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tier2_cadence == Some(0) {
            return Err(CoreError::Config("tier2_cadence must be > 0".into()));
        }
        for (name, value) in [
            ("anomaly_threshold", self.anomaly_threshold),
            ("failure_threshold", self.failure_threshold),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(CoreError::Config(format!("{name} must be within [0, 1], got {v}")));
                }
            }
        }
        Ok(())
    }
}

/// Settings read on the hot path. Scalars are atomics (thresholds stored as
/// `f64` bits); the allow list is an `Arc` swapped under a short write lock.
pub(crate) struct RuntimeSettings {
    tier2_cadence: AtomicU64,
    anomaly_threshold: AtomicU64,
    failure_threshold: AtomicU64,
    emit_health: AtomicBool,
    monitored: RwLock<Arc<BTreeSet<String>>>,
}

impl RuntimeSettings {
    pub(crate) fn new(config: &EngineConfig) -> Self {
        Self {
            tier2_cadence: AtomicU64::new(config.tier2_cadence),
            anomaly_threshold: AtomicU64::new(config.anomaly_threshold.to_bits()),
            failure_threshold: AtomicU64::new(config.failure_threshold.to_bits()),
            emit_health: AtomicBool::new(config.emit_health),
            monitored: RwLock::new(Arc::new(config.monitored_entities.clone())),
        }
    }

    pub(crate) fn tier2_cadence(&self) -> u64 {
        self.tier2_cadence.load(Ordering::Relaxed)
    }

    pub(crate) fn anomaly_threshold(&self) -> f64 {
        f64::from_bits(self.anomaly_threshold.load(Ordering::Relaxed))
    }

    pub(crate) fn failure_threshold(&self) -> f64 {
        f64::from_bits(self.failure_threshold.load(Ordering::Relaxed))
    }

    pub(crate) fn emit_health(&self) -> bool {
        self.emit_health.load(Ordering::Relaxed)
    }

    pub(crate) fn apply(&self, update: &RuntimeSettingsUpdate) {
        if let Some(c) = update.tier2_cadence {
            self.tier2_cadence.store(c, Ordering::Relaxed);
        }
        if let Some(t) = update.anomaly_threshold {
            self.anomaly_threshold.store(t.to_bits(), Ordering::Relaxed);
        }
        if let Some(t) = update.failure_threshold {
            self.failure_threshold.store(t.to_bits(), Ordering::Relaxed);
        }
        if let Some(h) = update.emit_health {
            self.emit_health.store(h, Ordering::Relaxed);
        }
    }

    pub(crate) fn monitored(&self) -> Arc<BTreeSet<String>> {
        let guard = self.monitored.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub(crate) fn set_monitored(&self, entities: BTreeSet<String>) {
        let mut guard = self.monitored.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(entities);
    }

    /// An empty allow list admits every entity.
    pub(crate) fn is_monitored(&self, entity_id: &str) -> bool {
        let guard = self.monitored.read().unwrap_or_else(|e| e.into_inner());
        guard.is_empty() || guard.contains(entity_id)
    }
}

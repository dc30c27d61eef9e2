//! Seeded synthetic fleet telemetry for demos and tests.
//!
//! Each entity reports every sequence feature around a nominal value with
//! uniform noise. A failing entity degrades over `ramp_samples` before its
//! failure event, then returns to nominal.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use wellwatch_core::{FailureEvent, FailureSeverity, FeatureMap, TelemetrySample};

use crate::error::TrainingError;

/// (feature, nominal, noise amplitude, full-ramp drift).
const PROFILE: &[(&str, f64, f64, f64)] = &[
    ("pump_intake_pressure", 250.0, 15.0, -60.0),
    ("pump_discharge_pressure", 1500.0, 50.0, 0.0),
    ("pump_temperature", 150.0, 4.0, 60.0),
    ("pump_vibration", 1.2, 0.15, 1.8),
    ("pump_current", 50.0, 2.0, 12.0),
    ("pump_speed", 3500.0, 40.0, 0.0),
    ("motor_temperature", 200.0, 5.0, 40.0),
    ("motor_current", 60.0, 2.5, 15.0),
    ("motor_voltage", 2300.0, 25.0, 0.0),
    ("motor_power", 250.0, 10.0, 30.0),
    ("oil_rate", 800.0, 30.0, -250.0),
    ("water_rate", 900.0, 40.0, 0.0),
    ("gas_rate", 1500.0, 60.0, 0.0),
    ("fluid_level", 4000.0, 80.0, -600.0),
    ("casing_pressure", 600.0, 20.0, 0.0),
    ("tubing_pressure", 900.0, 25.0, 0.0),
    ("wellhead_temperature", 110.0, 3.0, 0.0),
    ("pump_efficiency", 80.0, 2.0, -30.0),
    ("gas_oil_ratio", 900.0, 40.0, 0.0),
    ("water_cut", 50.0, 2.0, 0.0),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub entities: usize,
    pub samples_per_entity: usize,
    pub interval_ms: i64,
    pub start_ms: i64,
    /// Probability that an entity has one failure.
    pub failure_rate: f64,
    /// Samples of degradation before a failure.
    pub ramp_samples: usize,
    pub seed: u64,
    pub tenant_id: String,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            entities: 5,
            samples_per_entity: 500,
            interval_ms: 3_600_000,
            start_ms: 1_700_000_000_000,
            failure_rate: 0.4,
            ramp_samples: 48,
            seed: 42,
            tenant_id: "synthetic".into(),
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.entities == 0 || self.samples_per_entity == 0 {
            return Err(TrainingError::InvalidInput("entities and samples_per_entity must be > 0".into()));
        }
        if self.interval_ms <= 0 {
            return Err(TrainingError::InvalidInput("interval_ms must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(TrainingError::InvalidInput(format!(
                "failure_rate {} outside [0, 1]",
                self.failure_rate
            )));
        }
        if self.ramp_samples >= self.samples_per_entity {
            return Err(TrainingError::InvalidInput("ramp_samples must be below samples_per_entity".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticDataset {
    /// Entity by entity, each in time order.
    pub telemetry: Vec<TelemetrySample>,
    pub failures: Vec<FailureEvent>,
}

pub fn entity_name(index: usize) -> String {
    format!("well-{:03}", index + 1)
}

/// Generate a dataset. The same config always yields the same data.
pub fn generate(config: &SyntheticConfig) -> Result<SyntheticDataset, TrainingError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut telemetry = Vec::with_capacity(config.entities * config.samples_per_entity);
    let mut failures = Vec::new();

    for e in 0..config.entities {
        let entity_id = entity_name(e);
        let failure_at = rng
            .gen_bool(config.failure_rate)
            .then(|| rng.gen_range(config.ramp_samples..config.samples_per_entity));

        for i in 0..config.samples_per_entity {
            let ts = config.start_ms + i as i64 * config.interval_ms;
            let progress = match failure_at {
                Some(f) if i <= f && i + config.ramp_samples > f => {
                    1.0 - (f - i) as f64 / config.ramp_samples.max(1) as f64
                }
                _ => 0.0,
            };
            let features: FeatureMap = PROFILE
                .iter()
                .map(|(name, nominal, noise, drift)| {
                    let v = nominal + drift * progress + rng.gen_range(-*noise..=*noise);
                    (name.to_string(), (v * 100.0).round() / 100.0)
                })
                .collect();
            telemetry.push(TelemetrySample::new(entity_id.clone(), config.tenant_id.clone(), ts, features)?);

            if failure_at == Some(i) {
                failures.push(FailureEvent {
                    entity_id: entity_id.clone(),
                    ts,
                    severity: FailureSeverity::Critical,
                });
            }
        }
    }

    info!(
        entities = config.entities,
        samples = telemetry.len(),
        failures = failures.len(),
        seed = config.seed,
        "Synthetic dataset generated"
    );
    Ok(SyntheticDataset { telemetry, failures })
}

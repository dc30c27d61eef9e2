use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

/// Typed lookups over any key source. The env-backed source is
/// [`profiled_env_opt`]; tests pass a map instead of mutating the process env.
struct Source<F: Fn(&str) -> Option<String>>(F);

impl<F: Fn(&str) -> Option<String>> Source<F> {
    fn opt(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn usize(&self, key: &str, default: usize) -> usize {
        self.opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn u64(&self, key: &str, default: u64) -> u64 {
        self.opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn i32(&self, key: &str, default: i32) -> i32 {
        self.opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn f64(&self, key: &str, default: f64) -> f64 {
        self.opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        match self.opt(key).map(|v| v.to_ascii_lowercase()) {
            Some(v) if v == "true" || v == "1" || v == "yes" => true,
            Some(v) if v == "false" || v == "0" || v == "no" => false,
            _ => default,
        }
    }

    fn list(&self, key: &str) -> BTreeSet<String> {
        self.opt(key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub engine: EngineConfig,
    pub queue: QueueConfig,
    pub aws: AwsConfig,
    pub models: ModelConfig,
    pub training: TrainingConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `WELLWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("WELLWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let mut cfg = Self::from_lookup(|key| profiled_env_opt(&p, key));
        cfg.profile = p;
        cfg
    }

    /// Build config from an arbitrary key source. Unset or unparsable keys
    /// take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let src = Source(lookup);
        Self {
            profile: String::new(),
            engine: EngineConfig::from_source(&src),
            queue: QueueConfig::from_source(&src),
            aws: AwsConfig::from_source(&src),
            models: ModelConfig::from_source(&src),
            training: TrainingConfig::from_source(&src),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.engine.validate()?;
        self.training.validate()
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  engine:   window_size={}, cadence={}, anomaly_threshold={}, failure_threshold={}, shards={}",
            self.engine.window_size,
            self.engine.tier2_cadence,
            self.engine.anomaly_threshold,
            self.engine.failure_threshold,
            self.engine.shards
        );
        tracing::info!(
            "  queue:    url={}",
            self.queue.url.as_deref().unwrap_or("(none)")
        );
        tracing::info!(
            "  aws:      region={}, static_credentials={}, endpoint={}",
            self.aws.region,
            self.aws.has_static_credentials(),
            self.aws.endpoint_url.as_deref().unwrap_or("(default)")
        );
        tracing::info!(
            "  models:   anomaly={}, failure={}",
            display_path(&self.models.anomaly_artifact),
            display_path(&self.models.failure_artifact)
        );
        tracing::info!(
            "  training: window_size={}, horizon_hours={}",
            self.training.window_size,
            self.training.horizon_hours
        );
    }
}

fn display_path(p: &Option<PathBuf>) -> String {
    p.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(untrained)".to_string())
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub window_size: usize,
    /// Tier-2 runs every Nth ready evaluation of an entity.
    pub tier2_cadence: u64,
    pub anomaly_threshold: f64,
    pub failure_threshold: f64,
    pub tier2_queue_capacity: usize,
    pub shards: usize,
    pub shard_queue_capacity: usize,
    pub poll_batch_size: i32,
    pub poll_interval_ms: u64,
    /// Empty = every entity is monitored.
    pub monitored_entities: BTreeSet<String>,
    pub emit_health: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: 24,
            tier2_cadence: 10,
            anomaly_threshold: 0.6,
            failure_threshold: 0.7,
            tier2_queue_capacity: 64,
            shards: 1,
            shard_queue_capacity: 1024,
            poll_batch_size: 10,
            poll_interval_ms: 250,
            monitored_entities: BTreeSet::new(),
            emit_health: true,
        }
    }
}

impl EngineConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(src: &Source<F>) -> Self {
        let d = Self::default();
        Self {
            window_size: src.usize("WINDOW_SIZE", d.window_size),
            tier2_cadence: src.u64("TIER2_CADENCE", d.tier2_cadence),
            anomaly_threshold: src.f64("ANOMALY_THRESHOLD", d.anomaly_threshold),
            failure_threshold: src.f64("FAILURE_THRESHOLD", d.failure_threshold),
            tier2_queue_capacity: src.usize("TIER2_QUEUE_CAPACITY", d.tier2_queue_capacity),
            shards: src.usize("ENGINE_SHARDS", d.shards),
            shard_queue_capacity: src.usize("SHARD_QUEUE_CAPACITY", d.shard_queue_capacity),
            poll_batch_size: src.i32("POLL_BATCH_SIZE", d.poll_batch_size),
            poll_interval_ms: src.u64("POLL_INTERVAL_MS", d.poll_interval_ms),
            monitored_entities: src.list("MONITORED_ENTITIES"),
            emit_health: src.bool("EMIT_HEALTH", d.emit_health),
        }
    }

    /// Window capacity: twice the sequence length.
    pub fn max_buffer(&self) -> usize {
        self.window_size * 2
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.window_size == 0 {
            return Err(CoreError::Config("window_size must be > 0".into()));
        }
        if self.tier2_cadence == 0 {
            return Err(CoreError::Config("tier2_cadence must be > 0".into()));
        }
        for (name, v) in [
            ("anomaly_threshold", self.anomaly_threshold),
            ("failure_threshold", self.failure_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(CoreError::Config(format!("{name} must be within [0, 1], got {v}")));
            }
        }
        if self.tier2_queue_capacity == 0 || self.shard_queue_capacity == 0 {
            return Err(CoreError::Config("queue capacities must be > 0".into()));
        }
        if self.shards == 0 {
            return Err(CoreError::Config("shards must be > 0".into()));
        }
        if self.poll_batch_size <= 0 {
            return Err(CoreError::Config("poll_batch_size must be > 0".into()));
        }
        Ok(())
    }
}

// ── Queue ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub url: Option<String>,
    pub dlq_url: Option<String>,
    pub visibility_timeout_secs: i32,
    pub wait_time_secs: i32,
}

impl QueueConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(src: &Source<F>) -> Self {
        Self {
            url: src.opt("QUEUE_URL"),
            dlq_url: src.opt("QUEUE_DLQ_URL"),
            visibility_timeout_secs: src.i32("QUEUE_VISIBILITY_TIMEOUT_SECS", 30),
            wait_time_secs: src.i32("QUEUE_WAIT_TIME_SECS", 20),
        }
    }
}

// ── AWS ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(src: &Source<F>) -> Self {
        Self {
            region: src.or("AWS_REGION", "us-east-1"),
            access_key_id: src.opt("AWS_ACCESS_KEY_ID"),
            secret_access_key: src.opt("AWS_SECRET_ACCESS_KEY"),
            session_token: src.opt("AWS_SESSION_TOKEN"),
            endpoint_url: src.opt("QUEUE_AWS_ENDPOINT_URL"),
        }
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

// ── Model artifacts ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Absent means the anomaly scorer starts untrained.
    pub anomaly_artifact: Option<PathBuf>,
    pub failure_artifact: Option<PathBuf>,
}

impl ModelConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(src: &Source<F>) -> Self {
        Self {
            anomaly_artifact: src.opt("ANOMALY_ARTIFACT_PATH").map(PathBuf::from),
            failure_artifact: src.opt("FAILURE_ARTIFACT_PATH").map(PathBuf::from),
        }
    }
}

// ── Training ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub window_size: usize,
    pub horizon_hours: u64,
    pub progress_channel_capacity: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            window_size: 24,
            horizon_hours: 168,
            progress_channel_capacity: 32,
        }
    }
}

impl TrainingConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(src: &Source<F>) -> Self {
        let d = Self::default();
        Self {
            window_size: src.usize("TRAINING_WINDOW_SIZE", d.window_size),
            horizon_hours: src.u64("FAILURE_HORIZON_HOURS", d.horizon_hours),
            progress_channel_capacity: src
                .usize("PROGRESS_CHANNEL_CAPACITY", d.progress_channel_capacity),
        }
    }

    pub fn horizon_ms(&self) -> i64 {
        (self.horizon_hours as i64).saturating_mul(3_600_000)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.window_size == 0 {
            return Err(CoreError::Config("training window_size must be > 0".into()));
        }
        if self.progress_channel_capacity == 0 {
            return Err(CoreError::Config("progress_channel_capacity must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(move |k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.engine.window_size, 24);
        assert_eq!(cfg.engine.max_buffer(), 48);
        assert_eq!(cfg.engine.tier2_cadence, 10);
        assert!(cfg.engine.monitored_entities.is_empty());
        assert!(cfg.engine.emit_health);
        assert_eq!(cfg.training.horizon_ms(), 168 * 3_600_000);
        assert!(cfg.models.anomaly_artifact.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_overrides() {
        let cfg = config_from(&[
            ("WINDOW_SIZE", "12"),
            ("TIER2_CADENCE", "5"),
            ("MONITORED_ENTITIES", "well-1, well-2,,"),
            ("EMIT_HEALTH", "false"),
            ("ANOMALY_ARTIFACT_PATH", "/models/anomaly.json"),
        ]);
        assert_eq!(cfg.engine.window_size, 12);
        assert_eq!(cfg.engine.tier2_cadence, 5);
        assert_eq!(cfg.engine.monitored_entities.len(), 2);
        assert!(cfg.engine.monitored_entities.contains("well-2"));
        assert!(!cfg.engine.emit_health);
        assert_eq!(
            cfg.models.anomaly_artifact.as_deref(),
            Some(std::path::Path::new("/models/anomaly.json"))
        );
    }

    #[test]
    fn unparsable_values_fall_back() {
        let cfg = config_from(&[("WINDOW_SIZE", "lots"), ("ANOMALY_THRESHOLD", "high")]);
        assert_eq!(cfg.engine.window_size, 24);
        assert_eq!(cfg.engine.anomaly_threshold, 0.6);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = config_from(&[("WINDOW_SIZE", "0")]);
        assert!(matches!(cfg.validate(), Err(CoreError::Config(_))));

        let cfg = config_from(&[("FAILURE_THRESHOLD", "1.5")]);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("failure_threshold"));

        let cfg = config_from(&[("ENGINE_SHARDS", "0")]);
        assert!(cfg.validate().is_err());
    }
}

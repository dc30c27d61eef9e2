pub mod deviation;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod factors;
pub mod health;
pub mod scoring;
pub mod sequence;
pub mod trigger;
pub mod window;

pub use deviation::FeatureDeviationAnalyzer;
pub use emitter::{ChannelEmitter, JsonLinesEmitter, LogEmitter, PredictionEmitter};
pub use engine::{RuntimeSettingsUpdate, TelemetryEngine};
pub use error::{EmitError, EngineError, ScoringError, WindowError};
pub use scoring::{
    AdapterSlot, AnomalyAdapter, AnomalyArtifact, FailureAdapter, FailureArtifact, FallbackPolicy,
    ScoringAdapter, ScoringInput,
};
pub use sequence::SequenceBuilder;
pub use trigger::{TriggerDecision, TriggerPhase, TriggerPolicy, TriggerState};
pub use window::{EntityWindow, EntityWindowStore};

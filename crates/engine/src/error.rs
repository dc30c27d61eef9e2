use thiserror::Error;

use wellwatch_core::CoreError;
use wellwatch_queue::QueueError;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid engine configuration; fatal at start.
    #[error("engine configuration error: {0}")]
    Config(#[from] CoreError),

    /// The transport could not be opened; fatal at start.
    #[error("transport error: {0}")]
    Transport(#[from] QueueError),
}

/// Policy violation on the window store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("window for {entity_id} not ready: {buffered}/{required} samples")]
    NotReady {
        entity_id: String,
        buffered: usize,
        required: usize,
    },
}

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("invalid scoring input: {0}")]
    Input(String),

    #[error("model failure: {0}")]
    Model(String),

    #[error("invalid artifact: {0}")]
    Artifact(String),

    #[error("artifact IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("emission sink closed")]
    Closed,

    #[error("emission sink full")]
    Full,

    #[error("emission sink error: {0}")]
    Sink(String),
}

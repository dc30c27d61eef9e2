use thiserror::Error;

use wellwatch_core::CoreError;
use wellwatch_engine::ScoringError;

#[derive(Error, Debug)]
pub enum TrainingError {
    /// The cancellation token fired; partial work was discarded.
    #[error("training job cancelled")]
    Cancelled,

    #[error("invalid training input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error("worker task failed: {0}")]
    Join(String),
}

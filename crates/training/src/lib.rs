//! Offline side of the failure model: label join, dataset build, artifact
//! fitting and synthetic data.

pub mod dataset;
pub mod error;
pub mod fit;
pub mod labels;
pub mod normalize;
pub mod synthetic;

pub use dataset::{build_dataset, group_by_entity, spawn_build, LabeledDataset, Progress};
pub use error::TrainingError;
pub use fit::{fit_anomaly_artifact, fit_failure_artifact};
pub use labels::LabelJoiner;
pub use normalize::{ClassBalance, Normalizer};
pub use synthetic::{generate, SyntheticConfig, SyntheticDataset};

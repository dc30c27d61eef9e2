pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod prediction;
pub mod stats;
pub mod status;
pub mod telemetry;

pub use config::Config;
pub use dataset::*;
pub use error::*;
pub use prediction::*;
pub use stats::{FeatureStatistics, FeatureStatisticsTable};
pub use status::*;
pub use telemetry::*;

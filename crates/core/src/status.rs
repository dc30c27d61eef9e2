use serde::{Deserialize, Serialize};

/// Lifecycle of the stream consumer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl LifecycleState {
    pub fn as_u8(self) -> u8 {
        match self {
            LifecycleState::Stopped => 0,
            LifecycleState::Starting => 1,
            LifecycleState::Running => 2,
            LifecycleState::Stopping => 3,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => LifecycleState::Starting,
            2 => LifecycleState::Running,
            3 => LifecycleState::Stopping,
            _ => LifecycleState::Stopped,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Point-in-time snapshot of consumer counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerStats {
    pub running: bool,
    pub state: LifecycleState,
    pub processed_count: u64,
    pub error_count: u64,
    /// Messages dropped by the monitored-entity allow list.
    pub skipped_count: u64,
    pub buffered_entities: usize,
    pub monitored_entities: usize,
    pub tier1_runs: u64,
    pub tier2_runs: u64,
    /// Tier-2 triggers dropped because the work queue was full.
    pub tier2_dropped: u64,
    pub emitted_count: u64,
    pub emit_failures: u64,
}

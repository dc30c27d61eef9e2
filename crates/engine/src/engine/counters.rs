use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use wellwatch_core::{ConsumerStats, LifecycleState};

/// Loop counters. Writers bump them with `Relaxed` adds; `get_stats` reads a
/// snapshot without coordinating with the loop.
#[derive(Debug, Default)]
pub(crate) struct EngineCounters {
    pub(crate) processed: AtomicU64,
    pub(crate) errors: AtomicU64,
    pub(crate) skipped: AtomicU64,
    pub(crate) tier1_runs: AtomicU64,
    pub(crate) tier2_runs: AtomicU64,
    pub(crate) tier2_dropped: AtomicU64,
    pub(crate) emitted: AtomicU64,
    pub(crate) emit_failures: AtomicU64,
    pub(crate) buffered_entities: AtomicUsize,
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl EngineCounters {
    pub(crate) fn snapshot(&self, state: LifecycleState, monitored_entities: usize) -> ConsumerStats {
        ConsumerStats {
            running: state == LifecycleState::Running,
            state,
            processed_count: self.processed.load(Ordering::Relaxed),
            error_count: self.errors.load(Ordering::Relaxed),
            skipped_count: self.skipped.load(Ordering::Relaxed),
            buffered_entities: self.buffered_entities.load(Ordering::Relaxed),
            monitored_entities,
            tier1_runs: self.tier1_runs.load(Ordering::Relaxed),
            tier2_runs: self.tier2_runs.load(Ordering::Relaxed),
            tier2_dropped: self.tier2_dropped.load(Ordering::Relaxed),
            emitted_count: self.emitted.load(Ordering::Relaxed),
            emit_failures: self.emit_failures.load(Ordering::Relaxed),
        }
    }
}

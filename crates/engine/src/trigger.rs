//! Two-tier trigger policy.
//!
//! Tier 1 runs on every sample once the entity's window is ready. Tier 2 runs
//! when Tier 1 flags the sample, or on every `cadence`-th ready evaluation of
//! the entity. A single sample fires Tier 2 at most once; escalation wins
//! when both conditions hold.

use serde::Serialize;

use wellwatch_core::Tier2Reason;

/// Where an entity sat after its most recent evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPhase {
    #[default]
    NotReady,
    Tier1Only,
    Tier1AndTier2,
}

/// Per-entity trigger bookkeeping. Owned by the shard that owns the entity.
#[derive(Debug, Clone, Default)]
pub struct TriggerState {
    /// Ready evaluations so far; the next one gets this index.
    evaluations: u64,
    phase: TriggerPhase,
}

impl TriggerState {
    pub fn phase(&self) -> TriggerPhase {
        self.phase
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }
}

/// Outcome of the pre-scoring evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Window not ready; nothing runs.
    Skip,
    /// Run Tier 1. `index` is the entity's ready-evaluation counter `k`.
    Tier1 { index: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPolicy {
    cadence: u64,
}

impl TriggerPolicy {
    /// A cadence of zero is treated as one.
    pub fn new(cadence: u64) -> Self {
        Self {
            cadence: cadence.max(1),
        }
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }

    /// First step for a new sample: decide whether Tier 1 runs.
    pub fn evaluate(&self, state: &mut TriggerState, ready: bool) -> TriggerDecision {
        if !ready {
            state.phase = TriggerPhase::NotReady;
            return TriggerDecision::Skip;
        }
        let index = state.evaluations;
        state.evaluations += 1;
        state.phase = TriggerPhase::Tier1Only;
        TriggerDecision::Tier1 { index }
    }

    /// Second step, after Tier 1 scored sample `index`.
    pub fn escalate(
        &self,
        state: &mut TriggerState,
        index: u64,
        tier1_flagged: bool,
    ) -> Option<Tier2Reason> {
        let reason = if tier1_flagged {
            Some(Tier2Reason::Escalation)
        } else if index % self.cadence == 0 {
            Some(Tier2Reason::Cadence)
        } else {
            None
        };
        if reason.is_some() {
            state.phase = TriggerPhase::Tier1AndTier2;
        }
        reason
    }
}

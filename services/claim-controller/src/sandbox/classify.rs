//! Mapping from a sandbox's observed fields to a coarse state.
//!
//! The rules are priority-ordered and the first match wins. Every outcome
//! carries a unique reason code so a state can be traced back to the rule
//! that produced it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Sandbox, SandboxPhase};

/// Coarse, derived state of a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SandboxState {
    /// Not yet usable.
    Creating,
    /// Warm in a pool and free to be claimed.
    Available,
    /// Claimed and serving.
    Running,
    /// Claimed and paused (or resuming).
    Paused,
    /// Gone, going, or unusable.
    Dead,
}

/// Why a sandbox was classified the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StateReason {
    ResourceDeleted,
    ShutdownTimeReached,
    ResourcePending,
    ResourceSucceeded,
    ResourceFailed,
    ResourceTerminating,
    ControlledAndReady,
    ControlledNotReady,
    ClaimedAndPaused,
    ClaimedAndReady,
    ClaimedButNotReady,
    NotRunningClaimed,
}

impl StateReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StateReason::ResourceDeleted => "ResourceDeleted",
            StateReason::ShutdownTimeReached => "ShutdownTimeReached",
            StateReason::ResourcePending => "ResourcePending",
            StateReason::ResourceSucceeded => "ResourceSucceeded",
            StateReason::ResourceFailed => "ResourceFailed",
            StateReason::ResourceTerminating => "ResourceTerminating",
            StateReason::ControlledAndReady => "ControlledAndReady",
            StateReason::ControlledNotReady => "ControlledNotReady",
            StateReason::ClaimedAndPaused => "ClaimedAndPaused",
            StateReason::ClaimedAndReady => "ClaimedAndReady",
            StateReason::ClaimedButNotReady => "ClaimedButNotReady",
            StateReason::NotRunningClaimed => "NotRunningClaimed",
        }
    }
}

impl std::fmt::Display for StateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state together with the reason it was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Classification {
    pub state: SandboxState,
    pub reason: StateReason,
}

impl Classification {
    const fn new(state: SandboxState, reason: StateReason) -> Self {
        Self { state, reason }
    }
}

/// Classifies a sandbox as observed at `now`.
pub fn classify(sandbox: &Sandbox, now: DateTime<Utc>) -> Classification {
    use SandboxState::*;
    use StateReason::*;

    if sandbox.metadata.deletion_timestamp.is_some() {
        return Classification::new(Dead, ResourceDeleted);
    }
    if sandbox.spec.shutdown_time.is_some_and(|t| t < now) {
        return Classification::new(Dead, ShutdownTimeReached);
    }

    let phase = sandbox.status.phase;
    match phase {
        SandboxPhase::Pending => return Classification::new(Creating, ResourcePending),
        SandboxPhase::Succeeded => return Classification::new(Dead, ResourceSucceeded),
        SandboxPhase::Failed => return Classification::new(Dead, ResourceFailed),
        SandboxPhase::Terminating => return Classification::new(Dead, ResourceTerminating),
        SandboxPhase::Running | SandboxPhase::Paused | SandboxPhase::Resuming => {}
    }

    let ready = sandbox.is_ready();
    if sandbox.is_pool_controlled() {
        return if ready {
            Classification::new(Available, ControlledAndReady)
        } else {
            Classification::new(Creating, ControlledNotReady)
        };
    }

    match phase {
        SandboxPhase::Running if sandbox.spec.paused => {
            Classification::new(Paused, ClaimedAndPaused)
        }
        SandboxPhase::Running if ready => Classification::new(Running, ClaimedAndReady),
        // A claimed sandbox that runs but never became ready is written off.
        SandboxPhase::Running => Classification::new(Dead, ClaimedButNotReady),
        _ => Classification::new(Paused, NotRunningClaimed),
    }
}

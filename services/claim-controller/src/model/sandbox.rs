//! Sandboxes: individually identified worker instances.

use chrono::{DateTime, Utc};
use claimd_id::SandboxUid;
use claimd_reconcile::{find_condition, Condition};
use serde::{Deserialize, Serialize};

use super::claim::SandboxClaim;
use super::meta::{
    ObjectMeta, API_VERSION, KIND_POOL, LABEL_CLAIMED_BY, LABEL_CLAIMED_BY_NAME,
};

/// Condition type reporting that the sandbox runtime is serving.
pub const CONDITION_READY: &str = "Ready";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sandbox {
    pub metadata: ObjectMeta<SandboxUid>,

    #[serde(default)]
    pub spec: SandboxSpec,

    #[serde(default)]
    pub status: SandboxStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxSpec {
    #[serde(default)]
    pub paused: bool,

    /// The sandbox is shut down once this time passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_time: Option<DateTime<Utc>>,
}

/// Lifecycle phase reported by the sandbox runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SandboxPhase {
    #[default]
    Pending,
    Running,
    Paused,
    Resuming,
    Succeeded,
    Failed,
    Terminating,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxStatus {
    #[serde(default)]
    pub phase: SandboxPhase,

    /// Network address assigned to the sandbox; empty until scheduled.
    #[serde(default)]
    pub pod_ip: String,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Sandbox {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name, SandboxUid::new()),
            spec: SandboxSpec::default(),
            status: SandboxStatus::default(),
        }
    }

    /// Ready means an assigned address and an explicitly true Ready condition.
    pub fn is_ready(&self) -> bool {
        if self.status.pod_ip.is_empty() {
            return false;
        }
        find_condition(&self.status.conditions, CONDITION_READY)
            .is_some_and(|c| c.status.is_true())
    }

    /// True if a pool controller manages this sandbox.
    pub fn is_pool_controlled(&self) -> bool {
        self.metadata
            .controller()
            .is_some_and(|r| r.kind == KIND_POOL && r.api_version == API_VERSION)
    }

    /// Name of the claim this sandbox is bound to, if any.
    pub fn claimed_by_name(&self) -> Option<&str> {
        self.metadata.label(LABEL_CLAIMED_BY_NAME)
    }

    /// True if the sandbox carries a binding to any claim.
    pub fn is_claimed(&self) -> bool {
        self.metadata.label(LABEL_CLAIMED_BY).is_some()
            || self.metadata.label(LABEL_CLAIMED_BY_NAME).is_some()
    }

    /// Binds the sandbox to a claim: writes the binding label pair and drops
    /// the pool controller reference.
    pub fn bind_to(&mut self, claim: &SandboxClaim) {
        self.metadata.labels.insert(
            LABEL_CLAIMED_BY.to_string(),
            claim.metadata.uid.to_string(),
        );
        self.metadata.labels.insert(
            LABEL_CLAIMED_BY_NAME.to_string(),
            claim.metadata.name.clone(),
        );
        self.metadata
            .owner_references
            .retain(|r| !(r.controller && r.kind == KIND_POOL));
    }
}

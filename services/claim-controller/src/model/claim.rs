//! Sandbox claims.

use std::time::Duration;

use chrono::{DateTime, Utc};
use claimd_events::ObjectRef;
use claimd_id::ClaimUid;
use claimd_reconcile::Condition;
use serde::{Deserialize, Serialize};

use super::meta::{ObjectKey, ObjectMeta, KIND_CLAIM};

/// Replica count assumed when a claim does not set one.
pub const DEFAULT_REPLICAS: i32 = 1;

/// A request for N interchangeable sandboxes from a named pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxClaim {
    pub metadata: ObjectMeta<ClaimUid>,
    pub spec: ClaimSpec,

    #[serde(default)]
    pub status: ClaimStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSpec {
    /// Name of the pool in the claim's namespace to take sandboxes from.
    pub pool_name: String,

    /// Desired sandbox count; immutable after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Give up collecting sandboxes after this long.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_timeout: Option<Duration>,

    /// Delete the claim this long after it completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_after_completed: Option<Duration>,
}

/// Coarse lifecycle stage of a claim. Ordered; phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ClaimPhase {
    #[default]
    NotStarted,
    Claiming,
    Completed,
}

impl std::fmt::Display for ClaimPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClaimPhase::NotStarted => "NotStarted",
            ClaimPhase::Claiming => "Claiming",
            ClaimPhase::Completed => "Completed",
        };
        f.write_str(s)
    }
}

/// Condition types set on a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimConditionType {
    Completed,
    TimedOut,
}

impl ClaimConditionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ClaimConditionType::Completed => "Completed",
            ClaimConditionType::TimedOut => "TimedOut",
        }
    }
}

/// Controller-owned, derived state of a claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimStatus {
    #[serde(default)]
    pub phase: ClaimPhase,

    #[serde(default)]
    pub observed_generation: i64,

    /// Set once, when the claim enters Claiming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub claimed_replicas: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl SandboxClaim {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        pool_name: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name, ClaimUid::new()),
            spec: ClaimSpec {
                pool_name: pool_name.into(),
                ..ClaimSpec::default()
            },
            status: ClaimStatus::default(),
        }
    }

    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.spec.replicas = Some(replicas);
        self
    }

    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.spec.claim_timeout = Some(timeout);
        self
    }

    pub fn with_ttl_after_completed(mut self, ttl: Duration) -> Self {
        self.spec.ttl_after_completed = Some(ttl);
        self
    }

    /// Desired sandbox count, defaulting to [`DEFAULT_REPLICAS`].
    pub fn desired_replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(DEFAULT_REPLICAS)
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    /// Key of the pool this claim draws from.
    pub fn pool_key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.spec.pool_name)
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(
            KIND_CLAIM,
            &self.metadata.namespace,
            &self.metadata.name,
            self.metadata.uid,
        )
    }
}

//! Event record types and well-known reason codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventType {
    #[default]
    Normal,
    Warning,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Normal => write!(f, "Normal"),
            EventType::Warning => write!(f, "Warning"),
        }
    }
}

/// The object an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl ObjectRef {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        uid: impl ToString,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.to_string(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// A single recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub object: ObjectRef,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Reason codes emitted by the claim controller.
pub mod reasons {
    /// A claim entered the Claiming phase.
    pub const CLAIM_STARTED: &str = "ClaimStarted";
    /// A sandbox was bound to a claim.
    pub const SANDBOX_CLAIMED: &str = "SandboxClaimed";
    /// A claim collected every requested sandbox.
    pub const ALL_REPLICAS_CLAIMED: &str = "AllReplicasClaimed";
    /// A claim's target pool no longer exists.
    pub const POOL_NOT_FOUND: &str = "PoolNotFound";
    /// A claim ran out of time before collecting every sandbox.
    pub const CLAIM_TIMEOUT_REACHED: &str = "ClaimTimeoutReached";
    /// A completed claim outlived its retention and was deleted.
    pub const CLAIM_EXPIRED: &str = "ClaimExpired";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_display() {
        let obj = ObjectRef::new("SandboxClaim", "default", "batch-1", "clm_x");
        assert_eq!(obj.to_string(), "SandboxClaim/default/batch-1");
    }

    #[test]
    fn test_event_type_serialization() {
        let json = serde_json::to_string(&EventType::Warning).unwrap();
        assert_eq!(json, "\"Warning\"");
    }
}

//! Object store seam.
//!
//! The controller reads and writes claims, pools and sandboxes only through
//! [`ObjectStore`]. Writes are version-checked: an update carrying a stale
//! resource version fails with [`StoreError::Conflict`] instead of
//! overwriting a concurrent change.

mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use claimd_id::ResourceVersion;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::model::{ObjectKey, Sandbox, SandboxClaim, SandboxPool};

pub use memory::MemoryStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by an object store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    /// The write carried a stale resource version.
    #[error("conflict writing {kind} {key}: expected version {expected}, found {actual}")]
    Conflict {
        kind: &'static str,
        key: ObjectKey,
        expected: ResourceVersion,
        actual: ResourceVersion,
    },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    #[error("store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Equality-based label filter. An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// What happened to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Added,
    Modified,
    Deleted,
}

/// A change notification. Deleted events carry the last stored state.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Claim(WatchAction, SandboxClaim),
    Pool(WatchAction, SandboxPool),
    Sandbox(WatchAction, Sandbox),
}

/// Access to stored claims, pools and sandboxes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_claim(&self, key: &ObjectKey) -> StoreResult<Option<SandboxClaim>>;

    /// Lists claims, optionally restricted to one namespace.
    async fn list_claims(&self, namespace: Option<&str>) -> StoreResult<Vec<SandboxClaim>>;

    /// Writes the claim's status. `spec` is never touched.
    async fn update_claim_status(&self, claim: &SandboxClaim) -> StoreResult<SandboxClaim>;

    async fn delete_claim(&self, key: &ObjectKey) -> StoreResult<()>;

    async fn get_pool(&self, key: &ObjectKey) -> StoreResult<Option<SandboxPool>>;

    /// Lists sandboxes in a namespace whose labels match the selector.
    async fn list_sandboxes(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StoreResult<Vec<Sandbox>>;

    /// Writes a sandbox's metadata and spec.
    async fn update_sandbox(&self, sandbox: &Sandbox) -> StoreResult<Sandbox>;

    /// Subscribes to change notifications.
    fn watch(&self) -> broadcast::Receiver<WatchEvent>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_selector_requires_every_pair() {
        let labels: BTreeMap<String, String> = [
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]
        .into_iter()
        .collect();

        assert!(LabelSelector::new().matches(&labels));
        assert!(LabelSelector::new().with("a", "1").matches(&labels));
        assert!(LabelSelector::new().with("a", "1").with("b", "2").matches(&labels));
        assert!(!LabelSelector::new().with("a", "1").with("b", "3").matches(&labels));
        assert!(!LabelSelector::new().with("c", "1").matches(&labels));
    }
}

//! Reconciliation errors.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that abort a reconciliation pass.
///
/// A failed pass never leaves a partially written status behind: the status
/// write is the last store call of a pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Listing the claim's bound sandboxes failed.
    #[error("counting sandboxes bound to {claim} failed: {source}")]
    Count {
        claim: String,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    /// True if the pass should be retried by the scheduler.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Store(e) | ReconcileError::Count { source: e, .. } => {
                !matches!(e, StoreError::AlreadyExists { .. })
            }
        }
    }

    /// True if the pass lost an optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        match self {
            ReconcileError::Store(e) | ReconcileError::Count { source: e, .. } => e.is_conflict(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectKey;
    use claimd_id::ResourceVersion;

    #[test]
    fn test_conflict_is_retryable() {
        let err = ReconcileError::from(StoreError::Conflict {
            kind: "SandboxClaim",
            key: ObjectKey::new("default", "c"),
            expected: ResourceVersion::from("1"),
            actual: ResourceVersion::from("2"),
        });
        assert!(err.is_conflict());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_count_failure_is_retryable() {
        let err = ReconcileError::Count {
            claim: "default/c".to_string(),
            source: StoreError::Internal("list failed".to_string()),
        };
        assert!(err.is_retryable());
        assert!(!err.is_conflict());
        assert!(err.to_string().contains("default/c"));
    }
}

//! Per-claim reconciliation pass.
//!
//! A pass loads the claim and its pool, lets [`ClaimControl`] decide the next
//! status, runs the step for the phase the claim was in and writes the status
//! back when it changed. The status write is version-checked; losing that race
//! surfaces as a retryable error and the next pass recomputes from scratch.

use std::sync::Arc;

use claimd_events::{reasons, EventRecorder, EventType};
use claimd_reconcile::RequeueStrategy;
use tracing::{debug, info, instrument};

use crate::claim::{
    completion_reason, ClaimControl, REASON_ALL_REPLICAS_CLAIMED, REASON_POOL_NOT_FOUND,
    REASON_TIMEOUT_REACHED,
};
use crate::error::ReconcileError;
use crate::model::{ClaimPhase, ClaimStatus, ObjectKey, SandboxClaim};
use crate::store::ObjectStore;

pub struct ClaimReconciler {
    store: Arc<dyn ObjectStore>,
    control: ClaimControl,
    recorder: Arc<dyn EventRecorder>,
}

impl ClaimReconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        control: ClaimControl,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            store,
            control,
            recorder,
        }
    }

    /// Reconciles one claim and returns when it wants to be looked at again.
    ///
    /// A claim that no longer exists is not an error.
    #[instrument(skip(self), fields(claim = %key))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<RequeueStrategy, ReconcileError> {
        let Some(claim) = self.store.get_claim(key).await? else {
            debug!("claim not found, nothing to do");
            return Ok(RequeueStrategy::None);
        };
        let pool = self.store.get_pool(&claim.pool_key()).await?;

        let previous = claim.status.phase;
        let (mut status, skip) = self
            .control
            .calculate_status(&claim, pool.as_ref(), &claim.status);

        if skip {
            let Some(stored) = self.persist(&claim, status).await? else {
                return Ok(RequeueStrategy::None);
            };
            self.record_completion(&stored, &stored.status);
            return self.control.ensure_completed(&stored, &stored.status).await;
        }

        match previous {
            ClaimPhase::NotStarted => {
                let requeue = self.control.ensure_pending(&claim, &mut status);
                self.persist(&claim, status).await?;
                Ok(requeue)
            }
            ClaimPhase::Claiming => {
                let requeue = self
                    .control
                    .ensure_claiming(&claim, pool.as_ref(), &mut status)
                    .await?;
                self.persist(&claim, status).await?;
                Ok(requeue)
            }
            ClaimPhase::Completed => {
                let Some(stored) = self.persist(&claim, status).await? else {
                    return Ok(RequeueStrategy::None);
                };
                self.control.ensure_completed(&stored, &stored.status).await
            }
        }
    }

    /// Writes `status` if it differs from the stored one.
    ///
    /// Returns the stored claim, or `None` if it was deleted in the meantime.
    async fn persist(
        &self,
        claim: &SandboxClaim,
        status: ClaimStatus,
    ) -> Result<Option<SandboxClaim>, ReconcileError> {
        if status == claim.status {
            return Ok(Some(claim.clone()));
        }

        let from = claim.status.phase;
        let mut updated = claim.clone();
        updated.status = status;
        match self.store.update_claim_status(&updated).await {
            Ok(stored) => {
                if stored.status.phase != from {
                    info!(
                        from = %from,
                        to = %stored.status.phase,
                        claimed = stored.status.claimed_replicas,
                        "claim phase changed"
                    );
                }
                Ok(Some(stored))
            }
            Err(e) if e.is_not_found() => {
                debug!("claim deleted before status write");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn record_completion(&self, claim: &SandboxClaim, status: &ClaimStatus) {
        let (event_type, reason) = match completion_reason(status) {
            Some(REASON_POOL_NOT_FOUND) => (EventType::Warning, reasons::POOL_NOT_FOUND),
            Some(REASON_TIMEOUT_REACHED) => (EventType::Warning, reasons::CLAIM_TIMEOUT_REACHED),
            Some(REASON_ALL_REPLICAS_CLAIMED) => {
                (EventType::Normal, reasons::ALL_REPLICAS_CLAIMED)
            }
            _ => return,
        };
        self.recorder
            .event(&claim.object_ref(), event_type, reason, &status.message);
    }
}

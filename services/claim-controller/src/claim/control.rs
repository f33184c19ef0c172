//! Phase-specific claim steps.

use std::sync::Arc;
use std::time::Duration;

use claimd_events::{reasons, EventRecorder, EventType};
use claimd_reconcile::{elapsed_since, Clock, RequeueStrategy, DEFAULT_CLAIM_POLL_INTERVAL};
use tracing::{debug, info};

use super::matcher::ClaimMatcher;
use super::status::{calculate_status, start_claiming};
use crate::error::ReconcileError;
use crate::model::{ClaimStatus, SandboxClaim, SandboxPool};
use crate::sandbox::SandboxStateCache;
use crate::store::ObjectStore;

/// The claim state machine: status computation plus the `ensure_*` step for
/// each phase.
pub struct ClaimControl {
    store: Arc<dyn ObjectStore>,
    matcher: ClaimMatcher,
    recorder: Arc<dyn EventRecorder>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl ClaimControl {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cache: Arc<SandboxStateCache>,
        recorder: Arc<dyn EventRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            matcher: ClaimMatcher::new(store.clone(), cache),
            store,
            recorder,
            clock,
            poll_interval: DEFAULT_CLAIM_POLL_INTERVAL,
        }
    }

    /// Sets the delay between polls while a claim is still short of sandboxes.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// See [`calculate_status`]; reads the time from the injected clock.
    pub fn calculate_status(
        &self,
        claim: &SandboxClaim,
        pool: Option<&SandboxPool>,
        current: &ClaimStatus,
    ) -> (ClaimStatus, bool) {
        calculate_status(claim, pool, current, self.clock.now())
    }

    /// First pass of a new claim: enter `Claiming` and look again right away.
    pub fn ensure_pending(
        &self,
        claim: &SandboxClaim,
        status: &mut ClaimStatus,
    ) -> RequeueStrategy {
        start_claiming(status, self.clock.now());
        self.recorder.event(
            &claim.object_ref(),
            EventType::Normal,
            reasons::CLAIM_STARTED,
            &format!(
                "Started claiming {} sandboxes from pool {}",
                claim.desired_replicas(),
                claim.spec.pool_name
            ),
        );
        RequeueStrategy::Immediate
    }

    /// Binds available sandboxes and refreshes `claimed_replicas`.
    ///
    /// Requeues immediately once the desired count is reached so the next
    /// pass completes the claim; otherwise polls again after the configured
    /// interval. On error `status` is left untouched.
    pub async fn ensure_claiming(
        &self,
        claim: &SandboxClaim,
        pool: Option<&SandboxPool>,
        status: &mut ClaimStatus,
    ) -> Result<RequeueStrategy, ReconcileError> {
        let desired = claim.desired_replicas();
        let mut claimed = self.count(claim).await?;

        if let Some(pool) = pool.filter(|_| claimed < desired) {
            let want = usize::try_from(desired - claimed).unwrap_or(0);
            let bound = self.matcher.bind_available(claim, pool, want).await?;
            for sandbox in &bound {
                self.recorder.event(
                    &claim.object_ref(),
                    EventType::Normal,
                    reasons::SANDBOX_CLAIMED,
                    &format!("Claimed sandbox {}", sandbox.metadata.name),
                );
            }
            if !bound.is_empty() {
                // Recount: a concurrent pass may have bound sandboxes too.
                claimed = self.count(claim).await?;
            }
        }

        debug!(claim = %claim.key(), claimed, desired, "counted bound sandboxes");
        status.claimed_replicas = claimed;

        if claimed >= desired {
            Ok(RequeueStrategy::Immediate)
        } else {
            Ok(RequeueStrategy::After(self.poll_interval))
        }
    }

    /// Retention handling for a completed claim.
    ///
    /// Deletes the claim once `ttl_after_completed` has passed since
    /// completion; until then asks to be woken up when it will have.
    pub async fn ensure_completed(
        &self,
        claim: &SandboxClaim,
        status: &ClaimStatus,
    ) -> Result<RequeueStrategy, ReconcileError> {
        let Some(ttl) = claim.spec.ttl_after_completed else {
            return Ok(RequeueStrategy::None);
        };
        let Some(completed_at) = status.completion_time else {
            return Ok(RequeueStrategy::None);
        };

        let elapsed = elapsed_since(completed_at, self.clock.now()).unwrap_or(Duration::ZERO);
        if elapsed < ttl {
            return Ok(RequeueStrategy::After(ttl - elapsed));
        }

        match self.store.delete_claim(&claim.key()).await {
            Ok(()) => {
                info!(claim = %claim.key(), ?ttl, "deleted expired claim");
                self.recorder.event(
                    &claim.object_ref(),
                    EventType::Normal,
                    reasons::CLAIM_EXPIRED,
                    &format!("Claim deleted {ttl:?} after completion"),
                );
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Ok(RequeueStrategy::None)
    }

    async fn count(&self, claim: &SandboxClaim) -> Result<i32, ReconcileError> {
        self.matcher
            .count_bound_sandboxes(claim)
            .await
            .map_err(|source| ReconcileError::Count {
                claim: claim.key().to_string(),
                source,
            })
    }
}

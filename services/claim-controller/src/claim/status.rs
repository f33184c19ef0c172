//! Claim phase computation.
//!
//! [`calculate_status`] is evaluated on every reconciliation pass and decides
//! the next status from the claim, its pool and the current status. It only
//! reads the clock; all side effects live in [`super::ClaimControl`].
//!
//! Evaluation order (first match wins):
//!
//! | # | Situation                      | Result                        |
//! |---|--------------------------------|-------------------------------|
//! | 1 | phase is `NotStarted`          | `Claiming`, continue          |
//! |   | ... and pool missing           | `Completed`, skip             |
//! | 2 | phase is `Completed`           | unchanged, continue (for TTL) |
//! | 3 | pool missing                   | `Completed`, skip             |
//! | 4 | timeout elapsed                | `Completed`, skip             |
//! | 5 | claimed >= desired             | `Completed`, skip             |
//! | 6 | otherwise                      | unchanged, continue           |
//!
//! `observed_generation` is refreshed in every case.

use std::time::Duration;

use chrono::{DateTime, Utc};
use claimd_reconcile::{elapsed_since, set_condition, Condition, ConditionStatus};
use tracing::{debug, info};

use crate::model::{ClaimConditionType, ClaimPhase, ClaimStatus, SandboxClaim, SandboxPool};

/// Completed-condition reason when the target pool is gone.
pub const REASON_POOL_NOT_FOUND: &str = "PoolNotFound";

/// Completed-condition reason when the claim ran out of time.
pub const REASON_TIMEOUT_REACHED: &str = "TimeoutReached";

/// TimedOut-condition reason.
pub const REASON_CLAIM_TIMEOUT_REACHED: &str = "ClaimTimeoutReached";

/// Completed-condition reason when every replica was claimed.
pub const REASON_ALL_REPLICAS_CLAIMED: &str = "AllReplicasClaimed";

const MESSAGE_POOL_NOT_FOUND: &str = "Pool not found or deleted";

/// Computes the next status of a claim.
///
/// Returns the new status and whether the phase-specific step should be
/// skipped because the decision for this pass is already terminal.
pub fn calculate_status(
    claim: &SandboxClaim,
    pool: Option<&SandboxPool>,
    current: &ClaimStatus,
    now: DateTime<Utc>,
) -> (ClaimStatus, bool) {
    let mut status = current.clone();
    status.observed_generation = claim.metadata.generation;

    match status.phase {
        ClaimPhase::NotStarted => {
            info!(
                claim = %claim.key(),
                generation = claim.metadata.generation,
                desired = claim.desired_replicas(),
                "starting claim"
            );
            start_claiming(&mut status, now);
            if pool.is_none() {
                complete_pool_missing(claim, &mut status, now);
                return (status, true);
            }
            return (status, false);
        }
        ClaimPhase::Completed => {
            debug!(claim = %claim.key(), "claim already completed");
            return (status, false);
        }
        ClaimPhase::Claiming => {}
    }

    if pool.is_none() {
        complete_pool_missing(claim, &mut status, now);
        return (status, true);
    }

    if let Some(elapsed) = timed_out(claim, &status, now) {
        info!(
            claim = %claim.key(),
            ?elapsed,
            claimed = status.claimed_replicas,
            desired = claim.desired_replicas(),
            "claim timeout reached"
        );
        complete_with_timeout(&mut status, claim.desired_replicas(), elapsed, now);
        return (status, true);
    }

    if status.claimed_replicas >= claim.desired_replicas() {
        info!(
            claim = %claim.key(),
            claimed = status.claimed_replicas,
            desired = claim.desired_replicas(),
            "all replicas claimed"
        );
        complete_with_success(&mut status, claim.desired_replicas(), now);
        return (status, true);
    }

    debug!(
        claim = %claim.key(),
        phase = %status.phase,
        claimed = status.claimed_replicas,
        desired = claim.desired_replicas(),
        "claim still collecting sandboxes"
    );
    (status, false)
}

/// Moves a claim into `Claiming`. The start time is written only if it was
/// never set.
pub(crate) fn start_claiming(status: &mut ClaimStatus, now: DateTime<Utc>) {
    status.phase = ClaimPhase::Claiming;
    if status.claim_start_time.is_none() {
        status.claim_start_time = Some(now);
    }
}

fn complete_pool_missing(claim: &SandboxClaim, status: &mut ClaimStatus, now: DateTime<Utc>) {
    info!(
        claim = %claim.key(),
        pool = %claim.spec.pool_name,
        "pool not found, completing claim"
    );
    complete(status, REASON_POOL_NOT_FOUND, MESSAGE_POOL_NOT_FOUND, now);
}

/// Elapsed time if the claim has a timeout and it has passed.
///
/// A start time in the future never times out.
fn timed_out(claim: &SandboxClaim, status: &ClaimStatus, now: DateTime<Utc>) -> Option<Duration> {
    let timeout = claim.spec.claim_timeout?;
    let elapsed = elapsed_since(status.claim_start_time?, now)?;
    (elapsed >= timeout).then_some(elapsed)
}

fn complete(status: &mut ClaimStatus, reason: &str, message: &str, now: DateTime<Utc>) {
    status.phase = ClaimPhase::Completed;
    status.message = message.to_string();
    status.completion_time = Some(now);
    set_condition(
        Some(&mut status.conditions),
        Condition::new(
            ClaimConditionType::Completed.as_str(),
            ConditionStatus::True,
            reason,
            message,
            now,
        ),
    );
}

fn complete_with_timeout(
    status: &mut ClaimStatus,
    desired: i32,
    elapsed: Duration,
    now: DateTime<Utc>,
) {
    let claimed = status.claimed_replicas;
    let message =
        format!("Timeout reached after {elapsed:?}, claimed {claimed}/{desired} sandboxes");

    set_condition(
        Some(&mut status.conditions),
        Condition::new(
            ClaimConditionType::TimedOut.as_str(),
            ConditionStatus::True,
            REASON_CLAIM_TIMEOUT_REACHED,
            format!("Timeout after {elapsed:?}, claimed {claimed}/{desired}"),
            now,
        ),
    );
    complete(status, REASON_TIMEOUT_REACHED, &message, now);
}

fn complete_with_success(status: &mut ClaimStatus, desired: i32, now: DateTime<Utc>) {
    let claimed = status.claimed_replicas;
    status.phase = ClaimPhase::Completed;
    status.message = format!("Successfully claimed {claimed}/{desired} sandboxes");
    status.completion_time = Some(now);
    set_condition(
        Some(&mut status.conditions),
        Condition::new(
            ClaimConditionType::Completed.as_str(),
            ConditionStatus::True,
            REASON_ALL_REPLICAS_CLAIMED,
            format!("Successfully claimed all {claimed} sandboxes"),
            now,
        ),
    );
}

/// Reason of the claim's Completed condition, if set.
pub fn completion_reason(status: &ClaimStatus) -> Option<&str> {
    claimd_reconcile::find_condition(&status.conditions, ClaimConditionType::Completed.as_str())
        .map(|c| c.reason.as_str())
}

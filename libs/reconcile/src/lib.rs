//! Reconciliation loop primitives.
//!
//! This library provides the pieces every claimd reconciler shares:
//!
//! - **Requeue directives**: how a reconciliation pass tells the scheduler
//!   when to look at an object again.
//! - **Conditions**: named, timestamped facts on an object's status, with a
//!   single upsert path.
//! - **Clocks**: an injectable time source so phase logic is deterministic
//!   under test.
//! - **Failure backoff**: per-key retry delays for passes that errored.
//!
//! # Invariants
//!
//! - Reconciliation never sleeps; timing is expressed only via [`RequeueStrategy`]
//! - Conditions are keyed by type: at most one entry per type
//! - Elapsed time is never negative; a start time in the future counts as
//!   "nothing elapsed yet"

mod backoff;
mod clock;
mod condition;

use std::time::Duration;

pub use backoff::FailureBackoff;
pub use clock::{elapsed_since, Clock, FixedClock, SystemClock};
pub use condition::{find_condition, set_condition, Condition, ConditionStatus};

/// Directive returned by a reconciliation pass to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequeueStrategy {
    /// Do not requeue; wait for the next external change.
    #[default]
    None,

    /// Requeue as soon as possible.
    Immediate,

    /// Requeue after the given delay.
    After(Duration),
}

impl RequeueStrategy {
    /// Returns true if the scheduler should re-run the object at all.
    pub fn should_requeue(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns the delay before the next pass, if any.
    ///
    /// `Immediate` is reported as a zero delay.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Immediate => Some(Duration::ZERO),
            Self::After(d) => Some(*d),
        }
    }
}

/// Default delay between polls while a claim is still collecting sandboxes.
pub const DEFAULT_CLAIM_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default first retry delay after a failed pass.
pub const DEFAULT_ERROR_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Default ceiling for retry delays.
pub const DEFAULT_ERROR_BACKOFF_MAX: Duration = Duration::from_secs(60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeue_strategy_default_is_none() {
        assert_eq!(RequeueStrategy::default(), RequeueStrategy::None);
        assert!(!RequeueStrategy::None.should_requeue());
    }

    #[test]
    fn test_requeue_strategy_delay() {
        assert_eq!(RequeueStrategy::None.delay(), None);
        assert_eq!(RequeueStrategy::Immediate.delay(), Some(Duration::ZERO));
        assert_eq!(
            RequeueStrategy::After(Duration::from_secs(3)).delay(),
            Some(Duration::from_secs(3))
        );
        assert!(RequeueStrategy::Immediate.should_requeue());
    }
}

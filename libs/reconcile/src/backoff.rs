//! Per-key retry backoff for failed reconciliation passes.

use std::collections::BTreeMap;
use std::time::Duration;

/// Tracks consecutive failures per object and hands out growing delays.
///
/// The delay doubles with every consecutive failure, starting at `base` and
/// capped at `max`. A success clears the key.
#[derive(Debug, Clone)]
pub struct FailureBackoff {
    base: Duration,
    max: Duration,

    /// object key -> consecutive failures
    failures: BTreeMap<String, u32>,
}

impl FailureBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: BTreeMap::new(),
        }
    }

    /// Records a failure and returns the delay before the next attempt.
    pub fn record_failure(&mut self, key: &str) -> Duration {
        let count = self.failures.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);

        let exponent = (*count - 1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }

    /// Number of consecutive failures recorded for a key.
    pub fn failures(&self, key: &str) -> u32 {
        self.failures.get(key).copied().unwrap_or(0)
    }

    /// Forgets a key (on success or deletion).
    pub fn clear(&mut self, key: &str) {
        self.failures.remove(key);
    }
}

impl Default for FailureBackoff {
    fn default() -> Self {
        Self::new(crate::DEFAULT_ERROR_BACKOFF_BASE, crate::DEFAULT_ERROR_BACKOFF_MAX)
    }
}

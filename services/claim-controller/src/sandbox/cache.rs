//! Concurrent memoization of sandbox classification.
//!
//! Entries are keyed by `(namespace, name, resource version)`. A new write to
//! a sandbox produces a new resource version, so stale entries simply stop
//! being looked up; [`SandboxStateCache::invalidate`] drops every version of
//! a sandbox once it is deleted so the map does not grow without bound.
//!
//! Objects without a resource version were never persisted and are always
//! classified fresh without touching the map.

use std::collections::HashMap;
use std::sync::Arc;

use claimd_id::ResourceVersion;
use claimd_reconcile::{Clock, SystemClock};
use dashmap::DashMap;
use tracing::trace;

use super::classify::{classify, Classification};
use crate::model::{ObjectKey, Sandbox};

/// Shared classification cache. Construct one per controller and hand it to
/// every component that needs sandbox states.
pub struct SandboxStateCache {
    entries: DashMap<ObjectKey, HashMap<ResourceVersion, Classification>>,
    clock: Arc<dyn Clock>,
}

impl SandboxStateCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Returns the state of a sandbox, computing and caching it on a miss.
    ///
    /// When two callers miss on the same key concurrently, the first insert
    /// wins and every caller gets the stored value.
    pub fn get(&self, sandbox: &Sandbox) -> Classification {
        let version = &sandbox.metadata.resource_version;
        if version.is_unset() {
            return classify(sandbox, self.clock.now());
        }

        let key = sandbox.metadata.key();
        let cached = self
            .entries
            .get(&key)
            .and_then(|versions| versions.get(version).copied());
        if let Some(hit) = cached {
            return hit;
        }

        let computed = classify(sandbox, self.clock.now());
        *self
            .entries
            .entry(key)
            .or_default()
            .entry(version.clone())
            .or_insert(computed)
    }

    /// Drops every cached version of a sandbox. Call on delete events.
    pub fn invalidate(&self, namespace: &str, name: &str) {
        if namespace.is_empty() || name.is_empty() {
            return;
        }
        if let Some((key, versions)) = self.entries.remove(&ObjectKey::new(namespace, name)) {
            trace!(sandbox = %key, versions = versions.len(), "state cache invalidated");
        }
    }

    /// Total number of cached (sandbox, version) entries.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SandboxStateCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

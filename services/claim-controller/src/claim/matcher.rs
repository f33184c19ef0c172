//! Finding and binding sandboxes for a claim.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::{
    Sandbox, SandboxClaim, SandboxPool, KIND_POOL, LABEL_CLAIMED_BY, LABEL_CLAIMED_BY_NAME,
    LABEL_POOL,
};
use crate::sandbox::{SandboxState, SandboxStateCache};
use crate::store::{LabelSelector, ObjectStore, StoreResult};

/// Selector for sandboxes bound to `claim`.
///
/// Both the uid and the name are matched so that sandboxes bound to an
/// earlier claim with the same name are not counted.
pub fn binding_selector(claim: &SandboxClaim) -> LabelSelector {
    LabelSelector::new()
        .with(LABEL_CLAIMED_BY, claim.metadata.uid.to_string())
        .with(LABEL_CLAIMED_BY_NAME, claim.metadata.name.clone())
}

/// Counts and binds sandboxes on behalf of claims.
pub struct ClaimMatcher {
    store: Arc<dyn ObjectStore>,
    cache: Arc<SandboxStateCache>,
}

impl ClaimMatcher {
    pub fn new(store: Arc<dyn ObjectStore>, cache: Arc<SandboxStateCache>) -> Self {
        Self { store, cache }
    }

    /// Number of sandboxes currently bound to the claim, healthy or not.
    pub async fn count_bound_sandboxes(&self, claim: &SandboxClaim) -> StoreResult<i32> {
        let bound = self
            .store
            .list_sandboxes(&claim.metadata.namespace, &binding_selector(claim))
            .await?;
        Ok(i32::try_from(bound.len()).unwrap_or(i32::MAX))
    }

    /// Unbound sandboxes of `pool` that are ready to be claimed, by name.
    pub async fn available_sandboxes(&self, pool: &SandboxPool) -> StoreResult<Vec<Sandbox>> {
        let selector = LabelSelector::new().with(LABEL_POOL, pool.metadata.name.clone());
        let mut candidates: Vec<Sandbox> = self
            .store
            .list_sandboxes(&pool.metadata.namespace, &selector)
            .await?
            .into_iter()
            .filter(|s| !s.is_claimed() && controlled_by(s, pool))
            .filter(|s| self.cache.get(s).state == SandboxState::Available)
            .collect();
        candidates.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(candidates)
    }

    /// Binds up to `want` available sandboxes from `pool` to the claim.
    ///
    /// A candidate that changed under us (version conflict) is skipped; any
    /// other store error aborts. Returns the sandboxes that were bound.
    pub async fn bind_available(
        &self,
        claim: &SandboxClaim,
        pool: &SandboxPool,
        want: usize,
    ) -> StoreResult<Vec<Sandbox>> {
        if want == 0 {
            return Ok(Vec::new());
        }

        let mut bound = Vec::with_capacity(want);
        for mut candidate in self.available_sandboxes(pool).await? {
            if bound.len() >= want {
                break;
            }

            candidate.bind_to(claim);
            match self.store.update_sandbox(&candidate).await {
                Ok(stored) => {
                    debug!(
                        claim = %claim.key(),
                        sandbox = %stored.metadata.key(),
                        "sandbox bound"
                    );
                    bound.push(stored);
                }
                Err(e) if e.is_conflict() || e.is_not_found() => {
                    warn!(
                        claim = %claim.key(),
                        sandbox = %candidate.metadata.key(),
                        error = %e,
                        "sandbox changed while binding, skipping"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(bound)
    }
}

fn controlled_by(sandbox: &Sandbox, pool: &SandboxPool) -> bool {
    sandbox.is_pool_controlled()
        && sandbox.metadata.controller().is_some_and(|r| {
            r.kind == KIND_POOL
                && r.name == pool.metadata.name
                && r.uid == pool.metadata.uid.to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SandboxPhase, CONDITION_READY};
    use crate::store::MemoryStore;
    use claimd_reconcile::{Condition, ConditionStatus};

    fn warm(pool: &SandboxPool, name: &str) -> Sandbox {
        let mut sbx = Sandbox::new(&pool.metadata.namespace, name);
        sbx.metadata
            .labels
            .insert(LABEL_POOL.to_string(), pool.metadata.name.clone());
        sbx.metadata.owner_references.push(pool.controller_reference());
        sbx.status.phase = SandboxPhase::Running;
        sbx.status.pod_ip = "10.0.0.2".to_string();
        sbx.status.conditions.push(Condition::new(
            CONDITION_READY,
            ConditionStatus::True,
            "Probe",
            "",
            chrono::Utc::now(),
        ));
        sbx
    }

    async fn setup() -> (Arc<MemoryStore>, ClaimMatcher, SandboxPool) {
        let store = Arc::new(MemoryStore::new());
        let pool = store
            .create_pool(SandboxPool::new("default", "warm"))
            .await
            .unwrap();
        let matcher = ClaimMatcher::new(store.clone(), Arc::new(SandboxStateCache::default()));
        (store, matcher, pool)
    }

    #[tokio::test]
    async fn test_count_matches_uid_and_name() {
        let (store, matcher, pool) = setup().await;
        let claim = SandboxClaim::new("default", "batch", "warm");

        let mut mine = warm(&pool, "a");
        mine.bind_to(&claim);
        store.create_sandbox(mine).await.unwrap();

        // Same name, different uid: an older claim with the same name.
        let older = SandboxClaim::new("default", "batch", "warm");
        let mut stale = warm(&pool, "b");
        stale.bind_to(&older);
        store.create_sandbox(stale).await.unwrap();

        store.create_sandbox(warm(&pool, "c")).await.unwrap();

        assert_eq!(matcher.count_bound_sandboxes(&claim).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_ignores_other_namespaces() {
        let (store, matcher, _) = setup().await;
        let claim = SandboxClaim::new("default", "batch", "warm");
        let other_pool = SandboxPool::new("other", "warm");
        let mut sbx = warm(&other_pool, "a");
        sbx.bind_to(&claim);
        store.create_sandbox(sbx).await.unwrap();

        assert_eq!(matcher.count_bound_sandboxes(&claim).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_available_filters_and_orders() {
        let (store, matcher, pool) = setup().await;

        store.create_sandbox(warm(&pool, "s-3")).await.unwrap();
        store.create_sandbox(warm(&pool, "s-1")).await.unwrap();

        let mut not_ready = warm(&pool, "s-0");
        not_ready.status.pod_ip.clear();
        store.create_sandbox(not_ready).await.unwrap();

        let mut claimed = warm(&pool, "s-2");
        claimed.bind_to(&SandboxClaim::new("default", "x", "warm"));
        store.create_sandbox(claimed).await.unwrap();

        let recreated = SandboxPool::new("default", "warm");
        store.create_sandbox(warm(&recreated, "s-4")).await.unwrap();

        let names: Vec<String> = matcher
            .available_sandboxes(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.metadata.name)
            .collect();
        assert_eq!(names, vec!["s-1", "s-3"]);
    }

    #[tokio::test]
    async fn test_bind_available_stops_at_want() {
        let (store, matcher, pool) = setup().await;
        for name in ["a", "b", "c"] {
            store.create_sandbox(warm(&pool, name)).await.unwrap();
        }
        let claim = SandboxClaim::new("default", "batch", "warm");

        let bound = matcher.bind_available(&claim, &pool, 2).await.unwrap();

        assert_eq!(bound.len(), 2);
        assert!(bound.iter().all(|s| !s.is_pool_controlled()));
        assert_eq!(matcher.count_bound_sandboxes(&claim).await.unwrap(), 2);
        assert_eq!(matcher.available_sandboxes(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bind_nothing_when_want_is_zero() {
        let (store, matcher, pool) = setup().await;
        store.create_sandbox(warm(&pool, "a")).await.unwrap();
        let claim = SandboxClaim::new("default", "batch", "warm");

        assert!(matcher.bind_available(&claim, &pool, 0).await.unwrap().is_empty());
        assert_eq!(matcher.count_bound_sandboxes(&claim).await.unwrap(), 0);
    }
}

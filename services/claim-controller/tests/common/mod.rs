#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use claimd_controller::claim::ClaimControl;
use claimd_controller::model::{
    ClaimStatus, ObjectKey, Sandbox, SandboxClaim, SandboxPhase, SandboxPool, CONDITION_READY,
    LABEL_POOL,
};
use claimd_controller::reconciler::ClaimReconciler;
use claimd_controller::sandbox::SandboxStateCache;
use claimd_controller::store::{
    LabelSelector, MemoryStore, ObjectStore, StoreError, StoreResult, WatchEvent,
};
use claimd_events::MemoryRecorder;
use claimd_id::ResourceVersion;
use claimd_reconcile::{Condition, ConditionStatus, FixedClock};
use tokio::sync::broadcast;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Store wrapper that can be told to fail specific calls.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    fail_sandbox_lists: AtomicBool,
    conflict_status_writes: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_sandbox_lists: AtomicBool::new(false),
            conflict_status_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_sandbox_lists(&self, on: bool) {
        self.fail_sandbox_lists.store(on, Ordering::SeqCst);
    }

    pub fn conflict_status_writes(&self, on: bool) {
        self.conflict_status_writes.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn get_claim(&self, key: &ObjectKey) -> StoreResult<Option<SandboxClaim>> {
        self.inner.get_claim(key).await
    }

    async fn list_claims(&self, namespace: Option<&str>) -> StoreResult<Vec<SandboxClaim>> {
        self.inner.list_claims(namespace).await
    }

    async fn update_claim_status(&self, claim: &SandboxClaim) -> StoreResult<SandboxClaim> {
        if self.conflict_status_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict {
                kind: "SandboxClaim",
                key: claim.key(),
                expected: claim.metadata.resource_version.clone(),
                actual: ResourceVersion::from("999999"),
            });
        }
        self.inner.update_claim_status(claim).await
    }

    async fn delete_claim(&self, key: &ObjectKey) -> StoreResult<()> {
        self.inner.delete_claim(key).await
    }

    async fn get_pool(&self, key: &ObjectKey) -> StoreResult<Option<SandboxPool>> {
        self.inner.get_pool(key).await
    }

    async fn list_sandboxes(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StoreResult<Vec<Sandbox>> {
        if self.fail_sandbox_lists.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("list sandboxes unavailable".to_string()));
        }
        self.inner.list_sandboxes(namespace, selector).await
    }

    async fn update_sandbox(&self, sandbox: &Sandbox) -> StoreResult<Sandbox> {
        self.inner.update_sandbox(sandbox).await
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.watch()
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
}

/// Reconciler wired to an in-memory store, a fixed clock and a memory recorder.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub faults: Arc<FaultyStore>,
    pub recorder: Arc<MemoryRecorder>,
    pub clock: Arc<FixedClock>,
    pub reconciler: ClaimReconciler,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let faults = Arc::new(FaultyStore::new(store.clone()));
        let recorder = Arc::new(MemoryRecorder::default());
        let clock = Arc::new(FixedClock::new(start_time()));
        let cache = Arc::new(SandboxStateCache::new(clock.clone()));
        let control = ClaimControl::new(faults.clone(), cache, recorder.clone(), clock.clone())
            .with_poll_interval(POLL_INTERVAL);
        let reconciler = ClaimReconciler::new(faults.clone(), control, recorder.clone());
        Self {
            store,
            faults,
            recorder,
            clock,
            reconciler,
        }
    }

    pub async fn pool(&self, name: &str) -> SandboxPool {
        self.store
            .create_pool(SandboxPool::new("default", name))
            .await
            .unwrap()
    }

    pub async fn claim(&self, claim: SandboxClaim) -> SandboxClaim {
        self.store.create_claim(claim).await.unwrap()
    }

    /// Creates a claim and forces its status, as if earlier passes had run.
    pub async fn claim_with_status(
        &self,
        claim: SandboxClaim,
        status: ClaimStatus,
    ) -> SandboxClaim {
        let mut stored = self.store.create_claim(claim).await.unwrap();
        stored.status = status;
        self.store.update_claim_status(&stored).await.unwrap()
    }

    pub async fn stored(&self, key: &ObjectKey) -> Option<SandboxClaim> {
        self.store.get_claim(key).await.unwrap()
    }

    pub async fn warm_sandboxes(&self, pool: &SandboxPool, names: &[&str]) {
        for name in names {
            self.store.create_sandbox(warm_sandbox(pool, name)).await.unwrap();
        }
    }
}

/// A ready sandbox controlled by `pool`.
pub fn warm_sandbox(pool: &SandboxPool, name: &str) -> Sandbox {
    let mut sbx = Sandbox::new(&pool.metadata.namespace, name);
    sbx.metadata
        .labels
        .insert(LABEL_POOL.to_string(), pool.metadata.name.clone());
    sbx.metadata.owner_references.push(pool.controller_reference());
    sbx.status.phase = SandboxPhase::Running;
    sbx.status.pod_ip = "10.0.0.1".to_string();
    sbx.status.conditions.push(Condition::new(
        CONDITION_READY,
        ConditionStatus::True,
        "Probe",
        "",
        Utc::now(),
    ));
    sbx
}

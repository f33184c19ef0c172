//! Watch-driven claim worker.
//!
//! Turns store change notifications into claim keys, and runs a fixed number
//! of tasks that pull keys from a [`WorkQueue`] and reconcile them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use claimd_reconcile::{FailureBackoff, RequeueStrategy};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::queue::WorkQueue;
use crate::model::{ObjectKey, Sandbox, LABEL_POOL};
use crate::reconciler::ClaimReconciler;
use crate::sandbox::SandboxStateCache;
use crate::store::{ObjectStore, WatchAction, WatchEvent};

/// Worker tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of parallel reconciliation tasks.
    pub workers: usize,
    /// First retry delay after a failed pass.
    pub backoff_base: Duration,
    /// Retry delay ceiling.
    pub backoff_max: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            backoff_base: claimd_reconcile::DEFAULT_ERROR_BACKOFF_BASE,
            backoff_max: claimd_reconcile::DEFAULT_ERROR_BACKOFF_MAX,
        }
    }
}

pub struct ClaimWorker {
    store: Arc<dyn ObjectStore>,
    reconciler: ClaimReconciler,
    cache: Arc<SandboxStateCache>,
    queue: Arc<WorkQueue>,
    backoff: Mutex<FailureBackoff>,
    workers: usize,
}

impl ClaimWorker {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        reconciler: ClaimReconciler,
        cache: Arc<SandboxStateCache>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            reconciler,
            cache,
            queue: Arc::new(WorkQueue::new()),
            backoff: Mutex::new(FailureBackoff::new(config.backoff_base, config.backoff_max)),
            workers: config.workers.max(1),
        }
    }

    /// Runs until shutdown is signaled.
    #[instrument(skip_all)]
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(workers = self.workers, "Starting claim worker");

        // Subscribe before the initial listing so nothing falls in between.
        let mut events = self.store.watch();
        self.enqueue_all_claims().await;

        let mut tasks = JoinSet::new();
        for id in 0..self.workers {
            let worker = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tasks.spawn(async move { worker.process_loop(id, shutdown).await });
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.route(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "watch lagged, resyncing all claims");
                        self.enqueue_all_claims().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("watch closed");
                        break;
                    }
                },
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                error!(error = %e, "worker task failed");
            }
        }
        info!("Claim worker shut down");
    }

    async fn process_loop(&self, id: usize, mut shutdown: watch::Receiver<bool>) {
        debug!(worker = id, "worker task started");
        loop {
            let key = tokio::select! {
                key = self.queue.next() => match key {
                    Some(key) => key,
                    None => break,
                },
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            self.process(&key).await;
            self.queue.done(&key);
        }
    }

    /// Reconciles one key and schedules its next visit.
    pub async fn process(&self, key: &ObjectKey) {
        let backoff_key = key.to_string();
        match self.reconciler.reconcile(key).await {
            Ok(requeue) => {
                self.lock_backoff().clear(&backoff_key);
                match requeue {
                    RequeueStrategy::None => {}
                    RequeueStrategy::Immediate => self.queue.add(key.clone()),
                    RequeueStrategy::After(delay) => self.queue.add_after(key.clone(), delay),
                }
            }
            Err(e) if e.is_retryable() => {
                let delay = self.lock_backoff().record_failure(&backoff_key);
                if e.is_conflict() {
                    debug!(claim = %key, error = %e, ?delay, "conflict, retrying");
                } else {
                    warn!(claim = %key, error = %e, ?delay, "reconcile failed, retrying");
                }
                self.queue.add_after(key.clone(), delay);
            }
            Err(e) => {
                error!(claim = %key, error = %e, "reconcile failed");
                self.lock_backoff().clear(&backoff_key);
            }
        }
    }

    /// Maps a store change to the claims that need another look.
    pub async fn route(&self, event: WatchEvent) {
        match event {
            WatchEvent::Claim(WatchAction::Deleted, claim) => {
                self.lock_backoff().clear(&claim.key().to_string());
            }
            WatchEvent::Claim(_, claim) => self.queue.add(claim.key()),
            WatchEvent::Sandbox(action, sandbox) => {
                if action == WatchAction::Deleted {
                    self.cache
                        .invalidate(&sandbox.metadata.namespace, &sandbox.metadata.name);
                }
                self.enqueue_for_sandbox(&sandbox).await;
            }
            WatchEvent::Pool(_, pool) => {
                self.enqueue_for_pool(&pool.metadata.namespace, &pool.metadata.name)
                    .await;
            }
        }
    }

    async fn enqueue_for_sandbox(&self, sandbox: &Sandbox) {
        if let Some(claim) = sandbox.claimed_by_name() {
            self.queue.add(ObjectKey::new(&sandbox.metadata.namespace, claim));
            return;
        }
        if let Some(pool) = sandbox.metadata.label(LABEL_POOL) {
            self.enqueue_for_pool(&sandbox.metadata.namespace, pool).await;
        }
    }

    async fn enqueue_for_pool(&self, namespace: &str, pool: &str) {
        match self.store.list_claims(Some(namespace)).await {
            Ok(claims) => claims
                .into_iter()
                .filter(|c| c.spec.pool_name == pool)
                .for_each(|c| self.queue.add(c.key())),
            Err(e) => warn!(namespace, pool, error = %e, "failed to list claims for pool"),
        }
    }

    async fn enqueue_all_claims(&self) {
        match self.store.list_claims(None).await {
            Ok(claims) => {
                debug!(count = claims.len(), "enqueueing all claims");
                for claim in claims {
                    self.queue.add(claim.key());
                }
            }
            Err(e) => error!(error = %e, "failed to list claims"),
        }
    }

    fn lock_backoff(&self) -> std::sync::MutexGuard<'_, FailureBackoff> {
        self.backoff.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::ClaimControl;
    use crate::model::{SandboxClaim, SandboxPool};
    use crate::store::MemoryStore;
    use claimd_events::MemoryRecorder;
    use claimd_id::ResourceVersion;
    use claimd_reconcile::SystemClock;

    fn worker(store: Arc<MemoryStore>) -> ClaimWorker {
        let cache = Arc::new(SandboxStateCache::default());
        let recorder = Arc::new(MemoryRecorder::default());
        let control = ClaimControl::new(
            store.clone(),
            cache.clone(),
            recorder.clone(),
            Arc::new(SystemClock),
        );
        let reconciler = ClaimReconciler::new(store.clone(), control, recorder);
        ClaimWorker::new(store, reconciler, cache, WorkerConfig::default())
    }

    #[tokio::test]
    async fn test_deleted_sandbox_invalidates_and_enqueues_owner() {
        let store = Arc::new(MemoryStore::new());
        let worker = worker(store.clone());
        let claim = SandboxClaim::new("default", "batch", "warm");
        let mut sbx = Sandbox::new("default", "s-1");
        sbx.metadata.resource_version = ResourceVersion::from("4");
        sbx.bind_to(&claim);
        worker.cache.get(&sbx);
        assert_eq!(worker.cache.len(), 1);

        worker
            .route(WatchEvent::Sandbox(WatchAction::Deleted, sbx))
            .await;

        assert!(worker.cache.is_empty());
        assert_eq!(worker.queue.next().await, Some(claim.key()));
    }

    #[tokio::test]
    async fn test_pool_sandbox_enqueues_claims_of_pool() {
        let store = Arc::new(MemoryStore::new());
        let worker = worker(store.clone());
        let pool = SandboxPool::new("default", "warm");
        let wanted = store
            .create_claim(SandboxClaim::new("default", "a", "warm"))
            .await
            .unwrap();
        store
            .create_claim(SandboxClaim::new("default", "b", "cold"))
            .await
            .unwrap();

        let mut sbx = Sandbox::new("default", "s-1");
        sbx.metadata
            .labels
            .insert(LABEL_POOL.to_string(), "warm".to_string());
        sbx.metadata.owner_references.push(pool.controller_reference());
        worker
            .route(WatchEvent::Sandbox(WatchAction::Added, sbx))
            .await;

        assert_eq!(worker.queue.len(), 1);
        assert_eq!(worker.queue.next().await, Some(wanted.key()));
    }

    #[tokio::test]
    async fn test_claim_delete_does_not_enqueue() {
        let store = Arc::new(MemoryStore::new());
        let worker = worker(store);
        let claim = SandboxClaim::new("default", "a", "warm");

        worker
            .route(WatchEvent::Claim(WatchAction::Deleted, claim.clone()))
            .await;
        assert!(worker.queue.is_empty());

        worker
            .route(WatchEvent::Claim(WatchAction::Modified, claim))
            .await;
        assert_eq!(worker.queue.len(), 1);
    }
}

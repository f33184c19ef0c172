mod common;

use std::sync::Arc;
use std::time::Duration;

use claimd_controller::claim::ClaimControl;
use claimd_controller::model::{ClaimPhase, ObjectKey, SandboxClaim, SandboxPool};
use claimd_controller::reconciler::ClaimReconciler;
use claimd_controller::sandbox::SandboxStateCache;
use claimd_controller::scheduler::{ClaimWorker, WorkerConfig};
use claimd_controller::store::{MemoryStore, ObjectStore};
use claimd_events::MemoryRecorder;
use claimd_reconcile::SystemClock;
use common::warm_sandbox;
use tokio::sync::watch;

fn worker(store: Arc<MemoryStore>) -> Arc<ClaimWorker> {
    let clock = Arc::new(SystemClock);
    let recorder = Arc::new(MemoryRecorder::default());
    let cache = Arc::new(SandboxStateCache::new(clock.clone()));
    let control = ClaimControl::new(store.clone(), cache.clone(), recorder.clone(), clock)
        .with_poll_interval(Duration::from_millis(50));
    let reconciler = ClaimReconciler::new(store.clone(), control, recorder);
    Arc::new(ClaimWorker::new(
        store,
        reconciler,
        cache,
        WorkerConfig {
            workers: 2,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(100),
        },
    ))
}

async fn wait_for_phase(store: &MemoryStore, key: &ObjectKey, phase: ClaimPhase) -> SandboxClaim {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(claim) = store.get_claim(key).await.unwrap() {
            if claim.status.phase == phase {
                return claim;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("claim {key} did not reach {phase} in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_worker_drives_claims_to_completion() {
    let store = Arc::new(MemoryStore::new());
    let pool = store
        .create_pool(SandboxPool::new("default", "warm"))
        .await
        .unwrap();
    for name in ["s-1", "s-2"] {
        store.create_sandbox(warm_sandbox(&pool, name)).await.unwrap();
    }
    // Exists before the worker starts: picked up by the initial listing.
    let early = store
        .create_claim(SandboxClaim::new("default", "early", "warm").with_replicas(2))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(worker(store.clone()).run(shutdown_rx));

    let done = wait_for_phase(&store, &early.key(), ClaimPhase::Completed).await;
    assert_eq!(done.status.claimed_replicas, 2);

    // Created while running: picked up from the watch. No sandbox is free
    // until one is added.
    let late = store
        .create_claim(SandboxClaim::new("default", "late", "warm"))
        .await
        .unwrap();
    wait_for_phase(&store, &late.key(), ClaimPhase::Claiming).await;
    store.create_sandbox(warm_sandbox(&pool, "s-3")).await.unwrap();

    let done = wait_for_phase(&store, &late.key(), ClaimPhase::Completed).await;
    assert_eq!(done.status.claimed_replicas, 1);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not shut down")
        .unwrap();
}

#[tokio::test]
async fn test_worker_completes_claims_when_pool_is_deleted() {
    let store = Arc::new(MemoryStore::new());
    let pool = store
        .create_pool(SandboxPool::new("default", "warm"))
        .await
        .unwrap();
    let claim = store
        .create_claim(SandboxClaim::new("default", "batch", "warm").with_replicas(3))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(worker(store.clone()).run(shutdown_rx));

    wait_for_phase(&store, &claim.key(), ClaimPhase::Claiming).await;
    store.delete_pool(&pool.metadata.key()).await.unwrap();

    let done = wait_for_phase(&store, &claim.key(), ClaimPhase::Completed).await;
    assert_eq!(done.status.message, "Pool not found or deleted");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not shut down")
        .unwrap();
}

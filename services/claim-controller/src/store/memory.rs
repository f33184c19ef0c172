//! In-process object store.
//!
//! Backs the standalone controller and the test suite. Semantics mirror a
//! cluster object store closely enough for the controller not to care:
//! - every write assigns a fresh, increasing resource version
//! - spec changes bump `generation`; status writes do not
//! - writes with a stale resource version fail with `Conflict`
//! - every change is broadcast to watchers

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use claimd_id::ResourceVersion;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{LabelSelector, ObjectStore, StoreError, StoreResult, WatchAction, WatchEvent};
use crate::model::{
    ObjectKey, Sandbox, SandboxClaim, SandboxPool, KIND_CLAIM, KIND_POOL, KIND_SANDBOX,
};

const WATCH_BUFFER: usize = 1024;

#[derive(Default)]
struct Objects {
    claims: BTreeMap<ObjectKey, SandboxClaim>,
    pools: BTreeMap<ObjectKey, SandboxPool>,
    sandboxes: BTreeMap<ObjectKey, Sandbox>,
}

/// In-memory [`ObjectStore`].
pub struct MemoryStore {
    objects: RwLock<Objects>,
    version_counter: AtomicU64,
    events: broadcast::Sender<WatchEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_BUFFER);
        Self {
            objects: RwLock::new(Objects::default()),
            version_counter: AtomicU64::new(0),
            events,
        }
    }

    fn next_version(&self) -> ResourceVersion {
        ResourceVersion::from_counter(self.version_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn emit(&self, event: WatchEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    pub async fn create_claim(&self, claim: SandboxClaim) -> StoreResult<SandboxClaim> {
        let key = claim.key();
        let mut objects = self.objects.write().await;
        if objects.claims.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: KIND_CLAIM, key });
        }

        let mut stored = claim;
        stored.metadata.generation = 1;
        stored.metadata.resource_version = self.next_version();
        stored.metadata.creation_timestamp = Some(Utc::now());
        objects.claims.insert(key, stored.clone());
        drop(objects);

        debug!(claim = %stored.key(), "claim created");
        self.emit(WatchEvent::Claim(WatchAction::Added, stored.clone()));
        Ok(stored)
    }

    /// Replaces a claim's `spec`, bumping its generation when it changed.
    pub async fn update_claim_spec(&self, claim: &SandboxClaim) -> StoreResult<SandboxClaim> {
        let key = claim.key();
        let mut objects = self.objects.write().await;
        let current = objects
            .claims
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: KIND_CLAIM,
                key: key.clone(),
            })?;
        check_version(
            KIND_CLAIM,
            &key,
            &claim.metadata.resource_version,
            &current.metadata.resource_version,
        )?;

        if current.spec != claim.spec {
            current.spec = claim.spec.clone();
            current.metadata.generation += 1;
        }
        current.metadata.labels = claim.metadata.labels.clone();
        current.metadata.resource_version = self.next_version();
        let stored = current.clone();
        drop(objects);

        self.emit(WatchEvent::Claim(WatchAction::Modified, stored.clone()));
        Ok(stored)
    }

    pub async fn create_pool(&self, pool: SandboxPool) -> StoreResult<SandboxPool> {
        let key = pool.metadata.key();
        let mut objects = self.objects.write().await;
        if objects.pools.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: KIND_POOL, key });
        }

        let mut stored = pool;
        stored.metadata.generation = 1;
        stored.metadata.resource_version = self.next_version();
        stored.metadata.creation_timestamp = Some(Utc::now());
        objects.pools.insert(key, stored.clone());
        drop(objects);

        self.emit(WatchEvent::Pool(WatchAction::Added, stored.clone()));
        Ok(stored)
    }

    pub async fn delete_pool(&self, key: &ObjectKey) -> StoreResult<()> {
        let removed = self.objects.write().await.pools.remove(key);
        let pool = removed.ok_or_else(|| StoreError::NotFound {
            kind: KIND_POOL,
            key: key.clone(),
        })?;
        self.emit(WatchEvent::Pool(WatchAction::Deleted, pool));
        Ok(())
    }

    pub async fn create_sandbox(&self, sandbox: Sandbox) -> StoreResult<Sandbox> {
        let key = sandbox.metadata.key();
        let mut objects = self.objects.write().await;
        if objects.sandboxes.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: KIND_SANDBOX, key });
        }

        let mut stored = sandbox;
        stored.metadata.generation = 1;
        stored.metadata.resource_version = self.next_version();
        stored.metadata.creation_timestamp = Some(Utc::now());
        objects.sandboxes.insert(key, stored.clone());
        drop(objects);

        self.emit(WatchEvent::Sandbox(WatchAction::Added, stored.clone()));
        Ok(stored)
    }

    pub async fn get_sandbox(&self, key: &ObjectKey) -> StoreResult<Option<Sandbox>> {
        Ok(self.objects.read().await.sandboxes.get(key).cloned())
    }

    /// Writes a sandbox's status, as the sandbox runtime would.
    pub async fn update_sandbox_status(&self, sandbox: &Sandbox) -> StoreResult<Sandbox> {
        let key = sandbox.metadata.key();
        let mut objects = self.objects.write().await;
        let current = objects
            .sandboxes
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: KIND_SANDBOX,
                key: key.clone(),
            })?;
        check_version(
            KIND_SANDBOX,
            &key,
            &sandbox.metadata.resource_version,
            &current.metadata.resource_version,
        )?;

        current.status = sandbox.status.clone();
        current.metadata.resource_version = self.next_version();
        let stored = current.clone();
        drop(objects);

        self.emit(WatchEvent::Sandbox(WatchAction::Modified, stored.clone()));
        Ok(stored)
    }

    pub async fn delete_sandbox(&self, key: &ObjectKey) -> StoreResult<()> {
        let removed = self.objects.write().await.sandboxes.remove(key);
        let sandbox = removed.ok_or_else(|| StoreError::NotFound {
            kind: KIND_SANDBOX,
            key: key.clone(),
        })?;
        self.emit(WatchEvent::Sandbox(WatchAction::Deleted, sandbox));
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn check_version(
    kind: &'static str,
    key: &ObjectKey,
    expected: &ResourceVersion,
    actual: &ResourceVersion,
) -> StoreResult<()> {
    if expected != actual {
        return Err(StoreError::Conflict {
            kind,
            key: key.clone(),
            expected: expected.clone(),
            actual: actual.clone(),
        });
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_claim(&self, key: &ObjectKey) -> StoreResult<Option<SandboxClaim>> {
        Ok(self.objects.read().await.claims.get(key).cloned())
    }

    async fn list_claims(&self, namespace: Option<&str>) -> StoreResult<Vec<SandboxClaim>> {
        let objects = self.objects.read().await;
        Ok(objects
            .claims
            .values()
            .filter(|c| namespace.is_none_or(|ns| c.metadata.namespace == ns))
            .cloned()
            .collect())
    }

    async fn update_claim_status(&self, claim: &SandboxClaim) -> StoreResult<SandboxClaim> {
        let key = claim.key();
        let mut objects = self.objects.write().await;
        let current = objects
            .claims
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: KIND_CLAIM,
                key: key.clone(),
            })?;
        check_version(
            KIND_CLAIM,
            &key,
            &claim.metadata.resource_version,
            &current.metadata.resource_version,
        )?;

        current.status = claim.status.clone();
        current.metadata.resource_version = self.next_version();
        let stored = current.clone();
        drop(objects);

        self.emit(WatchEvent::Claim(WatchAction::Modified, stored.clone()));
        Ok(stored)
    }

    async fn delete_claim(&self, key: &ObjectKey) -> StoreResult<()> {
        let removed = self.objects.write().await.claims.remove(key);
        let claim = removed.ok_or_else(|| StoreError::NotFound {
            kind: KIND_CLAIM,
            key: key.clone(),
        })?;
        self.emit(WatchEvent::Claim(WatchAction::Deleted, claim));
        Ok(())
    }

    async fn get_pool(&self, key: &ObjectKey) -> StoreResult<Option<SandboxPool>> {
        Ok(self.objects.read().await.pools.get(key).cloned())
    }

    async fn list_sandboxes(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StoreResult<Vec<Sandbox>> {
        let objects = self.objects.read().await;
        Ok(objects
            .sandboxes
            .values()
            .filter(|s| {
                s.metadata.namespace == namespace && selector.matches(&s.metadata.labels)
            })
            .cloned()
            .collect())
    }

    async fn update_sandbox(&self, sandbox: &Sandbox) -> StoreResult<Sandbox> {
        let key = sandbox.metadata.key();
        let mut objects = self.objects.write().await;
        let current = objects
            .sandboxes
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: KIND_SANDBOX,
                key: key.clone(),
            })?;
        check_version(
            KIND_SANDBOX,
            &key,
            &sandbox.metadata.resource_version,
            &current.metadata.resource_version,
        )?;

        if current.spec != sandbox.spec {
            current.spec = sandbox.spec.clone();
            current.metadata.generation += 1;
        }
        current.metadata.labels = sandbox.metadata.labels.clone();
        current.metadata.owner_references = sandbox.metadata.owner_references.clone();
        current.metadata.resource_version = self.next_version();
        let stored = current.clone();
        drop(objects);

        self.emit(WatchEvent::Sandbox(WatchAction::Modified, stored.clone()));
        Ok(stored)
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}

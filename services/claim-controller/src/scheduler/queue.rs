//! De-duplicating work queue of claim keys.
//!
//! A key is held at most once in the queue and handed to at most one worker
//! at a time. Adding a key while it is being processed marks it dirty; it is
//! queued again when the worker calls [`WorkQueue::done`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use crate::model::ObjectKey;

#[derive(Default)]
struct QueueState {
    /// Keys waiting to be processed (sent, or parked until `done`).
    dirty: HashSet<ObjectKey>,
    /// Keys currently owned by a worker.
    processing: HashSet<ObjectKey>,
}

pub struct WorkQueue {
    state: Mutex<QueueState>,
    tx: mpsc::UnboundedSender<ObjectKey>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ObjectKey>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(QueueState::default()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues a key unless it is already waiting.
    pub fn add(&self, key: ObjectKey) {
        let mut state = self.lock();
        if !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            trace!(claim = %key, "key busy, parked until done");
            return;
        }
        // The receiver lives as long as the queue.
        let _ = self.tx.send(key);
    }

    /// Queues a key once `delay` has passed.
    pub fn add_after(self: &Arc<Self>, key: ObjectKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Waits for the next key and marks it as being processed.
    pub async fn next(&self) -> Option<ObjectKey> {
        let key = self.rx.lock().await.recv().await?;
        let mut state = self.lock();
        state.dirty.remove(&key);
        state.processing.insert(key.clone());
        Some(key)
    }

    /// Releases a key taken with [`WorkQueue::next`], requeueing it if it was
    /// added again in the meantime.
    pub fn done(&self, key: &ObjectKey) {
        let mut state = self.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            let _ = self.tx.send(key.clone());
        }
    }

    /// Number of keys waiting to be processed.
    pub fn len(&self) -> usize {
        self.lock().dirty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

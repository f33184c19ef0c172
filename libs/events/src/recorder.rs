//! Event recorder implementations.

use std::sync::Mutex;

use chrono::Utc;
use tracing::{info, warn};

use crate::types::{EventType, ObjectRef, RecordedEvent};

/// Sink for progress notices.
pub trait EventRecorder: Send + Sync {
    /// Records an event. Must not block or fail.
    fn record(&self, event: RecordedEvent);

    /// Convenience wrapper that stamps the event with the current time.
    fn event(&self, object: &ObjectRef, event_type: EventType, reason: &str, message: &str) {
        self.record(RecordedEvent {
            object: object.clone(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
            occurred_at: Utc::now(),
        });
    }
}

/// Recorder that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRecorder;

impl EventRecorder for TracingRecorder {
    fn record(&self, event: RecordedEvent) {
        match event.event_type {
            EventType::Normal => info!(
                object = %event.object,
                reason = %event.reason,
                message = %event.message,
                "event"
            ),
            EventType::Warning => warn!(
                object = %event.object,
                reason = %event.reason,
                message = %event.message,
                "event"
            ),
        }
    }
}

/// Recorder that keeps up to `capacity` events in memory.
///
/// Events beyond the capacity are dropped, like a full event channel.
#[derive(Debug)]
pub struct MemoryRecorder {
    capacity: usize,
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemoryRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Reason codes of the recorded events, oldest first.
    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

impl Default for MemoryRecorder {
    fn default() -> Self {
        Self::new(100)
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, event: RecordedEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() < self.capacity {
            events.push(event);
        }
    }
}

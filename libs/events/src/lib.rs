//! # claimd-events
//!
//! Human-readable progress notices attached to stored objects.
//!
//! ## Design Principles
//!
//! - Recording is fire-and-forget: it never fails and never blocks a
//!   reconciliation pass
//! - Delivery is not guaranteed; nothing may depend on an event being seen
//! - Reason codes are stable, CamelCase and unique per situation so they can
//!   be searched for when debugging
//!
//! ## Recorders
//!
//! - [`TracingRecorder`] writes every event to the `tracing` pipeline
//! - [`MemoryRecorder`] keeps a bounded in-memory list, for tests

mod recorder;
mod types;

pub use recorder::{EventRecorder, MemoryRecorder, TracingRecorder};
pub use types::*;

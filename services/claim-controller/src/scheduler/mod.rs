//! Scheduling of reconciliation passes.
//!
//! The worker is responsible for:
//! - Turning store watch events into claim keys
//! - Running reconciliation passes on a pool of tasks, one pass per key at a time
//! - Honouring requeue directives and backing off failed passes

mod queue;
mod worker;

pub use queue::WorkQueue;
pub use worker::{ClaimWorker, WorkerConfig};

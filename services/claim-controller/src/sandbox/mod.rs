//! Sandbox state classification and its shared cache.

mod cache;
mod classify;

pub use cache::SandboxStateCache;
pub use classify::{classify, Classification, SandboxState, StateReason};

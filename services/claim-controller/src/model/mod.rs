//! Stored object model: claims, sandboxes and pools.
//!
//! Shapes follow the usual cluster-object layout: shared [`ObjectMeta`], a
//! user-owned spec and a controller-owned status.

mod claim;
mod meta;
mod pool;
mod sandbox;

pub use claim::*;
pub use meta::*;
pub use pool::*;
pub use sandbox::*;

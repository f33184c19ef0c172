//! Claim lifecycle: phase computation, sandbox matching and the per-phase
//! steps that act on the store.

mod control;
mod matcher;
mod status;

pub use control::ClaimControl;
pub use matcher::{binding_selector, ClaimMatcher};
pub use status::{
    calculate_status, completion_reason, REASON_ALL_REPLICAS_CLAIMED,
    REASON_CLAIM_TIMEOUT_REACHED, REASON_POOL_NOT_FOUND, REASON_TIMEOUT_REACHED,
};

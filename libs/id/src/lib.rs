//! # claimd-id
//!
//! Object identities and version stamps for the claimd controller.
//!
//! ## Design Principles
//!
//! - Every stored object carries a system-generated unique ID that survives
//!   renames and distinguishes a recreated object from its predecessor
//! - IDs are typed per object kind so a claim ID can never be passed where a
//!   sandbox ID is expected
//! - Resource versions are opaque to consumers; only equality matters
//!
//! ## ID Format
//!
//! All object IDs use a prefixed format: `{prefix}_{ulid}`
//!
//! Examples:
//! - `clm_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `sbx_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//! - `pool_01HV4Z4NYPLTRS0JTUA8XDME5F`
//!
//! The string form is what ends up in binding labels, so it must stay stable
//! across releases.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;

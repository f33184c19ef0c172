//! claimd claim controller library.
//!
//! This crate primarily ships a `claim-controller` binary, but exposes its
//! building blocks to enable integration testing and embedding with another
//! object store.

pub mod api;
pub mod claim;
pub mod config;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod sandbox;
pub mod scheduler;
pub mod state;
pub mod store;

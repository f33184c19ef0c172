//! Typed IDs for every stored object kind, plus the resource version stamp.

use crate::define_id;

// =============================================================================
// Object Identities
// =============================================================================

define_id!(
    /// Unique identity of a claim. Recreating a claim under the same name
    /// yields a new `ClaimUid`.
    ClaimUid,
    "clm"
);

define_id!(
    /// Unique identity of a sandbox instance.
    SandboxUid,
    "sbx"
);

define_id!(
    /// Unique identity of a sandbox pool.
    PoolUid,
    "pool"
);

// =============================================================================
// Resource Version
// =============================================================================

/// Opaque version stamp assigned by the object store on every write.
///
/// An empty version marks an object that has never been persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ResourceVersion(String);

impl ResourceVersion {
    /// The version of an object that was never written.
    pub const UNSET: Self = Self(String::new());

    /// Creates a version from a store-assigned write counter.
    #[must_use]
    pub fn from_counter(counter: u64) -> Self {
        Self(counter.to_string())
    }

    /// Returns true if the object was never persisted.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResourceVersion {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceVersion {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Object metadata shared by every stored kind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use claimd_id::ResourceVersion;
use serde::{Deserialize, Serialize};

/// API group version of all claimd kinds.
pub const API_VERSION: &str = "agents.claimd.dev/v1alpha1";

pub const KIND_CLAIM: &str = "SandboxClaim";
pub const KIND_POOL: &str = "SandboxPool";
pub const KIND_SANDBOX: &str = "Sandbox";

/// Label carrying the unique ID of the claim a sandbox is bound to.
pub const LABEL_CLAIMED_BY: &str = "agents.claimd.dev/claimed-by";

/// Label carrying the name of the claim a sandbox is bound to.
pub const LABEL_CLAIMED_BY_NAME: &str = "agents.claimd.dev/claimed-by-name";

/// Label carrying the name of the pool a sandbox was created for.
pub const LABEL_POOL: &str = "agents.claimd.dev/pool";

/// Namespace + name of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Reference from an object to the object that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,

    /// True for the single managing controller of the object.
    #[serde(default)]
    pub controller: bool,
}

/// Metadata common to all stored objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta<U> {
    pub namespace: String,
    pub name: String,
    pub uid: U,

    /// Spec version counter, bumped by the store on spec changes.
    #[serde(default)]
    pub generation: i64,

    /// Store-assigned write stamp; empty until first persisted.
    #[serde(default)]
    pub resource_version: ResourceVersion,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Set once deletion has been requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl<U> ObjectMeta<U> {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, uid: U) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid,
            generation: 0,
            resource_version: ResourceVersion::UNSET,
            labels: BTreeMap::new(),
            owner_references: Vec::new(),
            creation_timestamp: None,
            deletion_timestamp: None,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// The managing controller, if any.
    pub fn controller(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }
}

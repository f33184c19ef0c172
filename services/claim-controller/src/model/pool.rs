//! Sandbox pools.
//!
//! The claim controller only cares whether a pool exists and which sandboxes
//! it controls; everything else about a pool belongs to the pool controller.

use claimd_id::PoolUid;
use serde::{Deserialize, Serialize};

use super::meta::{ObjectMeta, OwnerReference, API_VERSION, KIND_POOL};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxPool {
    pub metadata: ObjectMeta<PoolUid>,

    #[serde(default)]
    pub spec: PoolSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    /// Number of warm sandboxes the pool controller keeps around.
    #[serde(default)]
    pub replicas: i32,
}

impl SandboxPool {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name, PoolUid::new()),
            spec: PoolSpec::default(),
        }
    }

    /// Owner reference marking a sandbox as controlled by this pool.
    pub fn controller_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: API_VERSION.to_string(),
            kind: KIND_POOL.to_string(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.to_string(),
            controller: true,
        }
    }
}

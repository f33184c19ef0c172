//! Admission check for claim writes.
//!
//! The replica count of a claim is fixed once the claim exists; the
//! controller counts against it and never rewrites it. Updates that change
//! the effective count (unset counts as one) are denied.

use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::error::ApiError;
use crate::model::SandboxClaim;
use crate::state::AppState;

/// Why a claim write was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("spec.replicas is immutable, cannot change from {old} to {new}")]
    ReplicasImmutable { old: i32, new: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub operation: Operation,

    #[serde(default)]
    pub object: Option<SandboxClaim>,

    #[serde(default)]
    pub old_object: Option<SandboxClaim>,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResponse {
    pub allowed: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl AdmissionResponse {
    fn allowed() -> Self {
        Self {
            allowed: true,
            message: String::new(),
        }
    }

    fn denied(err: &AdmissionError) -> Self {
        Self {
            allowed: false,
            message: err.to_string(),
        }
    }
}

/// Checks an update of `old` into `new`.
pub fn validate_claim_update(old: &SandboxClaim, new: &SandboxClaim) -> Result<(), AdmissionError> {
    let (old, new) = (old.desired_replicas(), new.desired_replicas());
    if old != new {
        return Err(AdmissionError::ReplicasImmutable { old, new });
    }
    Ok(())
}

/// Decides an admission request.
pub fn review(request: &AdmissionRequest) -> Result<AdmissionResponse, ApiError> {
    match request.operation {
        Operation::Create | Operation::Delete => Ok(AdmissionResponse::allowed()),
        Operation::Update => {
            let (Some(old), Some(new)) = (&request.old_object, &request.object) else {
                return Err(ApiError::bad_request(
                    "missing_object",
                    "update requires both object and oldObject",
                ));
            };
            debug!(claim = %new.key(), "validating claim update");
            match validate_claim_update(old, new) {
                Ok(()) => Ok(AdmissionResponse::allowed()),
                Err(e) => {
                    info!(claim = %new.key(), reason = %e, "rejecting claim update");
                    Ok(AdmissionResponse::denied(&e))
                }
            }
        }
        Operation::Connect => Err(ApiError::bad_request(
            "unsupported_operation",
            "unsupported operation: CONNECT",
        )),
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/validate-claim", post(validate_claim))
}

async fn validate_claim(
    Json(request): Json<AdmissionRequest>,
) -> Result<Json<AdmissionResponse>, ApiError> {
    review(&request).map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn claim(replicas: Option<i32>) -> SandboxClaim {
        let mut c = SandboxClaim::new("default", "batch", "warm");
        c.spec.replicas = replicas;
        c
    }

    #[rstest]
    #[case::unchanged(Some(3), Some(3), true)]
    #[case::unset_to_one(None, Some(1), true)]
    #[case::grow(Some(3), Some(4), false)]
    #[case::unset_to_two(None, Some(2), false)]
    #[case::cleared(Some(5), None, false)]
    fn test_replicas_immutable(
        #[case] old: Option<i32>,
        #[case] new: Option<i32>,
        #[case] allowed: bool,
    ) {
        let result = validate_claim_update(&claim(old), &claim(new));
        assert_eq!(result.is_ok(), allowed);
    }

    #[test]
    fn test_denial_message() {
        let err = validate_claim_update(&claim(Some(3)), &claim(Some(4))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "spec.replicas is immutable, cannot change from 3 to 4"
        );
    }

    #[test]
    fn test_create_and_delete_always_allowed() {
        for operation in [Operation::Create, Operation::Delete] {
            let request = AdmissionRequest {
                operation,
                object: Some(claim(Some(100))),
                old_object: None,
            };
            assert!(review(&request).unwrap().allowed);
        }
    }

    #[test]
    fn test_update_without_old_object_is_bad_request() {
        let request = AdmissionRequest {
            operation: Operation::Update,
            object: Some(claim(None)),
            old_object: None,
        };
        let err = review(&request).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_connect_is_rejected() {
        let request = AdmissionRequest {
            operation: Operation::Connect,
            object: None,
            old_object: None,
        };
        assert!(review(&request).is_err());
    }
}

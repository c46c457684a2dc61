//! # Custom Resource Definitions
//!
//! CRD types for the MinIO operator.
//!
//! This module contains the three resource kinds the operator drives toward
//! their declared state (Bucket, Policy and User), the status they share, and
//! the [`ManagedResource`] trait the reconciliation engine is written against.

mod bucket;
mod policy;
mod status;
mod user;

pub use bucket::{Bucket, BucketSpec, BUCKET_NAME_PATTERN};
pub use policy::{Policy, PolicySpec};
pub use status::{ResourceState, ResourceStatus};
pub use user::{AccountStatus, User, UserSpec};

use kube::core::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// API group shared by all resources and finalizers
pub const API_GROUP: &str = "minio.scc-digitalhub.github.io";

/// Spec failed local validation before any remote call was attempted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid spec: {0}")]
pub struct ValidationError(pub String);

/// Common view over the Bucket, Policy and User resources
pub trait ManagedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + std::fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Finalizer token owned by this kind's reconciler
    const FINALIZER: &'static str;

    fn resource_status(&self) -> Option<&ResourceStatus>;

    fn resource_status_mut(&mut self) -> &mut Option<ResourceStatus>;

    /// Local checks that do not need the remote service
    fn validate(&self) -> Result<(), ValidationError>;

    fn state(&self) -> ResourceState {
        self.resource_status()
            .map(ResourceStatus::state)
            .unwrap_or(ResourceState::Unset)
    }

    fn message(&self) -> Option<&str> {
        self.resource_status().and_then(|s| s.message.as_deref())
    }

    fn failed_step(&self) -> Option<&str> {
        self.resource_status().and_then(|s| s.failed_step.as_deref())
    }

    fn has_finalizer(&self) -> bool {
        self.meta()
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == Self::FINALIZER))
    }

    fn deletion_requested(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }
}

impl ManagedResource for Bucket {
    const FINALIZER: &'static str = "minio.scc-digitalhub.github.io/bucket-finalizer";

    fn resource_status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }

    fn resource_status_mut(&mut self) -> &mut Option<ResourceStatus> {
        &mut self.status
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.spec.validate()
    }
}

impl ManagedResource for Policy {
    const FINALIZER: &'static str = "minio.scc-digitalhub.github.io/policy-finalizer";

    fn resource_status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }

    fn resource_status_mut(&mut self) -> &mut Option<ResourceStatus> {
        &mut self.status
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.spec.validate()
    }
}

impl ManagedResource for User {
    const FINALIZER: &'static str = "minio.scc-digitalhub.github.io/user-finalizer";

    fn resource_status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }

    fn resource_status_mut(&mut self) -> &mut Option<ResourceStatus> {
        &mut self.status
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.spec.validate()
    }
}

//! # Remote Providers
//!
//! Clients for the two planes of the MinIO server the operator drives.
//!
//! - [`ObjectStorage`]: bucket and object operations over the S3 API
//! - [`AdminApi`]: quota, canned policy and user operations over the admin REST API
//! - [`RemoteClients`]: the shared, lazily built handles the reconcilers receive
//!
//! The reconcilers only ever see these traits, so tests substitute in-memory
//! fakes without touching process-global state.

mod error;
pub mod minio;

pub use error::RemoteError;
pub use minio::MinioClientProvider;

use crate::crd::AccountStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Data plane: buckets and objects
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, RemoteError>;

    /// Create a bucket; an existing bucket yields [`RemoteError::AlreadyExists`]
    async fn make_bucket(&self, bucket: &str) -> Result<(), RemoteError>;

    /// Remove an empty bucket
    ///
    /// Yields [`RemoteError::NotFound`] for a missing bucket and
    /// [`RemoteError::BucketNotEmpty`] while objects remain.
    async fn remove_bucket(&self, bucket: &str) -> Result<(), RemoteError>;

    /// Every object version and delete marker in the bucket
    async fn list_object_versions(&self, bucket: &str) -> Result<Vec<ObjectVersion>, RemoteError>;

    /// Delete the given versions, returning how many were removed
    async fn remove_objects(
        &self,
        bucket: &str,
        objects: &[ObjectVersion],
        bypass_governance: bool,
    ) -> Result<usize, RemoteError>;
}

/// Control plane: quotas, canned policies and users
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Current quota; a bucket without quota reports zero
    async fn get_bucket_quota(&self, bucket: &str) -> Result<BucketQuota, RemoteError>;

    async fn set_bucket_quota(&self, bucket: &str, quota: &BucketQuota) -> Result<(), RemoteError>;

    async fn add_canned_policy(&self, name: &str, policy: &[u8]) -> Result<(), RemoteError>;

    async fn info_canned_policy(&self, name: &str) -> Result<PolicyInfo, RemoteError>;

    async fn remove_canned_policy(&self, name: &str) -> Result<(), RemoteError>;

    /// Create or update a user (upsert)
    async fn set_user(
        &self,
        access_key: &str,
        secret_key: &str,
        status: AccountStatus,
    ) -> Result<(), RemoteError>;

    async fn get_user_info(&self, access_key: &str) -> Result<UserInfo, RemoteError>;

    async fn remove_user(&self, access_key: &str) -> Result<(), RemoteError>;

    /// Attach policies; [`RemoteError::NoNetEffect`] when all were already attached
    async fn attach_policy(&self, req: &PolicyAssociation) -> Result<(), RemoteError>;

    /// Detach policies; [`RemoteError::NoNetEffect`] when none were attached
    async fn detach_policy(&self, req: &PolicyAssociation) -> Result<(), RemoteError>;
}

/// Shared access to both clients plus the deletion drain setting
#[async_trait]
pub trait RemoteClients: Send + Sync {
    async fn storage(&self) -> Result<Arc<dyn ObjectStorage>, RemoteError>;

    async fn admin(&self) -> Result<Arc<dyn AdminApi>, RemoteError>;

    /// Whether non-empty buckets are purged before removal on deletion
    fn drain_on_delete(&self) -> Result<bool, RemoteError>;
}

/// Bucket quota as exchanged with the admin API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketQuota {
    /// Legacy limit field, still honoured by older servers
    #[serde(default)]
    pub quota: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default, rename = "quotatype", skip_serializing_if = "Option::is_none")]
    pub quota_type: Option<String>,
}

impl BucketQuota {
    pub fn hard(bytes: u64) -> Self {
        Self {
            quota: bytes,
            size: bytes,
            quota_type: Some("hard".to_string()),
        }
    }

    /// Effective limit in bytes, 0 means unlimited
    pub fn limit(&self) -> u64 {
        if self.size > 0 {
            self.size
        } else {
            self.quota
        }
    }
}

/// Canned policy as returned by `info-canned-policy` (v2 format)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PolicyInfo {
    #[serde(rename = "PolicyName", default)]
    pub policy_name: String,
    #[serde(rename = "Policy")]
    pub policy: serde_json::Value,
}

/// Subset of `user-info` the reconcilers use
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Comma separated list of attached policies
    #[serde(default)]
    pub policy_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub member_of: Vec<String>,
}

/// One object version or delete marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: Option<String>,
}

/// Body of the builtin IDP policy attach/detach calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAssociation {
    pub policies: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
}

impl PolicyAssociation {
    pub fn for_user(user: &str, policies: Vec<String>) -> Self {
        Self {
            policies,
            user: user.to_string(),
        }
    }
}

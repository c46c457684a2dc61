//! # Bucket
//!
//! Desired state of a MinIO bucket and its hard quota.

use super::{ResourceStatus, ValidationError};
use kube::CustomResource;
use regex::Regex;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Allowed bucket names (S3 naming rules as enforced by MinIO)
pub const BUCKET_NAME_PATTERN: &str = r"^[a-z0-9]([a-z0-9.-]){1,61}[a-z0-9]$";

static BUCKET_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(BUCKET_NAME_PATTERN).expect("BUCKET_NAME_PATTERN is a valid regex")
});

/// Bucket Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: minio.scc-digitalhub.github.io/v1
/// kind: Bucket
/// metadata:
///   name: analytics
/// spec:
///   name: analytics-data
///   quota: 10000000
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Bucket",
    group = "minio.scc-digitalhub.github.io",
    version = "v1",
    namespaced,
    status = "ResourceStatus",
    shortname = "mbk",
    printcolumn = r#"{"name":"Bucket", "type":"string", "jsonPath":".spec.name"}, {"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"Message", "type":"string", "jsonPath":".status.message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    /// Bucket name on the MinIO server
    #[schemars(schema_with = "bucket_name_schema")]
    pub name: String,
    /// Hard quota in bytes, 0 means no quota
    #[serde(default)]
    pub quota: u64,
}

impl BucketSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if BUCKET_NAME_REGEX.is_match(&self.name) {
            Ok(())
        } else {
            Err(ValidationError(format!(
                "bucket name '{}' does not match {BUCKET_NAME_PATTERN}",
                self.name
            )))
        }
    }
}

fn bucket_name_schema(_gen: &mut SchemaGenerator) -> Schema {
    let schema_value = serde_json::json!({
        "type": "string",
        "pattern": BUCKET_NAME_PATTERN,
        "description": "Bucket name on the MinIO server"
    });
    Schema::try_from(schema_value).expect("Failed to create Schema for bucket name")
}

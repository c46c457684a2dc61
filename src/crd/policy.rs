//! # Policy
//!
//! A named canned policy document stored on the MinIO server.

use super::{ResourceStatus, ValidationError};
use kube::CustomResource;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

/// Policy Custom Resource Definition
///
/// `content` is rewritten by the operator to the server's canonical form
/// after every successful write, so later drift checks compare like for like.
///
/// # Example
///
/// ```yaml
/// apiVersion: minio.scc-digitalhub.github.io/v1
/// kind: Policy
/// metadata:
///   name: readonly-analytics
/// spec:
///   name: readonly-analytics
///   content: |
///     {"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["s3:GetObject"],"Resource":["arn:aws:s3:::analytics-data/*"]}]}
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Policy",
    group = "minio.scc-digitalhub.github.io",
    version = "v1",
    namespaced,
    status = "ResourceStatus",
    shortname = "mpol",
    printcolumn = r#"{"name":"Policy", "type":"string", "jsonPath":".spec.name"}, {"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"Message", "type":"string", "jsonPath":".status.message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    /// Canned policy name
    #[schemars(schema_with = "policy_name_schema")]
    pub name: String,
    /// Policy document as a JSON string
    pub content: String,
}

impl PolicySpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(ValidationError(format!(
                "policy name '{}' must be non-empty and contain no whitespace",
                self.name
            )));
        }
        serde_json::from_str::<serde_json::Value>(&self.content)
            .map(|_| ())
            .map_err(|e| ValidationError(format!("policy content is not valid JSON: {e}")))
    }
}

fn policy_name_schema(_gen: &mut SchemaGenerator) -> Schema {
    let schema_value = serde_json::json!({
        "type": "string",
        "pattern": r"^[^\s]+$",
        "description": "Canned policy name"
    });
    Schema::try_from(schema_value).expect("Failed to create Schema for policy name")
}

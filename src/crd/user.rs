//! # User
//!
//! A MinIO user account, its credentials and attached canned policies.

use super::{ResourceStatus, ValidationError};
use kube::CustomResource;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// User Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: minio.scc-digitalhub.github.io/v1
/// kind: User
/// metadata:
///   name: analyst
/// spec:
///   accessKey: analyst
///   secretKey: analyst-secret-key
///   accountStatus: enabled
///   policies:
///     - readonly
///     - diagnostics
/// ```
#[derive(CustomResource, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "User",
    group = "minio.scc-digitalhub.github.io",
    version = "v1",
    namespaced,
    status = "ResourceStatus",
    shortname = "musr",
    printcolumn = r#"{"name":"AccessKey", "type":"string", "jsonPath":".spec.accessKey"}, {"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"Message", "type":"string", "jsonPath":".status.message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    pub access_key: String,
    pub secret_key: String,
    /// Canned policies attached to the user, empty entries are ignored
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    #[serde(default)]
    pub account_status: AccountStatus,
}

impl UserSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.access_key.is_empty() {
            return Err(ValidationError("accessKey must not be empty".to_string()));
        }
        if self.secret_key.is_empty() {
            return Err(ValidationError("secretKey must not be empty".to_string()));
        }
        Ok(())
    }

    /// Policy names with empty entries removed
    pub fn desired_policies(&self) -> Vec<String> {
        self.policies
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect()
    }
}

// Secret key never reaches the logs
impl std::fmt::Debug for UserSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSpec")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("policies", &self.policies)
            .field("account_status", &self.account_status)
            .finish()
    }
}

/// Account status of a MinIO user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Enabled,
    Disabled,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Enabled => "enabled",
            AccountStatus::Disabled => "disabled",
        }
    }

    pub fn is_enabled(self) -> bool {
        self == AccountStatus::Enabled
    }
}

impl JsonSchema for AccountStatus {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("AccountStatus")
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let schema_value = serde_json::json!({
            "type": "string",
            "enum": ["enabled", "disabled"],
            "default": "enabled",
            "description": "Account status of the MinIO user. Policies are only reconciled while enabled."
        });
        Schema::try_from(schema_value).expect("Failed to create Schema for AccountStatus")
    }
}

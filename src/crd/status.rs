//! # Resource Status
//!
//! Status shared by the Bucket, Policy and User resources.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed resource
///
/// An absent state means the resource has never been reconciled (`Unset`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum ResourceState {
    Unset,
    Creating,
    Ready,
    Updating,
    Degraded,
    Error,
}

impl ResourceState {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceState::Unset => "Unset",
            ResourceState::Creating => "Creating",
            ResourceState::Ready => "Ready",
            ResourceState::Updating => "Updating",
            ResourceState::Degraded => "Degraded",
            ResourceState::Error => "Error",
        }
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed status written back by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Current lifecycle state
    /// Values: Creating, Ready, Updating, Degraded, Error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    /// Failure description, only present while the state is Error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Reconcile step that failed, only present while the state is Error
    /// Values: create, observe, apply, remove
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
}

impl ResourceStatus {
    pub fn new(state: ResourceState, message: Option<String>) -> Self {
        Self {
            state: Some(state),
            message,
            failed_step: None,
        }
    }

    pub fn state(&self) -> ResourceState {
        self.state.unwrap_or(ResourceState::Unset)
    }
}

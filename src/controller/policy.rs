//! # Policy Reconciler
//!
//! Keeps a canned policy on the server equal to `spec.content`.
//!
//! The server may reformat a submitted document, so after every write the
//! stored form is read back and, when it differs, written into `spec.content`.
//! Drift checks then compare like for like.

use super::drift::{canonical_value, policies_equivalent};
use super::engine::{EngineContext, ManagedKind, Observation, SpecUpdate, SpecWriteBack};
use crate::crd::Policy;
use crate::provider::{AdminApi, RemoteError};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

#[async_trait]
impl ManagedKind for Policy {
    const KIND: &'static str = "Policy";

    async fn create(&self, ctx: &EngineContext<Self>) -> Result<SpecWriteBack, RemoteError> {
        let admin = ctx.remotes.admin().await?;
        submit(admin.as_ref(), self).await
    }

    async fn observe(&self, ctx: &EngineContext<Self>) -> Result<Observation, RemoteError> {
        let admin = ctx.remotes.admin().await?;
        let info = match admin.info_canned_policy(&self.spec.name).await {
            Ok(info) => info,
            Err(e) if e.is_not_found() => {
                return Ok(Observation::Drifted(format!(
                    "policy '{}' is missing",
                    self.spec.name
                )))
            }
            Err(e) => return Err(e),
        };
        let equal = policies_equivalent(&self.spec.content, &info.policy)
            .map_err(|e| RemoteError::InvalidResponse(format!("policy content: {e}")))?;
        if equal {
            Ok(Observation::InSync)
        } else {
            Ok(Observation::Drifted("policy document differs".to_string()))
        }
    }

    async fn apply(&self, ctx: &EngineContext<Self>) -> Result<SpecWriteBack, RemoteError> {
        let admin = ctx.remotes.admin().await?;
        submit(admin.as_ref(), self).await
    }

    async fn remove(&self, ctx: &EngineContext<Self>) -> Result<(), RemoteError> {
        let admin = ctx.remotes.admin().await?;
        admin.remove_canned_policy(&self.spec.name).await
    }
}

/// Store the document, then return the canonical server form if it differs
async fn submit(admin: &dyn AdminApi, policy: &Policy) -> Result<SpecWriteBack, RemoteError> {
    let name = &policy.spec.name;
    admin
        .add_canned_policy(name, policy.spec.content.as_bytes())
        .await?;
    info!(policy = %name, "Stored canned policy");

    let stored = admin.info_canned_policy(name).await?;
    let canonical = canonical_value(&stored.policy);
    if canonical == policy.spec.content {
        Ok(None)
    } else {
        Ok(Some(SpecUpdate {
            submitted: json!({ "content": policy.spec.content }),
            fields: json!({ "content": canonical }),
        }))
    }
}

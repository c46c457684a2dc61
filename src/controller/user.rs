//! # User Reconciler
//!
//! Users are upserted on every pass: the server cannot tell whether a secret
//! key changed without receiving it again. Attached policies converge on the
//! spec through a symmetric difference, only while the account is enabled.

use super::drift::{parse_policy_list, policy_diff};
use super::engine::{EngineContext, ManagedKind, Observation, SpecWriteBack};
use crate::crd::User;
use crate::provider::{AdminApi, PolicyAssociation, RemoteError};
use async_trait::async_trait;
use tracing::{debug, info};

#[async_trait]
impl ManagedKind for User {
    const KIND: &'static str = "User";

    async fn create(&self, ctx: &EngineContext<Self>) -> Result<SpecWriteBack, RemoteError> {
        let admin = ctx.remotes.admin().await?;
        upsert(admin.as_ref(), self).await?;
        Ok(None)
    }

    async fn finish_create(&self, ctx: &EngineContext<Self>) -> Result<(), RemoteError> {
        let desired = self.spec.desired_policies();
        if !self.spec.account_status.is_enabled() || desired.is_empty() {
            return Ok(());
        }
        let admin = ctx.remotes.admin().await?;
        attach(admin.as_ref(), &self.spec.access_key, desired).await
    }

    /// Convergence rather than a read-only check, the user stays Ready
    async fn observe(&self, ctx: &EngineContext<Self>) -> Result<Observation, RemoteError> {
        let admin = ctx.remotes.admin().await?;
        converge(admin.as_ref(), self).await?;
        Ok(Observation::InSync)
    }

    async fn apply(&self, ctx: &EngineContext<Self>) -> Result<SpecWriteBack, RemoteError> {
        let admin = ctx.remotes.admin().await?;
        converge(admin.as_ref(), self).await?;
        Ok(None)
    }

    async fn remove(&self, ctx: &EngineContext<Self>) -> Result<(), RemoteError> {
        let admin = ctx.remotes.admin().await?;
        admin.remove_user(&self.spec.access_key).await
    }
}

async fn upsert(admin: &dyn AdminApi, user: &User) -> Result<(), RemoteError> {
    admin
        .set_user(
            &user.spec.access_key,
            &user.spec.secret_key,
            user.spec.account_status,
        )
        .await
}

async fn converge(admin: &dyn AdminApi, user: &User) -> Result<(), RemoteError> {
    let access_key = &user.spec.access_key;
    upsert(admin, user).await?;

    let info = admin.get_user_info(access_key).await?;
    let attached = parse_policy_list(&info.policy_name);
    let diff = policy_diff(&user.spec.desired_policies(), &attached);

    if !user.spec.account_status.is_enabled() {
        debug!(user = %access_key, "Account disabled, leaving policies untouched");
        return Ok(());
    }
    if diff.is_empty() {
        return Ok(());
    }

    info!(
        user = %access_key,
        detach = ?diff.to_detach,
        attach = ?diff.to_attach,
        "Converging attached policies"
    );
    if !diff.to_detach.is_empty() {
        let req = PolicyAssociation::for_user(access_key, diff.to_detach);
        tolerate_no_net_effect(admin.detach_policy(&req).await)?;
    }
    if !diff.to_attach.is_empty() {
        attach(admin, access_key, diff.to_attach).await?;
    }
    Ok(())
}

async fn attach(admin: &dyn AdminApi, access_key: &str, policies: Vec<String>) -> Result<(), RemoteError> {
    let req = PolicyAssociation::for_user(access_key, policies);
    tolerate_no_net_effect(admin.attach_policy(&req).await)
}

fn tolerate_no_net_effect(result: Result<(), RemoteError>) -> Result<(), RemoteError> {
    match result {
        Err(e) if e.is_no_net_effect() => {
            debug!(error = %e, "Policy change already in effect");
            Ok(())
        }
        other => other,
    }
}

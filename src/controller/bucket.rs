//! # Bucket Reconciler
//!
//! Creates buckets, keeps their hard quota in line with `spec.quota` and removes
//! them on deletion, optionally draining remaining objects first.

use super::drift::quota_drifted;
use super::engine::{EngineContext, ManagedKind, Observation, SpecWriteBack};
use crate::crd::Bucket;
use crate::observability::metrics;
use crate::provider::{AdminApi, BucketQuota, ObjectStorage, RemoteError};
use async_trait::async_trait;
use tracing::{debug, info, warn};

#[async_trait]
impl ManagedKind for Bucket {
    const KIND: &'static str = "Bucket";

    async fn create(&self, ctx: &EngineContext<Self>) -> Result<SpecWriteBack, RemoteError> {
        let storage = ctx.remotes.storage().await?;
        ensure_bucket(storage.as_ref(), &self.spec.name).await?;
        if self.spec.quota > 0 {
            let admin = ctx.remotes.admin().await?;
            set_quota(admin.as_ref(), &self.spec.name, self.spec.quota).await?;
        }
        Ok(None)
    }

    async fn observe(&self, ctx: &EngineContext<Self>) -> Result<Observation, RemoteError> {
        let admin = ctx.remotes.admin().await?;
        match admin.get_bucket_quota(&self.spec.name).await {
            Ok(quota) if quota_drifted(self.spec.quota, &quota) => Ok(Observation::Drifted(format!(
                "quota is {} bytes, want {}",
                quota.limit(),
                self.spec.quota
            ))),
            Ok(_) => Ok(Observation::InSync),
            Err(e) if e.is_not_found() => Ok(Observation::Drifted(format!(
                "bucket '{}' is missing",
                self.spec.name
            ))),
            Err(e) => Err(e),
        }
    }

    async fn apply(&self, ctx: &EngineContext<Self>) -> Result<SpecWriteBack, RemoteError> {
        let storage = ctx.remotes.storage().await?;
        ensure_bucket(storage.as_ref(), &self.spec.name).await?;
        let admin = ctx.remotes.admin().await?;
        set_quota(admin.as_ref(), &self.spec.name, self.spec.quota).await?;
        Ok(None)
    }

    async fn remove(&self, ctx: &EngineContext<Self>) -> Result<(), RemoteError> {
        let storage = ctx.remotes.storage().await?;
        let drain = ctx.remotes.drain_on_delete()?;
        drain_and_remove(
            storage.as_ref(),
            &self.spec.name,
            drain,
            ctx.settings.max_drain_rounds,
        )
        .await
    }
}

/// Create `bucket` unless it already exists
async fn ensure_bucket(storage: &dyn ObjectStorage, bucket: &str) -> Result<(), RemoteError> {
    if storage.bucket_exists(bucket).await? {
        debug!(bucket, "Bucket already exists");
        return Ok(());
    }
    match storage.make_bucket(bucket).await {
        Ok(()) => {
            info!(bucket, "Created bucket");
            Ok(())
        }
        Err(e) if e.is_already_exists() => Ok(()),
        Err(e) => Err(e),
    }
}

async fn set_quota(admin: &dyn AdminApi, bucket: &str, quota: u64) -> Result<(), RemoteError> {
    admin
        .set_bucket_quota(bucket, &BucketQuota::hard(quota))
        .await?;
    info!(bucket, quota, "Applied hard quota");
    Ok(())
}

/// Remove `bucket`, purging its objects first when `drain` is enabled
///
/// With `drain` disabled a non-empty bucket is an error, which keeps the
/// finalizer in place until the bucket is emptied by hand. Objects that keep
/// reappearing end the loop after `max_rounds` purges.
pub async fn drain_and_remove(
    storage: &dyn ObjectStorage,
    bucket: &str,
    drain: bool,
    max_rounds: u32,
) -> Result<(), RemoteError> {
    let mut purges = 0;
    loop {
        match storage.remove_bucket(bucket).await {
            Ok(()) => {
                info!(bucket, purges, "Removed bucket");
                return Ok(());
            }
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) if e.is_bucket_not_empty() && drain => {
                if purges >= max_rounds {
                    return Err(RemoteError::DrainExceeded {
                        bucket: bucket.to_string(),
                        rounds: purges,
                    });
                }
                let objects = storage.list_object_versions(bucket).await?;
                warn!(bucket, count = objects.len(), round = purges + 1, "Purging bucket contents");
                let removed = storage.remove_objects(bucket, &objects, true).await?;
                metrics::increment_bucket_drain_objects(removed);
                purges += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

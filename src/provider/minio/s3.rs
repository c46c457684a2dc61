//! # S3 Storage
//!
//! Bucket and object operations against MinIO through the S3 API.

use crate::config::MinioConfig;
use crate::constants::{CONTROLLER_NAME, DELETE_OBJECTS_BATCH_SIZE};
use crate::provider::{ObjectStorage, ObjectVersion, RemoteError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use tracing::debug;

/// S3 data plane client
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    /// Build a path-style client with static credentials
    ///
    /// MinIO ignores the region for routing, it only takes part in signing.
    pub fn new(config: &MinioConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            CONTROLLER_NAME,
        );
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint_url())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

/// Map an SDK failure on `bucket` onto the remote error taxonomy
fn map_sdk_error<E>(err: SdkError<E>, bucket: &str) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    match err.code() {
        Some("NoSuchBucket") => RemoteError::not_found("bucket", bucket),
        Some("BucketNotEmpty") => RemoteError::BucketNotEmpty(bucket.to_string()),
        Some("BucketAlreadyOwnedByYou" | "BucketAlreadyExists") => {
            RemoteError::already_exists("bucket", bucket)
        }
        Some(code) => RemoteError::Api {
            status: status.unwrap_or_default(),
            code: code.to_string(),
            message: err.message().unwrap_or_default().to_string(),
        },
        None => match &err {
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
                RemoteError::Transport(DisplayErrorContext(&err).to_string())
            }
            _ if status == Some(404) => RemoteError::not_found("bucket", bucket),
            _ => RemoteError::InvalidResponse(DisplayErrorContext(&err).to_string()),
        },
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, RemoteError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => match map_sdk_error(err, bucket) {
                RemoteError::NotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), RemoteError> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(e, bucket))
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), RemoteError> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(e, bucket))
    }

    async fn list_object_versions(&self, bucket: &str) -> Result<Vec<ObjectVersion>, RemoteError> {
        let mut objects = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_id_marker.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, bucket))?;

            objects.extend(response.versions().iter().filter_map(|v| {
                Some(ObjectVersion {
                    key: v.key()?.to_string(),
                    version_id: v.version_id().map(str::to_string),
                })
            }));
            objects.extend(response.delete_markers().iter().filter_map(|m| {
                Some(ObjectVersion {
                    key: m.key()?.to_string(),
                    version_id: m.version_id().map(str::to_string),
                })
            }));

            if !response.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = response.next_key_marker().map(str::to_string);
            version_id_marker = response.next_version_id_marker().map(str::to_string);
            if key_marker.is_none() && version_id_marker.is_none() {
                break;
            }
        }

        debug!(bucket, count = objects.len(), "s3.list_object_versions");
        Ok(objects)
    }

    async fn remove_objects(
        &self,
        bucket: &str,
        objects: &[ObjectVersion],
        bypass_governance: bool,
    ) -> Result<usize, RemoteError> {
        let mut removed = 0;

        // S3 allows up to 1000 deletes per request
        for chunk in objects.chunks(DELETE_OBJECTS_BATCH_SIZE) {
            let identifiers = chunk
                .iter()
                .map(|o| {
                    ObjectIdentifier::builder()
                        .key(&o.key)
                        .set_version_id(o.version_id.clone())
                        .build()
                        .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

            let output = self
                .client
                .delete_objects()
                .bucket(bucket)
                .bypass_governance_retention(bypass_governance)
                .delete(delete)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, bucket))?;

            if let Some(failed) = output.errors().first() {
                return Err(RemoteError::Api {
                    status: 200,
                    code: failed.code().unwrap_or("DeleteObjectsError").to_string(),
                    message: format!(
                        "failed to delete '{}': {}",
                        failed.key().unwrap_or_default(),
                        failed.message().unwrap_or_default()
                    ),
                });
            }
            removed += chunk.len();
        }

        Ok(removed)
    }
}

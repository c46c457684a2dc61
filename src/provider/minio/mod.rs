//! # MinIO Client Provider
//!
//! Builds the data plane and admin clients on first use and shares them
//! between every reconciler.
//!
//! The connection settings are loaded exactly once. A failed load is
//! remembered, so every later call fails with the same configuration error
//! until the process is restarted with corrected settings.

mod admin;
mod crypto;
mod s3;
mod signing;

pub use admin::MinioAdminClient;
pub use crypto::{decrypt_data, encrypt_data};
pub use s3::S3Storage;
pub use signing::RequestSigner;

use crate::config::{ConfigError, MinioConfig};
use crate::provider::{AdminApi, ObjectStorage, RemoteClients, RemoteError};
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{error, info};

type ConfigLoader = Box<dyn Fn() -> Result<MinioConfig, ConfigError> + Send + Sync>;

/// Lazily initialised, process-wide MinIO clients
pub struct MinioClientProvider {
    loader: ConfigLoader,
    config: OnceLock<Result<MinioConfig, ConfigError>>,
    storage: OnceCell<Arc<dyn ObjectStorage>>,
    admin: OnceCell<Arc<dyn AdminApi>>,
}

impl std::fmt::Debug for MinioClientProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinioClientProvider")
            .field("config", &self.config.get())
            .field("storage_ready", &self.storage.initialized())
            .field("admin_ready", &self.admin.initialized())
            .finish_non_exhaustive()
    }
}

impl MinioClientProvider {
    /// Provider reading `MINIO_*` environment variables
    pub fn from_env() -> Self {
        Self::with_loader(MinioConfig::from_env)
    }

    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<MinioConfig, ConfigError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            config: OnceLock::new(),
            storage: OnceCell::new(),
            admin: OnceCell::new(),
        }
    }

    /// Connection settings, loaded on first call
    pub fn config(&self) -> Result<&MinioConfig, RemoteError> {
        let loaded = self.config.get_or_init(|| {
            let result = (self.loader)();
            match &result {
                Ok(config) => info!(
                    endpoint = %config.endpoint,
                    drain_on_delete = config.empty_bucket_on_delete,
                    "Loaded MinIO connection settings"
                ),
                Err(e) => error!(error = %e, "Failed to load MinIO connection settings"),
            }
            result
        });
        loaded.as_ref().map_err(|e| RemoteError::Config(e.clone()))
    }
}

#[async_trait]
impl RemoteClients for MinioClientProvider {
    async fn storage(&self) -> Result<Arc<dyn ObjectStorage>, RemoteError> {
        self.storage
            .get_or_try_init(|| async {
                let config = self.config()?;
                info!(endpoint = %config.endpoint_url(), "Initialising MinIO S3 client");
                Ok::<Arc<dyn ObjectStorage>, RemoteError>(Arc::new(S3Storage::new(config)))
            })
            .await
            .map(Arc::clone)
    }

    async fn admin(&self) -> Result<Arc<dyn AdminApi>, RemoteError> {
        self.admin
            .get_or_try_init(|| async {
                let config = self.config()?;
                info!(endpoint = %config.endpoint_url(), "Initialising MinIO admin client");
                let client = MinioAdminClient::new(config)?;
                Ok::<Arc<dyn AdminApi>, RemoteError>(Arc::new(client))
            })
            .await
            .map(Arc::clone)
    }

    fn drain_on_delete(&self) -> Result<bool, RemoteError> {
        Ok(self.config()?.empty_bucket_on_delete)
    }
}

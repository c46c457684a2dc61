//! # MinIO Connection Configuration
//!
//! Endpoint and root credentials of the MinIO server the operator drives.

use super::parse_bool;
use crate::constants::DEFAULT_MINIO_REGION;
use zeroize::{Zeroize, ZeroizeOnDrop};

const ENV_ENDPOINT: &str = "MINIO_ENDPOINT";
const ENV_ACCESS_KEY_ID: &str = "MINIO_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "MINIO_SECRET_ACCESS_KEY";
const ENV_USE_SSL: &str = "MINIO_USE_SSL";
const ENV_REGION: &str = "MINIO_REGION";
const ENV_EMPTY_BUCKET_ON_DELETE: &str = "MINIO_EMPTY_BUCKET_ON_DELETE";

/// Errors loading the MinIO connection settings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(String),
    #[error("environment variable {key} has invalid value '{value}'")]
    Invalid { key: String, value: String },
}

/// MinIO connection settings
///
/// Credentials are wiped from memory when the value is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MinioConfig {
    /// `host:port`, or a full URL with scheme
    #[zeroize(skip)]
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[zeroize(skip)]
    pub use_ssl: bool,
    #[zeroize(skip)]
    pub region: String,
    /// Purge objects of a non-empty bucket before removing it on deletion
    #[zeroize(skip)]
    pub empty_bucket_on_delete: bool,
}

impl MinioConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::Missing(key.to_string()))
        };
        let flag = |key: &str| match lookup(key) {
            None => Ok(false),
            Some(v) if v.trim().is_empty() => Ok(false),
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid {
                key: key.to_string(),
                value: v,
            }),
        };

        Ok(Self {
            endpoint: required(ENV_ENDPOINT)?.trim().to_string(),
            access_key_id: required(ENV_ACCESS_KEY_ID)?,
            secret_access_key: required(ENV_SECRET_ACCESS_KEY)?,
            use_ssl: flag(ENV_USE_SSL)?,
            region: lookup(ENV_REGION)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MINIO_REGION.to_string()),
            empty_bucket_on_delete: flag(ENV_EMPTY_BUCKET_ON_DELETE)?,
        })
    }

    /// Base URL of the server, adding the scheme when `endpoint` has none
    pub fn endpoint_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        if endpoint.contains("://") {
            endpoint.to_string()
        } else if self.use_ssl {
            format!("https://{endpoint}")
        } else {
            format!("http://{endpoint}")
        }
    }
}

impl std::fmt::Debug for MinioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinioConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .field("region", &self.region)
            .field("empty_bucket_on_delete", &self.empty_bucket_on_delete)
            .finish()
    }
}

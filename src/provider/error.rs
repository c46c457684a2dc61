//! # Remote Errors
//!
//! Failures of calls against the MinIO data plane and admin API.

use crate::config::ConfigError;

/// Error returned by every remote operation
///
/// The reconcilers treat `NotFound` on removal, `AlreadyExists` on creation and
/// `NoNetEffect` on policy attach/detach as success. Everything else ends up
/// verbatim in `status.message`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("policy change had no net effect: {0}")]
    NoNetEffect(String),

    #[error("bucket '{0}' is not empty")]
    BucketNotEmpty(String),

    #[error("bucket '{bucket}' is still not empty after {rounds} drain rounds")]
    DrainExceeded { bucket: String, rounds: u32 },

    #[error("MinIO API error (HTTP {status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("payload encryption failed: {0}")]
    Crypto(String),

    #[error("MinIO configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RemoteError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_no_net_effect(&self) -> bool {
        matches!(self, Self::NoNetEffect(_))
    }

    pub fn is_bucket_not_empty(&self) -> bool {
        matches!(self, Self::BucketNotEmpty(_))
    }
}

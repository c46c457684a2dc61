//! # Configuration
//!
//! Operator configuration loaded from environment variables.
//!
//! Controller and server settings all have defaults. The MinIO connection
//! settings are required and are read exactly once, lazily, by the
//! [`crate::provider::MinioClientProvider`].

mod controller;
mod minio;
mod server;

pub use controller::ControllerConfig;
pub use minio::{ConfigError, MinioConfig};
pub use server::ServerConfig;

/// Load controller and server configuration from environment variables with defaults
pub fn load_config() -> (ControllerConfig, ServerConfig) {
    (ControllerConfig::from_env(), ServerConfig::from_env())
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a boolean flag the way MinIO tooling accepts them
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

//! # Controller Configuration
//!
//! Reconcile loop settings loaded from environment variables.

use super::env_var_or_default;
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespaces to watch, empty means all namespaces
    pub watch_namespaces: Vec<String>,
    /// Requeue interval for resources with nothing left to do (seconds)
    pub resync_interval_secs: u64,
    /// Deadline of a single reconcile invocation (seconds)
    pub reconcile_timeout_secs: u64,
    /// Bound on remove/purge rounds of the bucket drain
    pub max_drain_rounds: u32,
    /// Re-read-and-retry attempts when a record write conflicts
    pub status_conflict_retries: u32,
    /// Fibonacci backoff bounds for failed reconciles (seconds)
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            watch_namespaces: Vec::new(),
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            max_drain_rounds: DEFAULT_MAX_DRAIN_ROUNDS,
            status_conflict_retries: DEFAULT_STATUS_CONFLICT_RETRIES,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            watch_namespaces: parse_namespaces(
                &std::env::var("WATCH_NAMESPACE").unwrap_or_default(),
            ),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            reconcile_timeout_secs: env_var_or_default(
                "RECONCILE_TIMEOUT_SECS",
                DEFAULT_RECONCILE_TIMEOUT_SECS,
            ),
            max_drain_rounds: env_var_or_default("MAX_DRAIN_ROUNDS", DEFAULT_MAX_DRAIN_ROUNDS)
                .max(1),
            status_conflict_retries: env_var_or_default(
                "STATUS_CONFLICT_RETRIES",
                DEFAULT_STATUS_CONFLICT_RETRIES,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
        }
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Override the watched namespaces, e.g. from a CLI flag
    pub fn with_watch_namespace(mut self, value: &str) -> Self {
        self.watch_namespaces = parse_namespaces(value);
        self
    }
}

/// Split a comma separated namespace list, dropping blanks and duplicates
pub fn parse_namespaces(value: &str) -> Vec<String> {
    let mut namespaces: Vec<String> = Vec::new();
    for ns in value.split(',').map(str::trim).filter(|ns| !ns.is_empty()) {
        if !namespaces.iter().any(|n| n == ns) {
            namespaces.push(ns.to_string());
        }
    }
    namespaces
}

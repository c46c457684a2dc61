//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::constants;
use crate::controller::backoff::BackoffState;
use crate::controller::{ManagedKind, ReconcileError};
use crate::observability::metrics;
use crate::runtime::watch_loop::{resource_key, ControllerContext};
use kube_runtime::controller::Action;
use kube::ResourceExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing record never delays
/// the others; it is cleared by the next successful reconcile.
pub fn error_policy<K: ManagedKind>(
    obj: Arc<K>,
    error: &ReconcileError,
    ctx: Arc<ControllerContext<K>>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = K::KIND,
        resource.name = %name,
        resource.namespace = %namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!(reason = error.reason(), "Reconciliation error for {}: {}", name, error);
    metrics::increment_reconciliation_errors(K::KIND);

    let resource_key = resource_key(obj.as_ref());
    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key).or_insert_with(|| {
                BackoffState::new(ctx.config.backoff_min_secs, ctx.config.backoff_max_secs)
            });
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (constants::DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS, 0)
        }
    };

    let next_trigger_time = chrono::Utc::now() + chrono::Duration::seconds(backoff_seconds as i64);
    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {}, next retry: {})",
        backoff_seconds,
        error_count,
        next_trigger_time.to_rfc3339()
    );

    metrics::increment_requeues_total(error.reason());
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Watch stream failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// 401: RBAC revoked or token expired
    Unauthorized,
    /// 410: resource version too old, the watch relists
    Expired,
    /// 429: API server storage reinitializing
    Throttled,
    /// The object behind a queued event is gone
    ObjectNotFound,
    Other,
}

impl WatchErrorKind {
    pub fn classify(error_string: &str) -> Self {
        if error_string.contains("401") || error_string.contains("Unauthorized") {
            Self::Unauthorized
        } else if error_string.contains("410")
            || error_string.contains("too old resource version")
            || error_string.contains("Expired")
            || error_string.contains("Gone")
        {
            Self::Expired
        } else if error_string.contains("429")
            || error_string.contains("storage is (re)initializing")
            || error_string.contains("TooManyRequests")
        {
            Self::Throttled
        } else if error_string.contains("ObjectNotFound")
            || error_string.contains("object not found")
            || (error_string.contains("404") && error_string.contains("not found"))
        {
            Self::ObjectNotFound
        } else {
            Self::Other
        }
    }
}

/// Handle watch stream errors with classification and backoff
///
/// The controller restarts its watches on its own; this only paces the
/// stream so a persistent failure does not spin.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
) -> WatchErrorKind {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );

    let kind = WatchErrorKind::classify(error_string);
    pace_watch_restart(kind, error_string, backoff, max_backoff_ms)
        .instrument(error_span)
        .await;
    kind
}

async fn pace_watch_restart(
    kind: WatchErrorKind,
    error_string: &str,
    backoff: &AtomicU64,
    max_backoff_ms: u64,
) {
    match kind {
        WatchErrorKind::Unauthorized => {
            error!("❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
            error!("   Verify the ClusterRole grants list/watch/patch on buckets, policies and users");
            error!("   in group minio.scc-digitalhub.github.io, and that the ServiceAccount still exists");
            warn!(
                "⏳ Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                constants::DEFAULT_WATCH_RESTART_DELAY_SECS
            );
            tokio::time::sleep(Duration::from_secs(constants::DEFAULT_WATCH_RESTART_DELAY_SECS))
                .await;
        }
        WatchErrorKind::Expired => {
            warn!("Watch resource version expired (410) - this is normal during restarts, watch will restart");
        }
        WatchErrorKind::Throttled => {
            let current_backoff = backoff.load(Ordering::Relaxed);
            warn!(
                "API server storage reinitializing (429), backing off for {}ms before restart...",
                current_backoff
            );
            tokio::time::sleep(Duration::from_millis(current_backoff)).await;
            let new_backoff = current_backoff.saturating_mul(2).min(max_backoff_ms);
            backoff.store(new_backoff, Ordering::Relaxed);
        }
        WatchErrorKind::ObjectNotFound => {
            warn!("Resource not found (likely deleted), continuing watch...");
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(Duration::from_secs(constants::DEFAULT_WATCH_RESTART_DELAY_SECS))
                .await;
        }
    }
}

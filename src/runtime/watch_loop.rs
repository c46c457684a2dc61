//! # Watch Loop
//!
//! Runs one `kube_runtime::Controller` per kind and watched namespace, all
//! concurrently, until SIGTERM or SIGINT.
//!
//! Each reconcile runs a single engine step under the configured deadline.
//! `Outcome::Requeue` schedules the next step immediately and
//! `Outcome::Done` waits for the periodic resync.

use crate::config::ControllerConfig;
use crate::constants;
use crate::controller::backoff::BackoffState;
use crate::controller::events::EventPublisher;
use crate::controller::{
    reconcile_step, EngineContext, EngineSettings, KubeRecordStore, ManagedKind, Outcome,
    ReconcileError,
};
use crate::crd::{Bucket, Policy, User};
use crate::observability::metrics;
use crate::provider::RemoteClients;
use crate::runtime::error_policy::{error_policy, handle_watch_stream_error};
use anyhow::Result;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use kube_runtime::controller::{Action, Controller};
use kube_runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, ResourceExt};
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, Instrument};

/// Shared state of one kind's controller
pub struct ControllerContext<K: ManagedKind> {
    pub engine: EngineContext<K>,
    /// Fibonacci backoff per `namespace/name`, cleared on success
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
    pub config: ControllerConfig,
}

impl<K: ManagedKind> std::fmt::Debug for ControllerContext<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerContext")
            .field("kind", &K::KIND)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<K: ManagedKind> ControllerContext<K> {
    pub fn new(engine: EngineContext<K>, config: ControllerConfig) -> Self {
        Self {
            engine,
            backoff_states: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub(crate) fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}

/// Key used for per-resource bookkeeping
pub fn resource_key<K: ManagedKind>(obj: &K) -> String {
    format!(
        "{}/{}",
        obj.namespace().as_deref().unwrap_or("default"),
        obj.name_any()
    )
}

/// Map an engine outcome to the controller action
pub fn outcome_action(outcome: Outcome, resync_interval: Duration) -> Action {
    match outcome {
        Outcome::Requeue => {
            metrics::increment_requeues_total("next-step");
            Action::requeue(Duration::ZERO)
        }
        Outcome::Done => {
            metrics::increment_requeues_total("resync");
            Action::requeue(resync_interval)
        }
    }
}

/// Reconcile entry point handed to `Controller::run`
pub async fn reconcile<K: ManagedKind>(
    obj: Arc<K>,
    ctx: Arc<ControllerContext<K>>,
) -> Result<Action, ReconcileError> {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();
    let span = tracing::span!(
        tracing::Level::INFO,
        "controller.reconcile",
        resource.kind = K::KIND,
        resource.name = %name,
        resource.namespace = %namespace,
        resource.state = %obj.state(),
    );

    async move {
        metrics::increment_reconciliations(K::KIND);
        let started = Instant::now();
        let timeout = ctx.config.reconcile_timeout();

        let result = match tokio::time::timeout(timeout, reconcile_step(obj.as_ref(), &ctx.engine))
            .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(ReconcileError::Timeout(timeout)),
        };
        metrics::observe_reconciliation_duration(K::KIND, started.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.reset_backoff(&resource_key(obj.as_ref()));
        debug!(?outcome, "Reconcile step finished");
        Ok(outcome_action(outcome, ctx.config.resync_interval()))
    }
    .instrument(span)
    .await
}

/// Build the controller future of one kind in one scope
fn controller_for<K: ManagedKind>(
    api: Api<K>,
    ctx: Arc<ControllerContext<K>>,
    scope: String,
) -> BoxFuture<'static, ()> {
    let throttle_backoff = Arc::new(AtomicU64::new(constants::DEFAULT_WATCH_THROTTLE_BACKOFF_MS));

    info!(resource.kind = K::KIND, scope = %scope, "Starting controller");
    Controller::new(
        api,
        WatcherConfig::default().timeout(constants::DEFAULT_WATCH_TIMEOUT_SECS),
    )
    .shutdown_on_signal()
    .run(reconcile::<K>, error_policy::<K>, ctx)
    .for_each(move |result| {
        let throttle_backoff = Arc::clone(&throttle_backoff);
        async move {
            match result {
                Ok((object, action)) => {
                    debug!(resource.kind = K::KIND, object = %object, ?action, "Reconciled");
                }
                Err(kube_runtime::controller::Error::ReconcilerFailed(e, object)) => {
                    // Already recorded and scheduled by the error policy
                    debug!(resource.kind = K::KIND, object = %object, error = %e, "Reconcile failed");
                }
                Err(e) => {
                    handle_watch_stream_error(
                        &e.to_string(),
                        &throttle_backoff,
                        constants::MAX_WATCH_THROTTLE_BACKOFF_MS,
                    )
                    .await;
                }
            }
        }
    })
    .boxed()
}

/// Controller futures for one kind across every watched scope
fn controllers_for_kind<K: ManagedKind>(
    client: &Client,
    remotes: &Arc<dyn RemoteClients>,
    events: &Arc<dyn EventPublisher>,
    config: &ControllerConfig,
) -> Vec<BoxFuture<'static, ()>> {
    let settings = EngineSettings {
        max_drain_rounds: config.max_drain_rounds,
        conflict_retries: config.status_conflict_retries,
    };
    let ctx = Arc::new(ControllerContext::new(
        EngineContext::new(
            Arc::new(KubeRecordStore::<K>::new(client.clone())),
            Arc::clone(remotes),
            Arc::clone(events),
            settings,
        ),
        config.clone(),
    ));

    if config.watch_namespaces.is_empty() {
        vec![controller_for(
            Api::<K>::all(client.clone()),
            ctx,
            "all namespaces".to_string(),
        )]
    } else {
        config
            .watch_namespaces
            .iter()
            .map(|ns| {
                controller_for(
                    Api::<K>::namespaced(client.clone(), ns),
                    Arc::clone(&ctx),
                    format!("namespace {ns}"),
                )
            })
            .collect()
    }
}

/// Run the Bucket, Policy and User controllers until shutdown
pub async fn run_watch_loop(
    client: Client,
    remotes: Arc<dyn RemoteClients>,
    events: Arc<dyn EventPublisher>,
    config: ControllerConfig,
) -> Result<()> {
    let mut controllers = Vec::new();
    controllers.extend(controllers_for_kind::<Bucket>(&client, &remotes, &events, &config));
    controllers.extend(controllers_for_kind::<Policy>(&client, &remotes, &events, &config));
    controllers.extend(controllers_for_kind::<User>(&client, &remotes, &events, &config));

    info!(
        controllers = controllers.len(),
        resync_interval_secs = config.resync_interval_secs,
        reconcile_timeout_secs = config.reconcile_timeout_secs,
        "Watch loop running"
    );
    futures::future::join_all(controllers).await;
    info!("All controllers stopped, shutting down");
    Ok(())
}

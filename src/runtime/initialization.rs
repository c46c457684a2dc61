//! # Initialization
//!
//! Operator startup: rustls setup, tracing, metrics, server startup and
//! Kubernetes client setup.

use crate::config::{ControllerConfig, ServerConfig};
use crate::constants;
use crate::controller::events::{EventPublisher, KubeEventPublisher};
use crate::controller::server::{start_server, ServerState};
use crate::crd::{Bucket, ManagedResource, Policy, User};
use crate::observability;
use crate::provider::MinioClientProvider;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::{Client, Resource};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Log filter used when neither `--log-filter` nor `RUST_LOG` is set
pub const DEFAULT_LOG_FILTER: &str = "minio_operator=info";

/// Everything the watch loop needs
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// MinIO clients, built on first use
    pub remotes: Arc<MinioClientProvider>,
    /// Kubernetes event publisher
    pub events: Arc<dyn EventPublisher>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("remotes", &self.remotes)
            .field("server_state", &self.server_state)
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Initialize the operator runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - CRD availability check
///
/// MinIO settings are not read here; the client provider loads them on the
/// first reconcile that needs a remote call.
pub async fn initialize(
    controller_config: ControllerConfig,
    server_config: ServerConfig,
    log_filter: Option<&str>,
) -> Result<InitializationResult> {
    // Required for rustls 0.23+ before any TLS connection is opened
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    init_tracing(log_filter)?;

    info!("Starting MinIO operator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(config = ?controller_config, "Controller configuration");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());

    // Start server in background task and wait until it is bound
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    check_crds_installed(&client, &controller_config).await;

    let remotes = Arc::new(MinioClientProvider::from_env());
    let events: Arc<dyn EventPublisher> = Arc::new(KubeEventPublisher::new(
        client.clone(),
        constants::CONTROLLER_NAME,
    ));

    info!("Operator initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        remotes,
        events,
        server_state,
        controller_config,
    })
}

/// Install the global tracing subscriber
///
/// An explicit filter wins over `RUST_LOG`.
fn init_tracing(log_filter: Option<&str>) -> Result<()> {
    let filter = match log_filter {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid log filter '{directives}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    };
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        warn!("Tracing subscriber already initialized: {}", e);
    }
    Ok(())
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(server_config.poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        // Check if server task crashed
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}

/// Log whether each CRD can be listed in the watched scope
///
/// A missing CRD is not fatal: the controllers keep retrying their watches
/// and start working once the CRD is applied.
async fn check_crds_installed(client: &Client, config: &ControllerConfig) {
    let span = tracing::span!(
        tracing::Level::INFO,
        "controller.startup.check_crds",
        operation = "check_crds_installed"
    );
    let _guard = span.enter();

    check_crd::<Bucket>(client, config).await;
    check_crd::<Policy>(client, config).await;
    check_crd::<User>(client, config).await;
}

async fn check_crd<K: ManagedResource>(client: &Client, config: &ControllerConfig) {
    let kind = K::kind(&());
    let apis: Vec<(String, Api<K>)> = if config.watch_namespaces.is_empty() {
        vec![("*".to_string(), Api::all(client.clone()))]
    } else {
        config
            .watch_namespaces
            .iter()
            .map(|ns| (ns.clone(), Api::namespaced(client.clone(), ns)))
            .collect()
    };

    for (namespace, api) in apis {
        match api.list(&ListParams::default()).await {
            Ok(list) => info!(
                resource.kind = %kind,
                namespace = %namespace,
                "CRD is queryable, found {} existing {} resources",
                list.items.len(),
                kind
            ),
            Err(e) => {
                error!(
                    resource.kind = %kind,
                    namespace = %namespace,
                    "CRD is not queryable; {:?}. Is the CRD installed?",
                    e
                );
                error!("Installation: crdgen | kubectl apply -f -");
                warn!("Continuing despite CRD queryability check failure - controller will retry");
            }
        }
    }
}

//! # MinIO Operator
//!
//! A Kubernetes operator that keeps MinIO buckets, canned policies and users
//! in line with `Bucket`, `Policy` and `User` custom resources.
//!
//! ## Usage
//!
//! ```bash
//! MINIO_ENDPOINT=minio.minio:9000 \
//! MINIO_ACCESS_KEY_ID=admin \
//! MINIO_SECRET_ACCESS_KEY=... \
//! minio-operator --watch-namespace data,analytics
//! ```
//!
//! Every flag falls back to its environment variable (`METRICS_PORT`,
//! `WATCH_NAMESPACE`, `RUST_LOG`) and then to the built-in default.

use anyhow::Result;
use clap::Parser;
use minio_operator::config::load_config;
use minio_operator::provider::RemoteClients;
use minio_operator::runtime::initialization::initialize;
use minio_operator::runtime::watch_loop::run_watch_loop;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "minio-operator")]
#[command(version, about = "Kubernetes operator for MinIO buckets, policies and users", long_about = None)]
struct Cli {
    /// Port of the metrics and health probe server
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Comma-separated namespaces to watch, empty for all namespaces
    #[arg(long)]
    watch_namespace: Option<String>,

    /// tracing filter directives, e.g. `minio_operator=debug,kube=info`
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut controller_config, mut server_config) = load_config();
    if let Some(port) = cli.metrics_port {
        server_config.metrics_port = port;
    }
    if let Some(namespaces) = cli.watch_namespace.as_deref() {
        controller_config = controller_config.with_watch_namespace(namespaces);
    }

    let init_result = initialize(controller_config, server_config, cli.log_filter.as_deref()).await?;

    let remotes: Arc<dyn RemoteClients> = init_result.remotes;
    run_watch_loop(
        init_result.client,
        remotes,
        init_result.events,
        init_result.controller_config,
    )
    .await
}

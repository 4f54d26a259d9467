// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Router};
use capz_adopt::{
    config::{Cli, ControllerConfig, LogFormat},
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    controllers::{error_action, reconcile_agent_pool, reconcile_managed_cluster},
    kinds::ResourceKind,
    metrics::gather_metrics,
    store::KubeStore,
};
use clap::Parser;
use futures::StreamExt;
use kube::{
    api::DynamicObject,
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client,
};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] capz_adopt::errors::Error);

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ControllerConfig::from_cli(cli)?;

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("capz-adopt")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_tracing(format: LogFormat) {
    // Respects RUST_LOG if set, otherwise defaults to INFO
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: ControllerConfig) -> Result<()> {
    init_tracing(config.log_format);
    info!("Starting capz-adopt controller");
    debug!(?config, "Configuration resolved");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let metrics_address = config.metrics_bind_address.clone();
    let machine_pools_enabled = config.machine_pools_enabled;
    let ctx = Arc::new(Context::new(
        Arc::new(KubeStore::new(client.clone())),
        config,
    ));

    info!("Starting all controllers");

    // Controllers should never exit - if one does, log it and exit the process
    tokio::select! {
        result = run_managed_cluster_controller(client.clone(), ctx.clone()) => {
            error!("CRITICAL: ManagedCluster controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ManagedCluster controller exited unexpectedly without error")
        }
        result = run_agent_pool_controller(client.clone(), ctx.clone(), machine_pools_enabled) => {
            error!("CRITICAL: ManagedClustersAgentPool controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ManagedClustersAgentPool controller exited unexpectedly without error")
        }
        result = run_metrics_server(metrics_address) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, cancelling in-flight operations");
            ctx.shutdown.cancel();
            Ok(())
        }
    }
}

/// Watch handle for a foreign kind, scoped to the configured namespace.
fn watched_api(client: Client, kind: &ResourceKind, ctx: &Context) -> Api<DynamicObject> {
    let resource = kind.api_resource();
    match ctx.config.watch_namespace.as_deref() {
        Some(ns) => Api::namespaced_with(client, ns, &resource),
        None => Api::all_with(client, &resource),
    }
}

/// Run the ASO `ManagedCluster` adoption controller
async fn run_managed_cluster_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting ManagedCluster adoption controller");

    let kind = ResourceKind::aks_managed_cluster();
    let api = watched_api(client, &kind, &ctx);

    Controller::new_with(api, Config::default(), kind.api_resource())
        .run(reconcile_managed_cluster_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the ASO `ManagedClustersAgentPool` adoption controller
async fn run_agent_pool_controller(
    client: Client,
    ctx: Arc<Context>,
    machine_pools_enabled: bool,
) -> Result<()> {
    if !machine_pools_enabled {
        info!("MachinePool feature gate disabled, agent pool adoption is off");
        std::future::pending::<()>().await;
    }
    info!("Starting ManagedClustersAgentPool adoption controller");

    let kind = ResourceKind::aks_agent_pool();
    let api = watched_api(client, &kind, &ctx);

    Controller::new_with(api, Config::default(), kind.api_resource())
        .run(reconcile_agent_pool_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Serve Prometheus metrics on `/metrics`
async fn run_metrics_server(address: String) -> Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "Serving metrics");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler() -> (StatusCode, String) {
    match gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Reconcile wrapper for ASO `ManagedCluster`
async fn reconcile_managed_cluster_wrapper(
    source: Arc<DynamicObject>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    Ok(reconcile_managed_cluster(source, ctx).await?)
}

/// Reconcile wrapper for ASO `ManagedClustersAgentPool`
async fn reconcile_agent_pool_wrapper(
    source: Arc<DynamicObject>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    Ok(reconcile_agent_pool(source, ctx).await?)
}

/// Error policy shared by the adoption controllers
fn error_policy(source: Arc<DynamicObject>, err: &ReconcileError, ctx: Arc<Context>) -> Action {
    error_action(&source, &err.0, &ctx)
}

//! # Target Status Operator
//!
//! Managed-Prometheus operator component that reports scrape target health
//! on monitoring resources.
//!
//! ## Overview
//!
//! On a fixed cadence the operator:
//!
//! 1. **Checks the OperatorConfig** - Polling only runs with `features.targetStatus.enabled`
//!    and at least one PodMonitoring, ClusterPodMonitoring or ClusterNodeMonitoring
//! 2. **Polls every collector pod** - Reads `/api/v1/targets` with bounded concurrency
//! 3. **Aggregates targets per endpoint** - Health counts, error groups and samples
//! 4. **Patches `status.endpointStatuses`** - Other status fields are left alone
//!
//! ## Features
//!
//! - **Out-of-band polls**: Changes to the collector DaemonSet re-trigger polling
//! - **Prometheus metrics**: Exposes metrics for monitoring and observability
//! - **Health checks**: HTTP endpoints for liveness and readiness checks

use anyhow::{anyhow, Context, Result};
use kube::Client;
use std::sync::Arc;
use target_status_operator::config::OperatorSettings;
use target_status_operator::observability;
use target_status_operator::runtime::start_collector_watch;
use target_status_operator::server::{start_server, ServerState};
use target_status_operator::target_status::{
    HttpTargetFetcher, KubeStore, PollScheduler, TargetStatusUpdater,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Configure rustls crypto provider FIRST, before any other operations
    // Required for rustls 0.23+ when no default provider is set via features
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow!("Failed to install rustls crypto provider"))?;

    let settings = OperatorSettings::from_env();
    settings
        .validate()
        .context("Invalid operator settings")?;
    observability::init_logging(&settings).context("Failed to initialize logging")?;

    info!("Starting Target Status Operator v{}", env!("CARGO_PKG_VERSION"));

    // Initialize metrics
    observability::register_metrics()?;

    let shutdown = CancellationToken::new();
    let server_state = Arc::new(ServerState::default());

    // Start HTTP server for metrics and health checks
    let server = tokio::spawn({
        let state = Arc::clone(&server_state);
        let shutdown = shutdown.clone();
        let port = settings.metrics_port;
        async move {
            if let Err(e) = start_server(port, state, shutdown).await {
                error!("HTTP server error: {}", e);
            }
        }
    });

    // Create Kubernetes client
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let store = Arc::new(KubeStore::new(client.clone(), &settings));
    let fetcher = Arc::new(HttpTargetFetcher::new(settings.target_fetch_timeout()));
    let updater = Arc::new(TargetStatusUpdater::new(store, fetcher, settings.clone()));
    let scheduler = PollScheduler::new(updater, settings.target_poll_interval());

    let watch = start_collector_watch(
        client,
        &settings.operator_namespace,
        &settings.collector_name,
        scheduler.trigger(),
        shutdown.clone(),
    );
    let poller = tokio::spawn(scheduler.run(shutdown.clone()));

    server_state.set_ready(true);
    info!("Target status operator initialized");

    shutdown_signal().await;
    info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
    server_state.set_ready(false);
    shutdown.cancel();

    for (task, handle) in [("scheduler", poller), ("collector watch", watch), ("server", server)] {
        if let Err(e) = handle.await {
            error!(task, error = %e, "task ended abnormally");
        }
    }

    info!("Target status operator stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

//! scanward operator
//!
//! Watches ScanRequest resources and drives each one to a run-once or
//! recurring scan workload, capturing results on success. Also serves the
//! admission webhook that defaults and validates ScanRequest writes.

use std::sync::Arc;

use anyhow::Result;
use futures_util::StreamExt;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client};
use scanward_api::ScanRequest;
use scanward_operator::events::KubeEventSink;
use scanward_operator::reconciler::{self, Context};
use scanward_operator::store::KubeStore;
use scanward_operator::{config, webhook};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to SCANWARD_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting scanward operator");

    let client = match Client::try_default().await {
        Ok(client) => {
            info!("Cluster connection established");
            client
        }
        Err(e) => {
            error!(error = %e, "Failed to connect to the cluster");
            return Err(e.into());
        }
    };

    let ctx = Arc::new(Context {
        store: Arc::new(KubeStore::new(client.clone())),
        events: Arc::new(KubeEventSink::new(client.clone())),
    });

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Serve the admission webhook in the background
    let listener = tokio::net::TcpListener::bind(&config.webhook_listen_addr).await?;
    info!(addr = %config.webhook_listen_addr, "Admission webhook listening");
    let webhook_handle = tokio::spawn(async move {
        axum::serve(listener, webhook::admission_router())
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("Webhook server shutting down");
            })
            .await
    });

    // Watch ScanRequests; own the derived workloads and result artifacts so
    // child changes re-trigger reconciliation.
    let scans: Api<ScanRequest> = Api::all(client.clone());
    let jobs: Api<Job> = Api::all(client.clone());
    let cron_jobs: Api<CronJob> = Api::all(client.clone());
    let config_maps: Api<ConfigMap> = Api::all(client);

    let controller_handle = tokio::spawn(
        Controller::new(scans, watcher::Config::default())
            .owns(jobs, watcher::Config::default())
            .owns(cron_jobs, watcher::Config::default())
            .owns(config_maps, watcher::Config::default())
            .shutdown_on_signal()
            .run(reconciler::reconcile, reconciler::error_policy, ctx)
            .for_each(|result| async move {
                match result {
                    Ok((object, _)) => debug!(object = %object, "Reconciled"),
                    Err(e) => warn!(error = %e, "Reconciliation error"),
                }
            }),
    );

    // The controller exits on its own once it observes the shutdown signal.
    match controller_handle.await {
        Ok(()) => info!("Controller exited"),
        Err(e) => error!(error = %e, "Controller task panicked"),
    }

    // Signal shutdown to the webhook server and wait for it to drain
    let _ = shutdown_tx.send(true);
    let shutdown_timeout = std::time::Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, webhook_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!(error = %e, "Webhook server error"),
        Ok(Err(e)) => error!(error = %e, "Webhook task panicked"),
        Err(e) => warn!(error = %e, "Webhook server did not shut down in time"),
    }

    info!("Operator shutdown complete");
    Ok(())
}

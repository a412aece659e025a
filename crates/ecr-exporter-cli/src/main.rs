//! ECR exporter - Prometheus metrics for AWS ECR repositories, images and scan findings.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ecr_exporter_collector::{CronScheduler, RepositoryCollector};
use ecr_exporter_metrics::{serve, MetricSink, PrometheusSink};
use ecr_exporter_registry::{EcrConnector, RegistryConnector};
use tokio_util::sync::CancellationToken;

mod config;
mod logging;

use config::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format, &cli.log_level)?;

    let scheduler =
        CronScheduler::new(&cli.cron_schedule).context("invalid --cron-schedule")?;
    let sink = Arc::new(PrometheusSink::new().context("failed to create metrics registry")?);
    let connector: Arc<dyn RegistryConnector> = Arc::new(EcrConnector::new(cli.registry_config()));
    let collector = RepositoryCollector::new(
        cli.collector_config()?,
        connector,
        Arc::clone(&sink) as Arc<dyn MetricSink>,
    )
    .context("failed to create collector")?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    if cli.once {
        return run_once(&collector, &sink, &cancel).await;
    }

    let server_config = cli.server_config();
    tracing::info!(
        addr = %server_config.addr,
        path = %server_config.path,
        "starting metrics server"
    );
    let mut server = {
        let shutdown = cancel.clone();
        tokio::spawn(serve(server_config, Arc::clone(&sink), async move {
            shutdown.cancelled().await;
        }))
    };

    let server_exited = tokio::select! {
        result = &mut server => Some(result),
        () = collect_on_schedule(&collector, &scheduler, &cancel) => None,
    };
    let served = match server_exited {
        Some(result) => {
            cancel.cancel();
            result
        }
        None => server.await,
    };

    if collector.shutdown(cli.shutdown_grace).await {
        tracing::info!("collection tasks drained");
    }

    served
        .context("metrics server task failed")?
        .context("metrics server failed")
}

/// Runs the startup cycle, then one cycle per schedule tick.
async fn collect_on_schedule(
    collector: &RepositoryCollector,
    scheduler: &CronScheduler,
    cancel: &CancellationToken,
) {
    collector.run_cycle(cancel).await;
    scheduler.run(collector, cancel).await;
}

/// Runs a single cycle to completion and prints the exposition.
async fn run_once(
    collector: &RepositoryCollector,
    sink: &PrometheusSink,
    cancel: &CancellationToken,
) -> Result<()> {
    let summary = collector
        .collect(cancel)
        .await
        .context("collection cycle failed")?;
    collector.wait_for_tasks().await;

    tracing::info!(repositories = summary.repositories, "collection complete");
    print!("{}", sink.encode_text()?);
    Ok(())
}

#[cfg(unix)]
async fn cancel_on_signal(cancel: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            wait_for_ctrl_c(cancel).await;
            return;
        }
    };

    tokio::select! {
        Ok(()) = tokio::signal::ctrl_c() => tracing::info!("received Ctrl-C, shutting down"),
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
    }
    cancel.cancel();
}

#[cfg(not(unix))]
async fn cancel_on_signal(cancel: CancellationToken) {
    wait_for_ctrl_c(cancel).await;
}

async fn wait_for_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("received Ctrl-C, shutting down");
            cancel.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "failed to listen for Ctrl-C"),
    }
}

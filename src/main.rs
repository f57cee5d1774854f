//! `nexus-mirror` binary
//!
//! Wires the desktop bridges, two Nexus connectors and the mirror engine
//! together for one run.

mod cli;

use anyhow::{bail, Context, Result};
use bridge_desktop::{HttpClientOptions, ReqwestHttpClient, TokioFileSystem};
use bridge_traits::{HttpClient, RepositoryClient, SystemClock};
use clap::Parser;
use core_runtime::config::MirrorConfig;
use core_runtime::logging::init_logging;
use core_sync::{MirrorCoordinator, MirrorSummary, StagingArea};
use provider_nexus::NexusConnector;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.logging_config()?).context("failed to initialize logging")?;
    let config = cli.mirror_config().context("invalid configuration")?;

    let staging = StagingArea::new(staging_dir(&config)?, Arc::new(TokioFileSystem::new()));
    info!(path = %staging.root().display(), "Using staging directory");

    let result = run(&config, staging.clone()).await;

    if config.retains_staging() {
        info!(path = %staging.root().display(), "Keeping staging directory");
    } else if let Err(e) = staging.cleanup().await {
        warn!(path = %staging.root().display(), error = %e, "Failed to remove staging directory");
    }

    match result {
        Ok(summary) => {
            println!("{summary}");
            ensure_complete(&summary, &config)
        }
        Err(e) => {
            error!(error = %e, "Mirroring failed");
            Err(e)
        }
    }
}

async fn run(config: &MirrorConfig, staging: StagingArea) -> Result<MirrorSummary> {
    let http: Arc<dyn HttpClient> = Arc::new(
        ReqwestHttpClient::with_options(HttpClientOptions {
            timeout: config.http_timeout,
            insecure: config.http_insecure,
            ..Default::default()
        })
        .context("failed to build HTTP client")?,
    );

    let source = NexusConnector::from_config(Arc::clone(&http), &config.source, config)
        .context("invalid source repository")?;
    let destination = NexusConnector::from_config(Arc::clone(&http), &config.destination, config)
        .context("invalid destination repository")?;
    info!(source = %source.endpoint(), destination = %destination.endpoint(), "Mirroring");

    let (source_status, destination_status) = tokio::join!(source.check_status(), destination.check_status());
    source_status.with_context(|| format!("source server {} is not available", source.endpoint().base_url()))?;
    destination_status
        .with_context(|| format!("destination server {} is not available", destination.endpoint().base_url()))?;

    let source: Arc<dyn RepositoryClient> = Arc::new(source);
    let destination: Arc<dyn RepositoryClient> = Arc::new(destination);

    let coordinator = MirrorCoordinator::new(config, source, destination, staging, Arc::new(SystemClock))?;

    let shutdown = coordinator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, shutting down");
            shutdown.shutdown();
        }
    });

    Ok(coordinator.run().await?)
}

/// Fail the process when assets were dropped, unless the operator opted out
fn ensure_complete(summary: &MirrorSummary, config: &MirrorConfig) -> Result<()> {
    if !summary.has_failures() {
        return Ok(());
    }
    if config.skip_download_errors {
        warn!(failed = summary.failed, "Some assets were not mirrored, ignoring");
        return Ok(());
    }
    bail!(
        "{} job(s) failed; check the logs and run again, or pass --skip-download-errors",
        summary.failed
    )
}

/// The directory to resume in, or a fresh one under the configured prefix
fn staging_dir(config: &MirrorConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.continue_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot use continue directory {}", dir.display()))?;
        return Ok(dir.clone());
    }

    let prefix = config
        .staging_prefix
        .clone()
        .unwrap_or_else(TokioFileSystem::default_staging_prefix);
    std::fs::create_dir_all(&prefix)
        .with_context(|| format!("cannot create staging prefix {}", prefix.display()))?;

    let dir = tempfile::Builder::new()
        .prefix("nexus-mirror-")
        .keep(true)
        .tempdir_in(&prefix)
        .with_context(|| format!("cannot create staging directory under {}", prefix.display()))?;
    Ok(dir.path().to_path_buf())
}

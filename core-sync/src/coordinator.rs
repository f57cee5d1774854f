//! # Mirror Coordinator
//!
//! Runs one mirroring pass from a source repository to a destination.
//!
//! ## Workflow
//!
//! 1. **Enumerate**: one `EnumerateTree` job per side at its root node. Both
//!    sides share a dispatcher; its idle completion marks the end of the phase.
//! 2. **Diff**: compare the inventories and collect the missing assets.
//! 3. **Transfer**: one `DownloadAsset` job per missing asset on a fresh
//!    dispatcher. Uploads and staging cleanup are chained by the pipeline.
//!
//! A dropped `EnumerateTree` job fails the run, since a whole subtree would
//! be missing from the inventory. Dropped attribute lookups and transfers are
//! counted in [`MirrorSummary::failed`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::MirrorCoordinator;
//!
//! let coordinator = MirrorCoordinator::new(&config, source, destination, staging, clock)?;
//! let shutdown = coordinator.shutdown_handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     shutdown.shutdown();
//! });
//!
//! let summary = coordinator.run().await?;
//! println!("{summary}");
//! ```

use crate::diff::{DiffEngine, DiffOptions};
use crate::dispatcher::{DispatchReport, Dispatcher, DispatcherConfig};
use crate::job::Job;
use crate::pipeline::{MirrorHandler, TransferOptions};
use crate::repository::SyncRepository;
use crate::staging::StagingArea;
use crate::{Result, SyncError};
use bridge_traits::{Asset, Clock, RepositoryClient};
use core_runtime::config::MirrorConfig;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Cloneable handle that stops a running coordinator
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Operator-facing result of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorSummary {
    pub found_source: usize,
    pub found_destination: usize,
    pub missing: usize,
    pub downloaded: u64,
    pub uploaded: u64,
    /// Jobs dropped after exhausting their retries, in any phase
    pub failed: usize,
    /// Assets transferred because their content could not be verified
    pub unverified: usize,
}

impl MirrorSummary {
    /// Whether some asset could not be listed or transferred
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for MirrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Assets found in source:      {}", self.found_source)?;
        writeln!(f, "Assets found in destination: {}", self.found_destination)?;
        writeln!(f, "Assets missing:              {}", self.missing)?;
        writeln!(f, "Assets unverified:           {}", self.unverified)?;
        writeln!(f, "Assets downloaded:           {}", self.downloaded)?;
        writeln!(f, "Assets uploaded:             {}", self.uploaded)?;
        write!(f, "Jobs failed:                 {}", self.failed)
    }
}

pub struct MirrorCoordinator {
    dispatcher_config: DispatcherConfig,
    skip_download: bool,
    source: Arc<SyncRepository>,
    destination: Arc<SyncRepository>,
    staging: StagingArea,
    handler: Arc<MirrorHandler>,
    diff: DiffEngine,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
}

impl MirrorCoordinator {
    /// Wire a coordinator from validated configuration and injected collaborators
    ///
    /// # Errors
    ///
    /// Fails if the configured path filter is not a valid regex.
    pub fn new(
        config: &MirrorConfig,
        source: Arc<dyn RepositoryClient>,
        destination: Arc<dyn RepositoryClient>,
        staging: StagingArea,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let handler = MirrorHandler::new(
            staging.clone(),
            TransferOptions {
                skip_upload: config.skip_upload,
                keep_staging: config.keep_staging,
            },
            config.compiled_path_filter()?,
        );

        Ok(Self {
            dispatcher_config: DispatcherConfig::from(config),
            skip_download: config.skip_download,
            source: Arc::new(SyncRepository::new(source)),
            destination: Arc::new(SyncRepository::new(destination)),
            staging,
            handler: Arc::new(handler),
            diff: DiffEngine::new(DiffOptions::from_config(config)),
            clock,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
        }
    }

    pub fn source(&self) -> &SyncRepository {
        &self.source
    }

    pub fn destination(&self) -> &SyncRepository {
        &self.destination
    }

    /// Enumerate both sides, diff them and transfer what is missing
    ///
    /// # Errors
    ///
    /// - `SyncError::Enumeration` if either inventory could not be completed
    /// - `SyncError::Cancelled` if the run was shut down
    /// - `SyncError::Staging` if the staging directory cannot be created
    #[instrument(skip(self), fields(source = %self.source.name(), destination = %self.destination.name()))]
    pub async fn run(&self) -> Result<MirrorSummary> {
        info!("Phase 1: enumerating repositories");
        let seeds = vec![
            Job::enumerate_tree(Arc::clone(&self.source), self.source.client().root_node()),
            Job::enumerate_tree(Arc::clone(&self.destination), self.destination.client().root_node()),
        ];
        let enumeration = self.run_phase(seeds).await?;

        let mut summary = MirrorSummary {
            found_source: self.source.len().await,
            found_destination: self.destination.len().await,
            failed: enumeration.failed.len(),
            ..Default::default()
        };
        if summary.has_failures() {
            warn!(failed = summary.failed, "Some assets could not be inspected and are left out of the diff");
        }

        info!("Phase 2: comparing inventories");
        let report = {
            let destination_assets = self.destination.inventory().await;
            self.diff
                .diff(
                    self.source.client(),
                    self.source.snapshot().await,
                    self.destination.client(),
                    &destination_assets,
                )
                .await
        };
        summary.missing = report.missing.len();
        summary.unverified = report.unverified;

        if self.skip_download {
            warn!(missing = summary.missing, "Download disabled, stopping after diff");
            return Ok(summary);
        }
        if report.missing.is_empty() {
            if !summary.has_failures() {
                info!("Destination is up to date");
            }
            return Ok(summary);
        }

        info!(missing = summary.missing, "Phase 3: transferring missing assets");
        self.staging.prepare().await?;
        let transfers = self.transfer_jobs(report.missing);
        let dispatch = self.run_phase(transfers).await?;

        summary.downloaded = self.source.downloaded();
        summary.uploaded = self.destination.uploaded();
        summary.failed += dispatch.failed.len();

        info!(
            downloaded = summary.downloaded,
            uploaded = summary.uploaded,
            failed = summary.failed,
            "Mirroring finished"
        );
        Ok(summary)
    }

    fn transfer_jobs(&self, missing: Vec<Asset>) -> Vec<Job> {
        missing
            .into_iter()
            .map(|asset| Job::download(Arc::clone(&self.source), Arc::clone(&self.destination), asset))
            .collect()
    }

    /// Run a fresh dispatcher over `seeds` until it goes idle
    async fn run_phase(&self, seeds: Vec<Job>) -> Result<DispatchReport> {
        if self.shutdown.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let handler: Arc<dyn crate::worker::JobHandler> = self.handler.clone();
        let dispatcher = Dispatcher::new(self.dispatcher_config.clone(), handler, Arc::clone(&self.clock))
            .with_cancellation(self.shutdown.child_token());

        let seed = async {
            for job in seeds {
                dispatcher.submit(job).await?;
            }
            Ok::<_, SyncError>(())
        };
        let (report, seeded) = tokio::join!(dispatcher.run(), seed);

        let report = report?;
        if let Err(e) = seeded {
            if self.shutdown.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            return Err(e);
        }
        Ok(report)
    }
}

impl fmt::Debug for MirrorCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorCoordinator")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("staging", &self.staging)
            .field("dispatcher", &self.dispatcher_config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_report() {
        let summary = MirrorSummary {
            found_source: 10,
            found_destination: 7,
            missing: 3,
            downloaded: 3,
            uploaded: 2,
            failed: 1,
            unverified: 0,
        };

        let text = summary.to_string();
        assert!(text.contains("Assets found in source:      10"));
        assert!(text.contains("Assets missing:              3"));
        assert!(text.ends_with("Jobs failed:                 1"));
        assert!(summary.has_failures());
        assert!(!MirrorSummary::default().has_failures());
    }

    #[test]
    fn test_shutdown_handle_is_shared() {
        let token = CancellationToken::new();
        let handle = ShutdownHandle { token: token.clone() };
        let other = handle.clone();

        other.shutdown();
        assert!(handle.is_shutdown());
        assert!(token.is_cancelled());
    }
}

//! # Inventory Diff
//!
//! Decides which source assets have to be transferred to the destination.
//!
//! ## Overview
//!
//! Assets are matched by [`Asset::human_readable_name`]. A name present on
//! both sides is only considered transferred when a strong digest agrees;
//! md5 is never trusted. Every ambiguity fails open: the asset is treated as
//! missing and transferred again, and the verification policy only decides
//! how loudly that is reported.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = DiffEngine::new(DiffOptions::from_config(&config));
//! let report = engine
//!     .diff(source.client(), source.snapshot().await, destination.client(), &destination_assets)
//!     .await;
//! for asset in report.missing { /* schedule download */ }
//! ```

use bridge_traits::{Asset, AssetHashes, HashAlgorithm, RepositoryClient};
use core_runtime::config::{MirrorConfig, VerificationPolicy};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Digest algorithms compared, strongest signal first
const COMPARISON_ORDER: [HashAlgorithm; 3] = [
    HashAlgorithm::Sha1,
    HashAlgorithm::Sha256,
    HashAlgorithm::Sha512,
];

/// Knobs that influence the verification step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    pub verify_hashes: bool,
    pub on_hash_fetch_error: VerificationPolicy,
    pub on_missing_hashes: VerificationPolicy,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            verify_hashes: true,
            on_hash_fetch_error: VerificationPolicy::Report,
            on_missing_hashes: VerificationPolicy::Report,
        }
    }
}

impl DiffOptions {
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            verify_hashes: config.verify_hashes,
            on_hash_fetch_error: config.on_hash_fetch_error,
            on_missing_hashes: config.on_missing_hashes,
        }
    }
}

/// Outcome of one diff
#[derive(Debug, Default)]
pub struct DiffReport {
    /// Source assets to transfer, in source order
    pub missing: Vec<Asset>,
    pub source_count: usize,
    pub destination_count: usize,
    /// Source assets skipped as repository metadata
    pub excluded: usize,
    /// Source assets already present on the destination
    pub matched: usize,
    /// Missing assets whose state could not be verified, under `Report`
    pub unverified: usize,
}

enum Verdict {
    Match,
    Mismatch,
    Unverifiable,
}

/// Stateless comparison of two inventories
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    options: DiffOptions,
}

impl DiffEngine {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Compute the source assets missing on the destination
    ///
    /// Hash lookups go through each side's client so adapters that keep
    /// digests server-side can fetch them lazily.
    pub async fn diff(
        &self,
        source_client: &dyn RepositoryClient,
        source_assets: Vec<Asset>,
        destination_client: &dyn RepositoryClient,
        destination_assets: &[Asset],
    ) -> DiffReport {
        let mut report = DiffReport {
            source_count: source_assets.len(),
            destination_count: destination_assets.len(),
            ..Default::default()
        };

        let by_name: HashMap<String, &Asset> = destination_assets
            .iter()
            .map(|asset| (asset.human_readable_name(), asset))
            .collect();

        for asset in source_assets {
            if asset.is_metadata_file() {
                report.excluded += 1;
                continue;
            }

            let Some(existing) = by_name.get(&asset.human_readable_name()) else {
                debug!(asset = %asset.name(), "Missing on destination");
                report.missing.push(asset);
                continue;
            };

            if !self.options.verify_hashes {
                report.matched += 1;
                continue;
            }

            match self
                .verify(source_client, &asset, destination_client, existing, &mut report)
                .await
            {
                Verdict::Match => report.matched += 1,
                Verdict::Mismatch => {
                    debug!(asset = %asset.name(), "Content differs on destination");
                    report.missing.push(asset);
                }
                Verdict::Unverifiable => report.missing.push(asset),
            }
        }

        info!(
            source = %source_client.repository(),
            destination = %destination_client.repository(),
            found_source = report.source_count,
            found_destination = report.destination_count,
            missing = report.missing.len(),
            excluded = report.excluded,
            unverified = report.unverified,
            "Inventory diff complete"
        );

        report
    }

    async fn verify(
        &self,
        source_client: &dyn RepositoryClient,
        source: &Asset,
        destination_client: &dyn RepositoryClient,
        destination: &Asset,
        report: &mut DiffReport,
    ) -> Verdict {
        let fetched = async {
            let ours = source_client.fetch_asset_hashes(source).await?;
            let theirs = destination_client.fetch_asset_hashes(destination).await?;
            Ok::<_, bridge_traits::BridgeError>((ours, theirs))
        }
        .await;

        let (ours, theirs) = match fetched {
            Ok(pair) => pair,
            Err(e) => {
                self.report_ambiguity(
                    self.options.on_hash_fetch_error,
                    source,
                    &format!("hash lookup failed: {e}"),
                    report,
                );
                return Verdict::Unverifiable;
            }
        };

        match compare_hashes(&ours, &theirs) {
            Some(true) => Verdict::Match,
            Some(false) => Verdict::Mismatch,
            None => {
                self.report_ambiguity(
                    self.options.on_missing_hashes,
                    source,
                    "no comparable digests on both sides",
                    report,
                );
                Verdict::Unverifiable
            }
        }
    }

    fn report_ambiguity(
        &self,
        policy: VerificationPolicy,
        asset: &Asset,
        reason: &str,
        report: &mut DiffReport,
    ) {
        match policy {
            VerificationPolicy::Report => {
                warn!(asset = %asset.name(), reason, "Cannot verify asset, transferring again");
                report.unverified += 1;
            }
            VerificationPolicy::Ignore => {
                debug!(asset = %asset.name(), reason, "Cannot verify asset, transferring again");
            }
        }
    }
}

/// `Some(true)` on the first algorithm both sides agree on, `Some(false)` if
/// comparable digests exist but none agree, `None` if nothing is comparable
fn compare_hashes(ours: &AssetHashes, theirs: &AssetHashes) -> Option<bool> {
    let mut comparable = false;
    for algorithm in COMPARISON_ORDER {
        if let (Some(a), Some(b)) = (ours.get(algorithm), theirs.get(algorithm)) {
            if a == b {
                return Some(true);
            }
            comparable = true;
        }
    }
    comparable.then_some(false)
}

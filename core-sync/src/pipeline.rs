//! # Mirror Pipeline
//!
//! The [`JobHandler`] that gives each job action its meaning.
//!
//! ## Overview
//!
//! - `EnumerateTree` lists one node. Sub-nodes become new enumeration jobs,
//!   concrete assets land in the repository inventory, either directly or
//!   through a `FetchAssetInfo` job when the listing carried no attributes.
//! - `DownloadAsset` stages the file and chains `UploadAsset`.
//! - `UploadAsset` pushes the staged file and chains `DeleteStaged`.
//! - `DeleteStaged` removes the staging file and releases the asset.
//!
//! The asset moves by value from one stage to the next, so exactly one stage
//! holds its staging file at any time.

use crate::dispatcher::JobSink;
use crate::job::{Job, JobPayload};
use crate::repository::SyncRepository;
use crate::staging::StagingArea;
use crate::worker::JobHandler;
use crate::Result;
use async_trait::async_trait;
use bridge_traits::{Asset, ListingEntry};
use regex::Regex;
use std::mem;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Transfer-side switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Download only, never push to the destination
    pub skip_upload: bool,
    /// Leave staged files in place
    pub keep_staging: bool,
}

pub struct MirrorHandler {
    staging: StagingArea,
    options: TransferOptions,
    path_filter: Option<Regex>,
}

impl MirrorHandler {
    pub fn new(staging: StagingArea, options: TransferOptions, path_filter: Option<Regex>) -> Self {
        Self {
            staging,
            options,
            path_filter,
        }
    }

    fn accepts(&self, asset: &Asset) -> bool {
        if asset.is_metadata_file() {
            return false;
        }
        self.path_filter
            .as_ref()
            .map_or(true, |filter| filter.is_match(asset.name()))
    }

    async fn enumerate(&self, repository: &Arc<SyncRepository>, node: &str, sink: &JobSink) -> Result<()> {
        let entries = repository.client().list_assets(node).await?;
        trace!(repository = %repository.name(), node, entries = entries.len(), "Listed node");

        for entry in entries {
            match entry {
                ListingEntry::Node { id } => {
                    sink.submit(Job::enumerate_tree(Arc::clone(repository), id));
                }
                ListingEntry::Asset(asset) if !self.accepts(&asset) => {
                    trace!(asset = %asset.name(), "Skipping asset");
                }
                ListingEntry::Asset(asset) if asset.attributes_loaded() => {
                    repository.append(asset).await;
                }
                ListingEntry::Asset(asset) => {
                    sink.submit(Job::fetch_asset_info(Arc::clone(repository), asset));
                }
            }
        }
        Ok(())
    }

    async fn fetch_info(&self, repository: &SyncRepository, asset: &mut Asset) -> Result<()> {
        repository.client().fetch_asset_info(asset).await?;
        repository.append(asset.clone()).await;
        Ok(())
    }

    async fn download(
        &self,
        source: &SyncRepository,
        destination: &Arc<SyncRepository>,
        asset: &mut Asset,
        sink: &JobSink,
    ) -> Result<()> {
        let path = self.staging.path_for(asset);
        source.client().download(asset, &path).await?;
        asset.mark_downloaded(path);
        source.record_download();
        info!(asset = %asset.name(), from = %source.name(), "Downloaded");

        if !self.options.skip_upload {
            sink.submit(Job::upload(Arc::clone(destination), mem::take(asset)));
        } else if !self.options.keep_staging {
            sink.submit(Job::delete_staged(mem::take(asset)));
        }
        Ok(())
    }

    async fn upload(&self, destination: &SyncRepository, asset: &mut Asset, sink: &JobSink) -> Result<()> {
        let path = asset
            .staging_path()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.staging.path_for(asset));
        destination.client().upload(&path, asset).await?;
        destination.record_upload();
        info!(asset = %asset.name(), to = %destination.name(), "Uploaded");

        sink.submit(Job::delete_staged(mem::take(asset)));
        Ok(())
    }

    async fn delete_staged(&self, asset: &mut Asset) -> Result<()> {
        if !self.options.keep_staging {
            let path = asset
                .staging_path()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| self.staging.path_for(asset));
            self.staging.remove(&path).await?;
            debug!(path = %path.display(), "Removed staged file");
        }
        asset.release();
        Ok(())
    }
}

#[async_trait]
impl JobHandler for MirrorHandler {
    async fn handle(&self, job: &mut Job, sink: &JobSink) -> Result<()> {
        match job.payload_mut() {
            JobPayload::EnumerateTree { repository, node } => self.enumerate(repository, node, sink).await,
            JobPayload::FetchAssetInfo { repository, asset } => self.fetch_info(repository, asset).await,
            JobPayload::DownloadAsset {
                source,
                destination,
                asset,
            } => self.download(source, destination, asset, sink).await,
            JobPayload::UploadAsset { destination, asset } => self.upload(destination, asset, sink).await,
            JobPayload::DeleteStaged { asset } => self.delete_staged(asset).await,
        }
    }
}

impl std::fmt::Debug for MirrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorHandler")
            .field("staging", &self.staging)
            .field("options", &self.options)
            .field("path_filter", &self.path_filter.as_ref().map(Regex::as_str))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchEvent;
    use crate::job::JobAction;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        AssetAttributes, AssetHashes, BridgeError, FileSystemAccess, MavenCoordinates,
        RepositoryClient,
    };
    use mockall::mock;
    use std::path::{Path, PathBuf};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    mock! {
        Client {}

        #[async_trait]
        impl RepositoryClient for Client {
            fn repository(&self) -> &str;
            async fn list_assets(&self, node: &str) -> BridgeResult<Vec<ListingEntry>>;
            async fn fetch_asset_info(&self, asset: &mut Asset) -> BridgeResult<()>;
            async fn download(&self, asset: &Asset, destination: &Path) -> BridgeResult<()>;
            async fn upload(&self, source: &Path, asset: &Asset) -> BridgeResult<()>;
        }
    }

    mock! {
        Fs {}

        #[async_trait]
        impl FileSystemAccess for Fs {
            async fn exists(&self, path: &Path) -> BridgeResult<bool>;
            async fn create_dir_all(&self, path: &Path) -> BridgeResult<()>;
            async fn delete_file(&self, path: &Path) -> BridgeResult<()>;
            async fn delete_dir_all(&self, path: &Path) -> BridgeResult<()>;
        }
    }

    fn sink() -> (JobSink, mpsc::UnboundedReceiver<DispatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (JobSink::new(tx, CancellationToken::new()), rx)
    }

    fn submitted(rx: &mut mpsc::UnboundedReceiver<DispatchEvent>) -> Vec<Job> {
        let mut jobs = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DispatchEvent::Submit(job) = event {
                jobs.push(job);
            }
        }
        jobs
    }

    fn named_client(name: &'static str) -> MockClient {
        let mut client = MockClient::new();
        client.expect_repository().return_const(name.to_string());
        client
    }

    fn handler(fs: MockFs, options: TransferOptions, filter: Option<&str>) -> MirrorHandler {
        MirrorHandler::new(
            StagingArea::new("/stage", Arc::new(fs)),
            options,
            filter.map(|f| Regex::new(f).unwrap()),
        )
    }

    fn jar() -> Asset {
        Asset::new("org/acme/lib/1.0/lib-1.0.jar").with_attributes(AssetAttributes {
            hashes: AssetHashes::new(),
            maven: Some(MavenCoordinates {
                group_id: Some("org.acme".into()),
                artifact_id: Some("lib".into()),
                version: Some("1.0".into()),
                ..Default::default()
            }),
        })
    }

    #[tokio::test]
    async fn test_enumerate_routes_entries() {
        let mut client = named_client("releases");
        client.expect_list_assets().returning(|_| {
            Ok(vec![
                ListingEntry::Node { id: "org/acme".into() },
                ListingEntry::Asset(Asset::new("org/maven-metadata.xml")),
                ListingEntry::Asset(Asset::new("org/acme/bare.jar").with_id("a1")),
                ListingEntry::Asset(jar()),
                ListingEntry::Asset(Asset::new("com/other/x.jar").with_id("a2")),
            ])
        });
        let repository = Arc::new(SyncRepository::new(Arc::new(client)));
        let handler = handler(MockFs::new(), TransferOptions::default(), Some("^org/"));
        let (sink, mut rx) = sink();

        let mut job = Job::enumerate_tree(Arc::clone(&repository), "/");
        handler.handle(&mut job, &sink).await.unwrap();

        let actions: Vec<(JobAction, String)> = submitted(&mut rx)
            .iter()
            .map(|j| (j.action(), j.subject()))
            .collect();
        assert_eq!(
            actions,
            vec![
                (JobAction::EnumerateTree, "releases:org/acme".to_string()),
                (JobAction::FetchAssetInfo, "org/acme/bare.jar".to_string()),
            ]
        );
        assert_eq!(repository.snapshot().await, vec![jar()]);
    }

    #[tokio::test]
    async fn test_fetch_info_appends_enriched_asset() {
        let mut client = named_client("releases");
        client.expect_fetch_asset_info().returning(|asset| {
            asset.attach_attributes(AssetAttributes::default());
            Ok(())
        });
        let repository = Arc::new(SyncRepository::new(Arc::new(client)));
        let handler = handler(MockFs::new(), TransferOptions::default(), None);
        let (sink, _rx) = sink();

        let mut job = Job::fetch_asset_info(Arc::clone(&repository), Asset::new("a.jar").with_id("1"));
        handler.handle(&mut job, &sink).await.unwrap();

        let inventory = repository.snapshot().await;
        assert_eq!(inventory.len(), 1);
        assert!(inventory[0].attributes_loaded());
    }

    #[tokio::test]
    async fn test_download_chains_exactly_one_upload() {
        let mut source = named_client("src");
        source
            .expect_download()
            .withf(|_, path| path.ends_with("org_acme_lib_1.0_lib-1.0.jar"))
            .times(1)
            .returning(|_, _| Ok(()));
        let source = Arc::new(SyncRepository::new(Arc::new(source)));
        let destination = Arc::new(SyncRepository::new(Arc::new(named_client("dst"))));
        let handler = handler(MockFs::new(), TransferOptions::default(), None);
        let (sink, mut rx) = sink();

        let mut job = Job::download(Arc::clone(&source), destination, jar());
        handler.handle(&mut job, &sink).await.unwrap();

        let jobs = submitted(&mut rx);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].action(), JobAction::UploadAsset);
        let staged = jobs[0].asset().unwrap();
        assert!(staged.is_downloaded());
        assert_eq!(
            staged.staging_path(),
            Some(PathBuf::from("/stage/org_acme_lib_1.0_lib-1.0.jar").as_path())
        );
        assert_eq!(source.downloaded(), 1);
    }

    #[tokio::test]
    async fn test_download_without_upload_cleans_up() {
        let mut source = named_client("src");
        source.expect_download().returning(|_, _| Ok(()));
        let source = Arc::new(SyncRepository::new(Arc::new(source)));
        let destination = Arc::new(SyncRepository::new(Arc::new(named_client("dst"))));
        let (sink, mut rx) = sink();

        let skip_upload = handler(
            MockFs::new(),
            TransferOptions {
                skip_upload: true,
                keep_staging: false,
            },
            None,
        );
        let mut job = Job::download(Arc::clone(&source), Arc::clone(&destination), jar());
        skip_upload.handle(&mut job, &sink).await.unwrap();
        let jobs = submitted(&mut rx);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].action(), JobAction::DeleteStaged);

        let keep = handler(
            MockFs::new(),
            TransferOptions {
                skip_upload: true,
                keep_staging: true,
            },
            None,
        );
        let mut job = Job::download(source, destination, jar());
        keep.handle(&mut job, &sink).await.unwrap();
        assert!(submitted(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_upload_chains_exactly_one_delete() {
        let mut destination = named_client("dst");
        destination
            .expect_upload()
            .withf(|path, asset| path.ends_with("x.jar") && asset.name() == "org/acme/lib/1.0/lib-1.0.jar")
            .times(1)
            .returning(|_, _| Ok(()));
        let destination = Arc::new(SyncRepository::new(Arc::new(destination)));
        let handler = handler(MockFs::new(), TransferOptions::default(), None);
        let (sink, mut rx) = sink();

        let mut asset = jar();
        asset.mark_downloaded(PathBuf::from("/stage/x.jar"));
        let mut job = Job::upload(Arc::clone(&destination), asset);
        handler.handle(&mut job, &sink).await.unwrap();

        let jobs = submitted(&mut rx);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].action(), JobAction::DeleteStaged);
        assert_eq!(destination.uploaded(), 1);
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_asset_for_retry() {
        let mut destination = named_client("dst");
        destination
            .expect_upload()
            .returning(|_, _| Err(BridgeError::Transient("503".into())));
        let destination = Arc::new(SyncRepository::new(Arc::new(destination)));
        let handler = handler(MockFs::new(), TransferOptions::default(), None);
        let (sink, mut rx) = sink();

        let mut job = Job::upload(Arc::clone(&destination), jar());
        assert!(handler.handle(&mut job, &sink).await.is_err());

        assert_eq!(job.subject(), "org/acme/lib/1.0/lib-1.0.jar");
        assert!(submitted(&mut rx).is_empty());
        assert_eq!(destination.uploaded(), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_staged_file() {
        let mut fs = MockFs::new();
        fs.expect_delete_file()
            .withf(|path| path.ends_with("x.jar"))
            .times(1)
            .returning(|_| Ok(()));
        let handler = handler(fs, TransferOptions::default(), None);
        let (sink, mut rx) = sink();

        let mut asset = jar();
        asset.mark_downloaded(PathBuf::from("/stage/x.jar"));
        let mut job = Job::delete_staged(asset);
        handler.handle(&mut job, &sink).await.unwrap();

        let released = job.asset().unwrap();
        assert!(!released.is_downloaded());
        assert!(!released.attributes_loaded());
        assert!(submitted(&mut rx).is_empty());
    }
}

//! End-to-end mirroring runs against in-memory repositories.

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    Asset, AssetAttributes, AssetHashes, BridgeError, HashAlgorithm, ListingEntry,
    MavenCoordinates, RepositoryClient, SystemClock,
};
use core_runtime::config::{EndpointConfig, MirrorConfig, MirrorConfigBuilder};
use core_sync::{MirrorCoordinator, StagingArea, SyncError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

// ============================================================================
// In-memory repository
// ============================================================================

#[derive(Clone)]
struct StoredFile {
    hashes: AssetHashes,
    content: Vec<u8>,
}

/// Serves files from a map. Root-level files are listed with their
/// attributes, nested ones only by id so they go through attribute lookup.
struct MemoryRepository {
    name: &'static str,
    files: Mutex<BTreeMap<String, StoredFile>>,
    exists: bool,
    lookups_fail: bool,
    lookups: Mutex<u32>,
    upload_failures: Mutex<u32>,
    uploads: Mutex<Vec<String>>,
}

impl MemoryRepository {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            files: Mutex::new(BTreeMap::new()),
            exists: true,
            lookups_fail: false,
            lookups: Mutex::new(0),
            upload_failures: Mutex::new(0),
            uploads: Mutex::new(Vec::new()),
        }
    }

    fn missing(name: &'static str) -> Self {
        Self {
            exists: false,
            ..Self::new(name)
        }
    }

    fn without_attributes(name: &'static str) -> Self {
        Self {
            lookups_fail: true,
            ..Self::new(name)
        }
    }

    async fn put(&self, name: &str, sha1: &str) {
        self.files.lock().await.insert(
            name.to_string(),
            StoredFile {
                hashes: AssetHashes::new().with(HashAlgorithm::Sha1, sha1),
                content: format!("content of {name}").into_bytes(),
            },
        );
    }

    async fn fail_next_uploads(&self, count: u32) {
        *self.upload_failures.lock().await = count;
    }

    async fn names(&self) -> Vec<String> {
        self.files.lock().await.keys().cloned().collect()
    }

    async fn content(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().await.get(name).map(|f| f.content.clone())
    }

    async fn uploads(&self) -> Vec<String> {
        self.uploads.lock().await.clone()
    }

    fn attributes(name: &str, file: &StoredFile) -> AssetAttributes {
        AssetAttributes {
            hashes: file.hashes.clone(),
            maven: Some(MavenCoordinates {
                group_id: Some("org.acme".to_string()),
                artifact_id: Some(name.rsplit('/').next().unwrap_or(name).to_string()),
                version: Some("1.0".to_string()),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl RepositoryClient for MemoryRepository {
    fn repository(&self) -> &str {
        self.name
    }

    async fn list_assets(&self, node: &str) -> BridgeResult<Vec<ListingEntry>> {
        if !self.exists {
            return Err(BridgeError::NotFound(format!("repository {}", self.name)));
        }

        let files = self.files.lock().await;
        let mut folders = BTreeSet::new();
        let mut entries = Vec::new();

        for (name, file) in files.iter() {
            if node == "/" {
                match name.split_once('/') {
                    Some((folder, _)) => {
                        folders.insert(folder.to_string());
                    }
                    None => entries.push(ListingEntry::Asset(
                        Asset::new(name.as_str()).with_attributes(Self::attributes(name, file)),
                    )),
                }
            } else if name.starts_with(&format!("{node}/")) {
                entries.push(ListingEntry::Asset(Asset::new(name.as_str()).with_id(name.as_str())));
            }
        }

        entries.extend(folders.into_iter().map(|id| ListingEntry::Node { id }));
        Ok(entries)
    }

    async fn fetch_asset_info(&self, asset: &mut Asset) -> BridgeResult<()> {
        *self.lookups.lock().await += 1;
        let id = asset.require_id()?.to_string();
        if self.lookups_fail {
            return Err(BridgeError::MetadataUnavailable(format!("readAsset {id}")));
        }
        let files = self.files.lock().await;
        let file = files
            .get(&id)
            .ok_or_else(|| BridgeError::MetadataUnavailable(id.clone()))?;
        asset.attach_attributes(Self::attributes(&id, file));
        Ok(())
    }

    async fn download(&self, asset: &Asset, destination: &Path) -> BridgeResult<()> {
        let content = self
            .content(asset.name())
            .await
            .ok_or_else(|| BridgeError::NotFound(asset.name().to_string()))?;
        tokio::fs::write(destination, content).await?;
        Ok(())
    }

    async fn upload(&self, source: &Path, asset: &Asset) -> BridgeResult<()> {
        {
            let mut failures = self.upload_failures.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(BridgeError::Transient("502 Bad Gateway".to_string()));
            }
        }

        asset.group_id()?;
        let content = tokio::fs::read(source).await?;
        self.files.lock().await.insert(
            asset.name().to_string(),
            StoredFile {
                hashes: asset.hashes().clone(),
                content,
            },
        );
        self.uploads.lock().await.push(asset.name().to_string());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    source: Arc<MemoryRepository>,
    destination: Arc<MemoryRepository>,
    staging_root: PathBuf,
    _dir: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let source = Arc::new(MemoryRepository::new("releases"));
        source.put("org/a.jar", "aaa").await;
        source.put("org/a.jar.sha1", "ignored").await;
        source.put("org/maven-metadata.xml", "meta").await;
        source.put("com/b.jar", "bbb").await;
        source.put("root.war", "ccc").await;

        let destination = Arc::new(MemoryRepository::new("mirror"));
        destination.put("org/a.jar", "aaa").await;

        Self::with(source, destination)
    }

    fn with(source: Arc<MemoryRepository>, destination: Arc<MemoryRepository>) -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            source,
            destination,
            staging_root: dir.path().join("staging"),
            _dir: dir,
        }
    }

    fn config() -> MirrorConfigBuilder {
        MirrorConfig::builder()
            .source(EndpointConfig::new("http://src.local/releases"))
            .destination(EndpointConfig::new("http://dst.local/mirror"))
            .workers(3)
            .queue_buffer(2)
            .idle_grace(Duration::from_millis(100))
    }

    fn coordinator(&self, config: MirrorConfig) -> MirrorCoordinator {
        MirrorCoordinator::new(
            &config,
            self.source.clone(),
            self.destination.clone(),
            StagingArea::new(&self.staging_root, Arc::new(TokioFileSystem::new())),
            Arc::new(SystemClock),
        )
        .unwrap()
    }

    fn staged_files(&self) -> Vec<String> {
        match std::fs::read_dir(&self.staging_root) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_mirror_run() {
    let harness = Harness::new().await;
    let coordinator = harness.coordinator(Harness::config().build().unwrap());

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.found_source, 3);
    assert_eq!(summary.found_destination, 1);
    assert_eq!(summary.missing, 2);
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.failed, 0);

    let mut uploads = harness.destination.uploads().await;
    uploads.sort();
    assert_eq!(uploads, vec!["com/b.jar", "root.war"]);
    assert_eq!(
        harness.destination.content("com/b.jar").await.unwrap(),
        b"content of com/b.jar".to_vec()
    );
    assert!(harness.staged_files().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_run_finds_nothing_missing() {
    let harness = Harness::new().await;

    let first = harness.coordinator(Harness::config().build().unwrap()).run().await.unwrap();
    assert_eq!(first.missing, 2);

    let second = harness.coordinator(Harness::config().build().unwrap()).run().await.unwrap();
    assert_eq!(second.found_destination, 3);
    assert_eq!(second.missing, 0);
    assert_eq!(second.downloaded, 0);
    assert_eq!(harness.destination.uploads().await.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_repository_fails_run() {
    let harness = Harness::with(
        Arc::new(MemoryRepository::missing("nope")),
        Arc::new(MemoryRepository::new("mirror")),
    );

    let result = harness.coordinator(Harness::config().build().unwrap()).run().await;

    match result {
        Err(SyncError::Enumeration { repository, .. }) => assert_eq!(repository, "nope"),
        other => panic!("expected enumeration failure, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transient_upload_failures_are_retried() {
    let harness = Harness::new().await;
    harness.destination.fail_next_uploads(3).await;

    let summary = harness
        .coordinator(Harness::config().workers(1).build().unwrap())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.failed, 0);
    assert!(harness.staged_files().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_skip_upload_only_downloads() {
    let harness = Harness::new().await;

    let summary = harness
        .coordinator(Harness::config().skip_upload(true).build().unwrap())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.uploaded, 0);
    assert!(harness.destination.uploads().await.is_empty());
    assert!(harness.staged_files().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_keep_staging_leaves_files() {
    let harness = Harness::new().await;

    harness
        .coordinator(Harness::config().skip_upload(true).keep_staging(true).build().unwrap())
        .run()
        .await
        .unwrap();

    let mut staged = harness.staged_files();
    staged.sort();
    assert_eq!(staged, vec!["com_b.jar", "root.war"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_skip_download_stops_after_diff() {
    let harness = Harness::new().await;

    let summary = harness
        .coordinator(Harness::config().skip_download(true).build().unwrap())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.missing, 2);
    assert_eq!(summary.downloaded, 0);
    assert!(!harness.staging_root.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_path_filter_limits_inventory() {
    let harness = Harness::new().await;

    let summary = harness
        .coordinator(Harness::config().path_filter("^com/").build().unwrap())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.found_source, 1);
    assert_eq!(summary.missing, 1);
    assert_eq!(harness.destination.uploads().await, vec!["com/b.jar"]);
    assert_eq!(
        harness.destination.names().await,
        vec!["com/b.jar".to_string(), "org/a.jar".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_before_run() {
    let harness = Harness::new().await;
    let coordinator = harness.coordinator(Harness::config().build().unwrap());

    coordinator.shutdown_handle().shutdown();

    assert!(matches!(coordinator.run().await, Err(SyncError::Cancelled)));
    assert!(harness.destination.uploads().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_attribute_lookup_is_counted() {
    let source = Arc::new(MemoryRepository::without_attributes("releases"));
    source.put("org/a.jar", "aaa").await;
    let harness = Harness::with(source, Arc::new(MemoryRepository::new("mirror")));

    let summary = harness
        .coordinator(Harness::config().build().unwrap())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.found_source, 0);
    assert_eq!(summary.missing, 0);
    assert_eq!(summary.failed, 1);
    assert!(summary.has_failures());
    assert_eq!(*harness.source.lookups.lock().await, 4);
    assert!(harness.destination.uploads().await.is_empty());
}

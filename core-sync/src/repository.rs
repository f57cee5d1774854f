//! # Repository Inventory
//!
//! Pairs a [`RepositoryClient`] with the inventory collected from it and the
//! transfer counters for that side of the mirror.
//!
//! ## Overview
//!
//! Enumeration workers append to the inventory concurrently under the write
//! half of a `RwLock`. The diff engine reads it only once enumeration has
//! finished, so readers never observe a partial listing.

use bridge_traits::{Asset, RepositoryClient};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

/// One side of a mirroring run
pub struct SyncRepository {
    client: Arc<dyn RepositoryClient>,
    inventory: RwLock<Vec<Asset>>,
    downloaded: AtomicU64,
    uploaded: AtomicU64,
}

impl SyncRepository {
    pub fn new(client: Arc<dyn RepositoryClient>) -> Self {
        Self {
            client,
            inventory: RwLock::new(Vec::new()),
            downloaded: AtomicU64::new(0),
            uploaded: AtomicU64::new(0),
        }
    }

    /// Repository name as reported by the client
    pub fn name(&self) -> &str {
        self.client.repository()
    }

    pub fn client(&self) -> &dyn RepositoryClient {
        self.client.as_ref()
    }

    /// Append an enumerated asset
    pub async fn append(&self, asset: Asset) {
        self.inventory.write().await.push(asset);
    }

    /// Read access to the collected assets, in discovery order
    pub async fn inventory(&self) -> RwLockReadGuard<'_, Vec<Asset>> {
        self.inventory.read().await
    }

    /// Copy of the collected assets
    pub async fn snapshot(&self) -> Vec<Asset> {
        self.inventory.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inventory.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inventory.read().await.is_empty()
    }

    pub fn record_download(&self) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload(&self) {
        self.uploaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Assets downloaded from this repository
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// Assets uploaded to this repository
    pub fn uploaded(&self) -> u64 {
        self.uploaded.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for SyncRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRepository")
            .field("name", &self.name())
            .field("downloaded", &self.downloaded())
            .field("uploaded", &self.uploaded())
            .finish_non_exhaustive()
    }
}

//! Repository Client Abstraction
//!
//! The narrow surface the sync engine needs from an artifact-repository
//! server. Implementations live in provider crates (`provider-nexus`).

use async_trait::async_trait;
use std::path::Path;

use crate::asset::{Asset, AssetHashes};
use crate::error::Result;

/// One entry of a tree listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEntry {
    /// A folder or component that has to be listed in turn
    Node { id: String },
    /// A concrete file
    Asset(Asset),
}

/// Client for one repository on one server
///
/// # Example
///
/// ```ignore
/// use bridge_traits::repository::{ListingEntry, RepositoryClient};
///
/// async fn count_root(client: &dyn RepositoryClient) -> Result<usize> {
///     let entries = client.list_assets(client.root_node()).await?;
///     Ok(entries.iter().filter(|e| matches!(e, ListingEntry::Asset(_))).count())
/// }
/// ```
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Repository name, used in logs and reports
    fn repository(&self) -> &str;

    /// Node enumeration starts from
    fn root_node(&self) -> &str {
        "/"
    }

    /// List the direct children of `node`
    ///
    /// # Errors
    ///
    /// - `NotFound` if the repository or node does not exist
    /// - `Transient` on network failure
    /// - `Malformed` if the server answer cannot be interpreted
    async fn list_assets(&self, node: &str) -> Result<Vec<ListingEntry>>;

    /// Attach checksums and coordinates to `asset`
    async fn fetch_asset_info(&self, asset: &mut Asset) -> Result<()>;

    /// Digests known for `asset`
    ///
    /// The default returns whatever is already attached.
    async fn fetch_asset_hashes(&self, asset: &Asset) -> Result<AssetHashes> {
        Ok(asset.hashes().clone())
    }

    /// Download `asset` into the file at `destination`
    async fn download(&self, asset: &Asset, destination: &Path) -> Result<()>;

    /// Upload the staged file at `source` using the coordinates of `asset`
    async fn upload(&self, source: &Path, asset: &Asset) -> Result<()>;
}

//! Local staging area between download and upload.

use bridge_traits::{Asset, FileSystemAccess};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, SyncError};

/// Directory staged files are written to, one file per asset
#[derive(Clone)]
pub struct StagingArea {
    root: PathBuf,
    fs: Arc<dyn FileSystemAccess>,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staging file for `asset`, named by its human-readable name
    pub fn path_for(&self, asset: &Asset) -> PathBuf {
        asset.staging_file(&self.root)
    }

    /// Make sure the staging directory exists
    pub async fn prepare(&self) -> Result<()> {
        self.fs.create_dir_all(&self.root).await.map_err(|e| {
            SyncError::Staging(format!("cannot create {}: {}", self.root.display(), e))
        })?;
        debug!(path = %self.root.display(), "Staging directory ready");
        Ok(())
    }

    /// Delete one staged file
    pub async fn remove(&self, path: &Path) -> Result<()> {
        self.fs.delete_file(path).await?;
        Ok(())
    }

    /// Remove the staging directory and everything left in it
    pub async fn cleanup(&self) -> Result<()> {
        if !self.fs.exists(&self.root).await? {
            return Ok(());
        }
        self.fs.delete_dir_all(&self.root).await?;
        info!(path = %self.root.display(), "Removed staging directory");
        Ok(())
    }
}

impl std::fmt::Debug for StagingArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingArea")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

//! Staging file system on top of `tokio::fs`

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Tokio-based file system implementation
///
/// Missing paths are reported as [`BridgeError::NotFound`] so callers can
/// tell them apart from other I/O failures.
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    /// Parent directory for staging areas when none is configured:
    /// `/var/tmp` on Linux, the user cache directory elsewhere.
    pub fn default_staging_prefix() -> PathBuf {
        if cfg!(target_os = "linux") {
            PathBuf::from("/var/tmp")
        } else {
            dirs::cache_dir().unwrap_or_else(std::env::temp_dir)
        }
    }
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> BridgeError + '_ {
    move |e| match e.kind() {
        ErrorKind::NotFound => BridgeError::NotFound(path.display().to_string()),
        _ => BridgeError::Io(e),
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(io_error(path))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(io_error(path))?;
        debug!(path = %path.display(), "Created directory");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await.map_err(io_error(path))?;
        debug!(path = %path.display(), "Deleted staged file");
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).await.map_err(io_error(path))?;
        debug!(path = %path.display(), "Deleted directory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_staging_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();
        let root = dir.path().join("nexus-mirror-run");
        let staged = root.join("org_acme_lib_1.0_lib-1.0.jar");

        fs.create_dir_all(&root).await.unwrap();
        tokio::fs::write(&staged, b"jar").await.unwrap();
        assert!(fs.exists(&staged).await.unwrap());

        fs.delete_file(&staged).await.unwrap();
        assert!(!fs.exists(&staged).await.unwrap());

        fs.delete_dir_all(&root).await.unwrap();
        assert!(!fs.exists(&root).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();
        let err = fs.delete_file(&dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_default_staging_prefix_is_absolute() {
        assert!(TokioFileSystem::default_staging_prefix().is_absolute());
    }
}

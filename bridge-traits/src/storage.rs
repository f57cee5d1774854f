//! Staging File System Abstraction
//!
//! Directory and file lifecycle operations the staging area relies on.
//! Writing staged content is left to the repository client's download.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// File system access trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn reset(fs: &dyn FileSystemAccess, root: &Path) -> Result<()> {
///     if fs.exists(root).await? {
///         fs.delete_dir_all(root).await?;
///     }
///     fs.create_dir_all(root).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file
    ///
    /// Fails with `NotFound` if there is nothing to delete.
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and all its contents
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;
}

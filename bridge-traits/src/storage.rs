//! Storage Abstractions
//!
//! Narrow contracts for everything the playback core needs to know about
//! storage: whether a chapter was downloaded, whether that file is still on
//! disk, and how to turn a backend storage path into a streamable URL.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File system access trait
///
/// Only the existence check is needed by the core. Recorded download paths are
/// never trusted without asking the file system, since the OS may purge app
/// storage behind the download manager's back.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn still_there(fs: &dyn FileSystemAccess, path: &Path) -> bool {
///     fs.exists(path).await.unwrap_or(false)
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Size of the file in bytes, when the platform can report it
    async fn file_size(&self, _path: &Path) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Download manager trait
///
/// Owned by an unrelated subsystem; the core only asks where a finished
/// download lives.
#[async_trait]
pub trait DownloadManager: Send + Sync {
    /// Recorded local path of a downloaded chapter, or `None` if the chapter
    /// was never downloaded.
    async fn downloaded_chapter_path(
        &self,
        content_id: &str,
        chapter_id: &str,
    ) -> Result<Option<PathBuf>>;
}

/// Storage URL resolver trait
///
/// Converts a backend storage path (bucket key) into a public or signed URL
/// the engine can stream.
#[async_trait]
pub trait StorageUrlResolver: Send + Sync {
    async fn public_url_for(&self, storage_path: &str) -> Result<String>;
}

//! Chapter source resolver.
//!
//! Picks what the engine should open for a chapter, in order:
//!
//! 1. the download manager's file, if the file system confirms it exists
//! 2. the chapter's own local-file hint, if it exists
//! 3. the chapter's remote URL
//! 4. a URL built from the chapter's storage path
//!
//! Recorded paths are never trusted without an existence check; the OS purges
//! app storage behind the download manager's back. When nothing applies the
//! result is [`PlaybackError::SourceUnresolved`], which callers treat as
//! terminal for the attempt.

use crate::error::{PlaybackError, Result};
use crate::session::Chapter;
use bridge_traits::{AudioSource, DownloadManager, FileSystemAccess, StorageUrlResolver};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{redact_locator, strip_path};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub source: AudioSource,
    pub is_local: bool,
}

impl ResolvedSource {
    fn local(path: PathBuf) -> Self {
        Self {
            source: AudioSource::LocalFile { path },
            is_local: true,
        }
    }

    fn remote(url: String) -> Self {
        Self {
            source: AudioSource::RemoteStream { url },
            is_local: false,
        }
    }
}

#[derive(Clone, Default)]
pub struct ChapterSourceResolver {
    downloads: Option<Arc<dyn DownloadManager>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    storage_urls: Option<Arc<dyn StorageUrlResolver>>,
}

impl ChapterSourceResolver {
    pub fn new(
        downloads: Option<Arc<dyn DownloadManager>>,
        file_system: Option<Arc<dyn FileSystemAccess>>,
        storage_urls: Option<Arc<dyn StorageUrlResolver>>,
    ) -> Self {
        Self {
            downloads,
            file_system,
            storage_urls,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            config.download_manager.clone(),
            config.file_system.clone(),
            config.storage_url_resolver.clone(),
        )
    }

    pub async fn resolve(&self, content_id: &str, chapter: &Chapter) -> Result<ResolvedSource> {
        if let Some(path) = self.downloaded_path(content_id, chapter).await {
            debug!(chapter = %chapter.id, file = %file_name(&path), "Using downloaded file");
            return Ok(ResolvedSource::local(path));
        }

        if let Some(hint) = &chapter.local_file {
            if self.verified(hint).await {
                debug!(chapter = %chapter.id, file = %file_name(hint), "Using local file hint");
                return Ok(ResolvedSource::local(hint.clone()));
            }
        }

        if let Some(url) = &chapter.remote_url {
            debug!(chapter = %chapter.id, url = %redact_locator(url), "Streaming remote URL");
            return Ok(ResolvedSource::remote(url.clone()));
        }

        if let (Some(storage_path), Some(storage_urls)) = (&chapter.storage_path, &self.storage_urls) {
            match storage_urls.public_url_for(storage_path).await {
                Ok(url) => {
                    debug!(chapter = %chapter.id, url = %redact_locator(&url), "Streaming from storage path");
                    return Ok(ResolvedSource::remote(url));
                }
                Err(err) => {
                    warn!(chapter = %chapter.id, error = %err, "Storage URL resolution failed");
                }
            }
        }

        warn!(chapter = %chapter.id, "No playable source");
        Err(PlaybackError::SourceUnresolved {
            chapter_id: chapter.id.clone(),
        })
    }

    async fn downloaded_path(&self, content_id: &str, chapter: &Chapter) -> Option<PathBuf> {
        let downloads = self.downloads.as_ref()?;
        let path = match downloads.downloaded_chapter_path(content_id, &chapter.id).await {
            Ok(path) => path?,
            Err(err) => {
                warn!(chapter = %chapter.id, error = %err, "Download lookup failed");
                return None;
            }
        };

        if self.verified(&path).await {
            Some(path)
        } else {
            warn!(chapter = %chapter.id, file = %file_name(&path), "Recorded download missing on disk");
            None
        }
    }

    /// Unverifiable paths (no file system bridge, lookup error) count as missing.
    async fn verified(&self, path: &Path) -> bool {
        let Some(fs) = self.file_system.as_ref() else {
            return false;
        };
        match fs.exists(path).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(file = %file_name(path), error = %err, "Existence check failed");
                false
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    strip_path(&path.to_string_lossy()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::BridgeError;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Downloads {}

        #[async_trait]
        impl DownloadManager for Downloads {
            async fn downloaded_chapter_path(
                &self,
                content_id: &str,
                chapter_id: &str,
            ) -> bridge_traits::error::Result<Option<PathBuf>>;
        }
    }

    mock! {
        pub Fs {}

        #[async_trait]
        impl FileSystemAccess for Fs {
            async fn exists(&self, path: &Path) -> bridge_traits::error::Result<bool>;
            async fn file_size(&self, path: &Path) -> bridge_traits::error::Result<Option<u64>>;
        }
    }

    mock! {
        pub Urls {}

        #[async_trait]
        impl StorageUrlResolver for Urls {
            async fn public_url_for(&self, storage_path: &str) -> bridge_traits::error::Result<String>;
        }
    }

    fn chapter() -> Chapter {
        Chapter::new("ch-3", "Three")
            .with_remote_url("https://cdn.example.com/book/ch3.mp3")
            .with_storage_path("audio/book/ch3.mp3")
    }

    fn fs_with(existing: &'static [&'static str]) -> MockFs {
        let mut fs = MockFs::new();
        fs.expect_exists()
            .returning(move |path| Ok(existing.iter().any(|p| Path::new(p) == path)));
        fs
    }

    #[tokio::test]
    async fn prefers_verified_download() {
        let mut downloads = MockDownloads::new();
        downloads
            .expect_downloaded_chapter_path()
            .with(eq("book"), eq("ch-3"))
            .returning(|_, _| Ok(Some(PathBuf::from("/downloads/book/ch3.mp3"))));

        let resolver = ChapterSourceResolver::new(
            Some(Arc::new(downloads)),
            Some(Arc::new(fs_with(&["/downloads/book/ch3.mp3"]))),
            None,
        );

        let resolved = resolver.resolve("book", &chapter()).await.unwrap();
        assert!(resolved.is_local);
        assert_eq!(
            resolved.source,
            AudioSource::LocalFile {
                path: PathBuf::from("/downloads/book/ch3.mp3")
            }
        );
    }

    #[tokio::test]
    async fn missing_download_falls_back_to_remote() {
        let mut downloads = MockDownloads::new();
        downloads
            .expect_downloaded_chapter_path()
            .returning(|_, _| Ok(Some(PathBuf::from("/downloads/purged.mp3"))));

        let resolver = ChapterSourceResolver::new(
            Some(Arc::new(downloads)),
            Some(Arc::new(fs_with(&[]))),
            None,
        );

        let resolved = resolver.resolve("book", &chapter()).await.unwrap();
        assert!(!resolved.is_local);
        assert_eq!(resolved.source.locator(), "https://cdn.example.com/book/ch3.mp3");
    }

    #[tokio::test]
    async fn local_hint_is_verified() {
        let resolver = ChapterSourceResolver::new(None, Some(Arc::new(fs_with(&["/sd/ch3.mp3"]))), None);

        let hinted = chapter().with_local_file("/sd/ch3.mp3");
        assert!(resolver.resolve("book", &hinted).await.unwrap().is_local);

        let stale = chapter().with_local_file("/sd/gone.mp3");
        assert!(!resolver.resolve("book", &stale).await.unwrap().is_local);
    }

    #[tokio::test]
    async fn storage_path_builds_url() {
        let mut urls = MockUrls::new();
        urls.expect_public_url_for()
            .with(eq("audio/book/ch3.mp3"))
            .returning(|path| Ok(format!("https://storage.example.com/{}?sig=1", path)));

        let resolver = ChapterSourceResolver::new(None, None, Some(Arc::new(urls)));
        let mut chapter = chapter();
        chapter.remote_url = None;

        let resolved = resolver.resolve("book", &chapter).await.unwrap();
        assert_eq!(
            resolved.source,
            AudioSource::RemoteStream {
                url: "https://storage.example.com/audio/book/ch3.mp3?sig=1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unresolvable_chapter_is_terminal() {
        let mut urls = MockUrls::new();
        urls.expect_public_url_for()
            .returning(|_| Err(BridgeError::OperationFailed("bucket offline".to_string())));

        let resolver = ChapterSourceResolver::new(None, None, Some(Arc::new(urls)));
        let mut chapter = chapter();
        chapter.remote_url = None;

        let err = resolver.resolve("book", &chapter).await.unwrap_err();
        assert!(matches!(err, PlaybackError::SourceUnresolved { ref chapter_id } if chapter_id == "ch-3"));
        assert!(!err.is_transient());

        let bare = Chapter::new("ch-9", "Nine");
        assert!(ChapterSourceResolver::default().resolve("book", &bare).await.is_err());
    }
}

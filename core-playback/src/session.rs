//! Playback session: what is currently loaded.

use crate::error::{PlaybackError, Result};
use bridge_traits::NowPlaying;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One playable unit of a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    /// Catalog duration; often a placeholder until the engine parses the file.
    pub duration: Option<Duration>,
    /// Playable regardless of ownership.
    pub is_preview: bool,
    /// Direct stream URL.
    pub remote_url: Option<String>,
    /// Backend storage key, turned into a URL by the storage resolver.
    pub storage_path: Option<String>,
    /// Where the file was downloaded, if the caller knows. Verified before use.
    pub local_file: Option<PathBuf>,
}

impl Chapter {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration: None,
            is_preview: false,
            remote_url: None,
            storage_path: None,
            local_file: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_preview(mut self, is_preview: bool) -> Self {
        self.is_preview = is_preview;
        self
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<String>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn with_local_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_file = Some(path.into());
        self
    }
}

/// Content item (book, album, podcast) the chapters belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub album: Option<String>,
    pub artwork: Option<String>,
}

impl ContentInfo {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: None,
            album: None,
            artwork: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }
}

/// The single mutable "what is loaded" context.
///
/// `current_index` always points into a non-empty chapter list; an empty list
/// never forms a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    content: ContentInfo,
    chapters: Vec<Chapter>,
    current_index: usize,
    speed: f32,
}

impl PlaybackSession {
    pub fn new(content: ContentInfo, chapters: Vec<Chapter>, index: usize, speed: f32) -> Result<Self> {
        if chapters.is_empty() {
            return Err(PlaybackError::EmptyChapterList);
        }
        if index >= chapters.len() {
            return Err(PlaybackError::InvalidChapterIndex {
                index,
                len: chapters.len(),
            });
        }

        Ok(Self {
            content,
            chapters,
            current_index: index,
            speed,
        })
    }

    pub fn content(&self) -> &ContentInfo {
        &self.content
    }

    pub fn content_id(&self) -> &str {
        &self.content.id
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_chapter(&self) -> &Chapter {
        &self.chapters[self.current_index]
    }

    pub fn next_index(&self) -> Option<usize> {
        let next = self.current_index + 1;
        (next < self.chapters.len()).then_some(next)
    }

    pub fn previous_index(&self) -> Option<usize> {
        self.current_index.checked_sub(1)
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn set_current_index(&mut self, index: usize) -> Result<()> {
        if index >= self.chapters.len() {
            return Err(PlaybackError::InvalidChapterIndex {
                index,
                len: self.chapters.len(),
            });
        }
        self.current_index = index;
        Ok(())
    }

    /// Now-playing metadata for the current chapter.
    ///
    /// Extras carry the queue position so hosts can render "Chapter 3 of 12".
    pub fn now_playing(&self) -> NowPlaying {
        let chapter = self.current_chapter();
        NowPlaying::new(chapter.id.clone(), chapter.title.clone())
            .with_album(
                self.content
                    .album
                    .clone()
                    .or_else(|| Some(self.content.title.clone())),
            )
            .with_artist(self.content.author.clone())
            .with_duration(chapter.duration)
            .with_artwork(self.content.artwork.clone())
            .with_extra("content_id", self.content.id.clone())
            .with_extra("chapter_id", chapter.id.clone())
            .with_extra("chapter_index", self.current_index.to_string())
            .with_extra("chapter_count", self.chapters.len().to_string())
    }
}

//! Host media session (lock screen, notification shade, headset buttons).
//!
//! The host renders whatever the core last published. Some hosts cache the
//! duration at the moment the controls are first drawn, so the core pushes the
//! transport state again after every metadata change.

use crate::error::Result;
use crate::playback::ProcessingState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Now-playing metadata shown by the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NowPlaying {
    /// Stable identifier for the playing item (chapter id).
    pub id: String,
    pub title: String,
    pub album: Option<String>,
    pub artist: Option<String>,
    /// Best-known duration. `None` until the engine has parsed the source.
    pub duration: Option<Duration>,
    /// Artwork URL or file path.
    pub artwork: Option<String>,
    /// Extra key/value pairs (queue position, content id, ...).
    pub extras: BTreeMap<String, String>,
}

impl NowPlaying {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_album(mut self, album: Option<String>) -> Self {
        self.album = album;
        self
    }

    pub fn with_artist(mut self, artist: Option<String>) -> Self {
        self.artist = artist;
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_artwork(mut self, artwork: Option<String>) -> Self {
        self.artwork = artwork;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}

/// Controls the host should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaControl {
    Play,
    Pause,
    Stop,
    SkipToPrevious,
    SkipToNext,
    Seek,
    SetSpeed,
}

/// Transport state mirrored to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportState {
    pub playing: bool,
    pub processing: ProcessingState,
    pub position: Duration,
    pub buffered_position: Duration,
    pub speed: f32,
    pub controls: Vec<MediaControl>,
    /// Index of the playing chapter within the loaded content.
    pub queue_index: Option<usize>,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            playing: false,
            processing: ProcessingState::Idle,
            position: Duration::ZERO,
            buffered_position: Duration::ZERO,
            speed: 1.0,
            controls: Vec::new(),
            queue_index: None,
        }
    }
}

/// Commands issued by the host (lock screen buttons, headset, car display).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    Play,
    Pause,
    Stop,
    Seek(Duration),
    SkipToNext,
    SkipToPrevious,
    SetSpeed(f32),
}

/// Platform media session.
#[async_trait]
pub trait MediaSessionHost: Send + Sync {
    /// Replace the now-playing metadata.
    async fn set_metadata(&self, metadata: NowPlaying) -> Result<()>;

    /// Replace the transport state.
    async fn set_transport_state(&self, state: TransportState) -> Result<()>;

    /// Remove the now-playing entry entirely.
    async fn clear(&self) -> Result<()>;

    /// Forward a named event to whatever listens on the host side.
    ///
    /// Used when the interactive layer may be suspended and the host is the
    /// only party still reachable.
    async fn send_custom_event(
        &self,
        _name: &str,
        _payload: BTreeMap<String, String>,
    ) -> Result<()> {
        Ok(())
    }

    /// Subscribe to inbound remote commands.
    async fn subscribe_commands(&self) -> Result<Box<dyn RemoteCommandStream>>;
}

/// Stream of [`RemoteCommand`]s.
#[async_trait]
pub trait RemoteCommandStream: Send {
    async fn next(&mut self) -> Option<RemoteCommand>;
}

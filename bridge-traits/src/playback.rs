//! Decode/output engine bridge.
//!
//! The engine is the single shared audio resource of the process. Hosts wrap
//! their native player (ExoPlayer, AVPlayer, a rodio sink, ...) behind
//! [`AudioEngine`]; the core never reaches the native player any other way.
//!
//! Engines report progress through two independent channels, mirrored here as
//! two [`EngineEvent`] variants:
//!
//! - [`EngineEvent::StateChanged`]: the high-level player state stream
//!   (playing flag + processing state). Convenient, but hosts do not guarantee
//!   delivery while the interactive process is suspended.
//! - [`EngineEvent::Playback`]: the lower-level playback event stream. Noisier,
//!   but it keeps flowing from the native context in the background.
//!
//! Both can report [`ProcessingState::Completed`] for the same track end.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where the engine should read audio from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Audio file present on local storage.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) stream fetched by the host.
    RemoteStream { url: String },
}

impl AudioSource {
    /// Returns `true` for sources read from local storage.
    pub fn is_local(&self) -> bool {
        matches!(self, AudioSource::LocalFile { .. })
    }

    /// Returns `true` for streamed sources.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }

    /// Build a source from a caller supplied locator.
    pub fn from_locator(locator: impl Into<String>, is_local: bool) -> Self {
        let locator = locator.into();
        if is_local {
            AudioSource::LocalFile {
                path: PathBuf::from(locator),
            }
        } else {
            AudioSource::RemoteStream { url: locator }
        }
    }

    /// Printable locator (URL or path).
    pub fn locator(&self) -> String {
        match self {
            AudioSource::LocalFile { path } => path.display().to_string(),
            AudioSource::RemoteStream { url } => url.clone(),
        }
    }
}

/// Engine processing state, independent of the playing flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    /// Nothing loaded.
    #[default]
    Idle,
    /// A source is being opened.
    Loading,
    /// Loaded but waiting for data.
    Buffering,
    /// Able to play.
    Ready,
    /// Reached the end of the loaded source.
    Completed,
}

impl ProcessingState {
    /// Loading or buffering: the engine is on its way to playing.
    pub fn is_pending(&self) -> bool {
        matches!(self, ProcessingState::Loading | ProcessingState::Buffering)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ProcessingState::Completed)
    }
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSnapshot {
    pub playing: bool,
    pub processing: ProcessingState,
    pub position: Duration,
    pub buffered_position: Duration,
    /// Duration of the loaded source, once the engine has parsed it.
    pub duration: Option<Duration>,
    pub speed: f32,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            playing: false,
            processing: ProcessingState::Idle,
            position: Duration::ZERO,
            buffered_position: Duration::ZERO,
            duration: None,
            speed: 1.0,
        }
    }
}

/// Update from the high-level player state stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStateUpdate {
    pub playing: bool,
    pub processing: ProcessingState,
}

/// Update from the low-level playback event stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackEventUpdate {
    pub processing: ProcessingState,
    pub position: Duration,
    pub buffered_position: Duration,
    pub duration: Option<Duration>,
}

/// Passive notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// High-level state stream.
    StateChanged(PlayerStateUpdate),
    /// Low-level playback event stream.
    Playback(PlaybackEventUpdate),
    /// The engine parsed the source and knows its real duration.
    DurationDiscovered(Duration),
}

/// Platform audio engine.
///
/// Every method may be invoked from any task; implementations must not assume
/// UI-thread affinity. Overlapping calls are never issued by the core except
/// from the auto-advance path, which fences itself with its own guard.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Open a source, optionally seeking to `start_position` once loaded.
    ///
    /// Returns the source duration when the engine already knows it; many
    /// engines only learn it later and report it via
    /// [`EngineEvent::DurationDiscovered`].
    async fn open(
        &self,
        source: AudioSource,
        start_position: Option<Duration>,
    ) -> Result<Option<Duration>>;

    /// Start or resume output.
    async fn play(&self) -> Result<()>;

    /// Pause output, keeping the source loaded.
    async fn pause(&self) -> Result<()>;

    /// Stop output and release the loaded source.
    async fn stop(&self) -> Result<()>;

    /// Seek within the loaded source.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Change playback rate (1.0 = normal).
    async fn set_speed(&self, speed: f32) -> Result<()>;

    /// Current engine state. Must be cheap and non-blocking.
    fn snapshot(&self) -> EngineSnapshot;

    /// Subscribe to engine notifications.
    async fn subscribe_events(&self) -> Result<Box<dyn EngineEventStream>>;
}

/// Stream of [`EngineEvent`]s.
#[async_trait]
pub trait EngineEventStream: Send {
    /// Next event, or `None` once the engine is torn down.
    async fn next(&mut self) -> Option<EngineEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_from_locator() {
        let local = AudioSource::from_locator("/data/book/ch1.m4a", true);
        assert!(local.is_local());
        assert_eq!(local.locator(), "/data/book/ch1.m4a");

        let remote = AudioSource::from_locator("https://cdn.example.com/ch1.m4a", false);
        assert!(remote.is_remote());
        assert_eq!(remote.locator(), "https://cdn.example.com/ch1.m4a");
    }

    #[test]
    fn pending_states() {
        assert!(ProcessingState::Loading.is_pending());
        assert!(ProcessingState::Buffering.is_pending());
        assert!(!ProcessingState::Ready.is_pending());
        assert!(ProcessingState::Completed.is_completed());
    }

    #[test]
    fn snapshot_defaults_to_idle_normal_speed() {
        let snapshot = EngineSnapshot::default();
        assert!(!snapshot.playing);
        assert_eq!(snapshot.processing, ProcessingState::Idle);
        assert_eq!(snapshot.speed, 1.0);
        assert!(snapshot.duration.is_none());
    }
}

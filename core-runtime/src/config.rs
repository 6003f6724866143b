//! # Core Configuration Module
//!
//! Configuration for the audiobook playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every host bridge and tunable the playback coordinator needs. It
//! fails fast: a missing required bridge is reported when the host builds the
//! config, not the first time a chapter finishes in the background.
//!
//! ## Required Dependencies
//!
//! - `AudioEngine` - The single decode/output resource
//! - `MediaSessionHost` - Lock screen / notification metadata and remote commands
//! - `AudioSessionHost` - Audio focus and interruption events
//!
//! ## Optional Dependencies
//!
//! - `DownloadManager` - Locates downloaded chapters (requires `FileSystemAccess`)
//! - `FileSystemAccess` - Verifies local files exist before playing them
//! - `StorageUrlResolver` - Builds stream URLs from backend storage paths
//! - `ProgressSink` - Receives listening position on pause/stop/chapter change
//! - `Clock` - Wall-clock source (defaults to [`SystemClock`])
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, ExecutionContext};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .engine(Arc::new(MyEngine::new()))
//!     .media_session(Arc::new(MyMediaSession))
//!     .audio_session(Arc::new(MyAudioSession))
//!     .download_manager(Arc::new(MyDownloads))
//!     .file_system(Arc::new(MyFileSystem))
//!     .execution_context(ExecutionContext::Headless)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics with an actionable message naming the missing AudioEngine
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    AudioEngine, AudioSessionHost, Clock, DownloadManager, FileSystemAccess, MediaSessionHost,
    ProgressSink, StorageUrlResolver, SystemClock,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Where the coordinator is running.
///
/// Chosen by the host at construction. Both contexts share the same
/// auto-advance state machine and differ only in who is told about
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// The interactive layer is alive and listens on the event bus.
    #[default]
    Interactive,
    /// Running from a background audio service; the interactive layer may be
    /// suspended, so transitions are also forwarded to the media session host.
    Headless,
}

/// Tunables for the playback core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Timeout applied to every queued engine operation attempt
    pub operation_timeout: Duration,

    /// Consecutive failures that open the circuit breaker
    pub failure_threshold: u32,

    /// How long the breaker stays open before admitting a trial operation
    pub reset_timeout: Duration,

    /// Total attempts for a transient failure (1 = no retry)
    pub retry_max_attempts: u32,

    /// Delay before the first retry
    pub retry_initial_backoff: Duration,

    /// Backoff growth factor between retries
    pub retry_backoff_multiplier: f64,

    /// Guard window after an explicit chapter load
    pub completion_settle_delay: Duration,

    /// Guard window after an automatic advance; must exceed
    /// `completion_settle_delay`
    pub advance_settle_delay: Duration,

    /// Wait before checking that an auto-advanced chapter actually plays
    pub play_verify_grace: Duration,

    /// Past this position "previous" restarts the current chapter
    pub previous_restart_threshold: Duration,

    /// Speed used when a different content item is loaded
    pub default_speed: f32,

    pub min_speed: f32,

    pub max_speed: f32,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(15),
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
            retry_max_attempts: 2,
            retry_initial_backoff: Duration::from_millis(500),
            retry_backoff_multiplier: 2.0,
            completion_settle_delay: Duration::from_secs(1),
            advance_settle_delay: Duration::from_secs(3),
            play_verify_grace: Duration::from_secs(1),
            previous_restart_threshold: Duration::from_secs(3),
            default_speed: 1.0,
            min_speed: 0.5,
            max_speed: 3.0,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl PlaybackSettings {
    /// Validates the settings.
    ///
    /// This checks:
    /// - Timeouts and the breaker threshold are non-zero
    /// - The retry policy makes at least one attempt and never shrinks backoff
    /// - The auto-advance settle delay is longer than the ordinary one
    /// - The speed range is positive and contains the default speed
    pub fn validate(&self) -> Result<()> {
        if self.operation_timeout.is_zero() {
            return Err(Error::Config(
                "Operation timeout must be greater than zero".to_string(),
            ));
        }

        if self.failure_threshold == 0 {
            return Err(Error::Config(
                "Circuit breaker failure threshold must be at least 1".to_string(),
            ));
        }

        if self.reset_timeout.is_zero() {
            return Err(Error::Config(
                "Circuit breaker reset timeout must be greater than zero".to_string(),
            ));
        }

        if self.retry_max_attempts == 0 {
            return Err(Error::Config(
                "Retry policy must allow at least one attempt".to_string(),
            ));
        }

        if self.retry_backoff_multiplier.is_nan() || self.retry_backoff_multiplier < 1.0 {
            return Err(Error::Config(
                "Retry backoff multiplier must be at least 1.0".to_string(),
            ));
        }

        if self.advance_settle_delay <= self.completion_settle_delay {
            return Err(Error::Config(format!(
                "Auto-advance settle delay ({:?}) must be longer than the completion \
                 settle delay ({:?}); background loads settle slower",
                self.advance_settle_delay, self.completion_settle_delay
            )));
        }

        if self.min_speed.is_nan() || self.min_speed <= 0.0 || self.min_speed > self.max_speed {
            return Err(Error::Config(format!(
                "Invalid speed range {}..={}",
                self.min_speed, self.max_speed
            )));
        }

        if !self.speed_in_range(self.default_speed) {
            return Err(Error::Config(format!(
                "Default speed {} is outside {}..={}",
                self.default_speed, self.min_speed, self.max_speed
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether `speed` is an accepted playback rate.
    pub fn speed_in_range(&self, speed: f32) -> bool {
        speed.is_finite() && speed >= self.min_speed && speed <= self.max_speed
    }
}

/// Core configuration for the playback core.
///
/// Holds every injected host bridge. Use [`CoreConfigBuilder`] to construct
/// instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Decode/output engine (required, exclusively driven by the coordinator)
    pub engine: Arc<dyn AudioEngine>,

    /// Host media session (required)
    pub media_session: Arc<dyn MediaSessionHost>,

    /// Host audio session (required)
    pub audio_session: Arc<dyn AudioSessionHost>,

    /// Download manager (optional)
    pub download_manager: Option<Arc<dyn DownloadManager>>,

    /// Storage path to URL resolver (optional)
    pub storage_url_resolver: Option<Arc<dyn StorageUrlResolver>>,

    /// File system access for verifying local files (optional)
    pub file_system: Option<Arc<dyn FileSystemAccess>>,

    /// Progress persistence sink (optional)
    pub progress_sink: Option<Arc<dyn ProgressSink>>,

    /// Wall-clock source
    pub clock: Arc<dyn Clock>,

    pub execution_context: ExecutionContext,

    pub settings: PlaybackSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("engine", &"AudioEngine { ... }")
            .field("media_session", &"MediaSessionHost { ... }")
            .field("audio_session", &"AudioSessionHost { ... }")
            .field(
                "download_manager",
                &self.download_manager.as_ref().map(|_| "DownloadManager { ... }"),
            )
            .field(
                "storage_url_resolver",
                &self
                    .storage_url_resolver
                    .as_ref()
                    .map(|_| "StorageUrlResolver { ... }"),
            )
            .field(
                "file_system",
                &self.file_system.as_ref().map(|_| "FileSystemAccess { ... }"),
            )
            .field(
                "progress_sink",
                &self.progress_sink.as_ref().map(|_| "ProgressSink { ... }"),
            )
            .field("execution_context", &self.execution_context)
            .field("settings", &self.settings)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// Checks the settings and that optional bridges are consistent with each
    /// other.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;

        if self.download_manager.is_some() && self.file_system.is_none() {
            return Err(Error::Config(
                "DownloadManager provided but no FileSystemAccess. \
                 Downloaded files are verified before playback; inject a \
                 FileSystemAccess implementation or drop the DownloadManager."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn engine_missing_error() -> Error {
    Error::capability_missing(
        "AudioEngine",
        "AudioEngine implementation is required for audio output. \
         Android: wrap ExoPlayer/Media3. iOS: wrap AVPlayer. \
         Desktop: inject a rodio/gstreamer-backed engine.",
    )
}

fn media_session_missing_error() -> Error {
    Error::capability_missing(
        "MediaSessionHost",
        "MediaSessionHost implementation is required for lock screen and \
         notification controls. Android: MediaSession. iOS: MPNowPlayingInfoCenter \
         and MPRemoteCommandCenter. Desktop: MPRIS/SMTC.",
    )
}

fn audio_session_missing_error() -> Error {
    Error::capability_missing(
        "AudioSessionHost",
        "AudioSessionHost implementation is required for audio focus and \
         interruption handling. Android: AudioFocusRequest. iOS: AVAudioSession. \
         Desktop: a no-op host that never interrupts is acceptable.",
    )
}

/// Builder for constructing a [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    engine: Option<Arc<dyn AudioEngine>>,
    media_session: Option<Arc<dyn MediaSessionHost>>,
    audio_session: Option<Arc<dyn AudioSessionHost>>,
    download_manager: Option<Arc<dyn DownloadManager>>,
    storage_url_resolver: Option<Arc<dyn StorageUrlResolver>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    progress_sink: Option<Arc<dyn ProgressSink>>,
    clock: Option<Arc<dyn Clock>>,
    execution_context: ExecutionContext,
    settings: Option<PlaybackSettings>,
}

impl CoreConfigBuilder {
    /// Sets the decode/output engine (required).
    pub fn engine(mut self, engine: Arc<dyn AudioEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the media session host (required).
    pub fn media_session(mut self, host: Arc<dyn MediaSessionHost>) -> Self {
        self.media_session = Some(host);
        self
    }

    /// Sets the audio session host (required).
    pub fn audio_session(mut self, host: Arc<dyn AudioSessionHost>) -> Self {
        self.audio_session = Some(host);
        self
    }

    /// Sets the download manager. Requires [`file_system`](Self::file_system).
    pub fn download_manager(mut self, manager: Arc<dyn DownloadManager>) -> Self {
        self.download_manager = Some(manager);
        self
    }

    pub fn storage_url_resolver(mut self, resolver: Arc<dyn StorageUrlResolver>) -> Self {
        self.storage_url_resolver = Some(resolver);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = Some(sink);
        self
    }

    /// Overrides the wall-clock source (tests).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn execution_context(mut self, context: ExecutionContext) -> Self {
        self.execution_context = context;
        self
    }

    /// Replaces the default [`PlaybackSettings`].
    pub fn settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Builds the configuration, validating required bridges and settings.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] if the engine, media session or audio
    ///   session host was not provided
    /// - [`Error::Config`] if settings or bridge combinations are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let engine = self.engine.ok_or_else(engine_missing_error)?;
        let media_session = self.media_session.ok_or_else(media_session_missing_error)?;
        let audio_session = self.audio_session.ok_or_else(audio_session_missing_error)?;

        let config = CoreConfig {
            engine,
            media_session,
            audio_session,
            download_manager: self.download_manager,
            storage_url_resolver: self.storage_url_resolver,
            file_system: self.file_system,
            progress_sink: self.progress_sink,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>),
            execution_context: self.execution_context,
            settings: self.settings.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}

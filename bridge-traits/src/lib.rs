//! # Host Bridge Traits
//!
//! Contracts between the playback core and the host platform.
//!
//! ## Overview
//!
//! The playback core never touches native audio APIs directly. Each trait in
//! this crate is a capability the core needs but that every platform implements
//! differently (Android, iOS, desktop). Hosts inject implementations through
//! `core_runtime::config::CoreConfig`.
//!
//! ## Traits
//!
//! ### Audio
//! - [`AudioEngine`](playback::AudioEngine) - Decode/output engine (open, play, pause, stop, seek, speed)
//! - [`AudioSessionHost`](audio_session::AudioSessionHost) - Audio focus, interruptions, route changes
//! - [`MediaSessionHost`](media_session::MediaSessionHost) - Lock screen / notification metadata and remote commands
//!
//! ### Storage
//! - [`DownloadManager`](storage::DownloadManager) - Where a downloaded chapter lives
//! - [`StorageUrlResolver`](storage::StorageUrlResolver) - Backend storage path to stream URL
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File existence checks
//! - [`ProgressSink`](progress::ProgressSink) - Listening position persistence
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Wall-clock source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should report a load cut short by a newer load as
//! [`BridgeError::Interrupted`](error::BridgeError::Interrupted) (or a message
//! containing "interrupted"), so the core can tell supersession from failure.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`. Hosts call back into the core from
//! native audio threads while the UI may be suspended.

pub mod audio_session;
pub mod error;
pub mod media_session;
pub mod playback;
pub mod progress;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use audio_session::{
    AudioSessionCategory, AudioSessionEvent, AudioSessionEventStream, AudioSessionHost,
};
pub use media_session::{
    MediaControl, MediaSessionHost, NowPlaying, RemoteCommand, RemoteCommandStream,
    TransportState,
};
pub use playback::{
    AudioEngine, AudioSource, EngineEvent, EngineEventStream, EngineSnapshot,
    PlaybackEventUpdate, PlayerStateUpdate, ProcessingState,
};
pub use progress::{ProgressReason, ProgressSink, ProgressUpdate};
pub use storage::{DownloadManager, FileSystemAccess, StorageUrlResolver};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};

//! # Playback Error Types
//!
//! Error taxonomy for the playback coordinator.
//!
//! Four classes matter to callers and to the circuit breaker:
//!
//! - **supersession**: a newer request replaced this one. Surfaced as
//!   [`PlaybackError::Superseded`] (or a host error that reads like an
//!   interruption); never counted as a failure.
//! - **transient engine failure**: timeouts and busy resources. Retried once
//!   inline, then counted toward the breaker.
//! - **resolution failure**: [`PlaybackError::SourceUnresolved`]; terminal for
//!   the attempt.
//! - **breaker rejection**: [`PlaybackError::CircuitOpen`], returned without
//!   touching the engine.

use bridge_traits::BridgeError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Cancellation / containment
    // ========================================================================
    /// A newer load replaced this one before it finished.
    #[error("Operation '{operation}' superseded by a newer request")]
    Superseded { operation: String },

    /// The circuit breaker is open; the engine was not touched.
    #[error("Playback temporarily disabled after repeated failures (retry in {retry_after:?})")]
    CircuitOpen { retry_after: Duration },

    /// A single engine attempt exceeded the operation timeout.
    #[error("Operation '{operation}' timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    // ========================================================================
    // Source errors
    // ========================================================================
    /// Neither a local file nor a remote locator exists for the chapter.
    #[error("No playable source for chapter {chapter_id}")]
    SourceUnresolved { chapter_id: String },

    // ========================================================================
    // Session / request errors
    // ========================================================================
    /// Command requires a loaded session.
    #[error("No active playback session")]
    NoActiveSession,

    #[error("Chapter index {index} out of range (content has {len} chapters)")]
    InvalidChapterIndex { index: usize, len: usize },

    #[error("Content has no chapters")]
    EmptyChapterList,

    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f32),

    /// The requested chapter needs ownership the listener does not have.
    #[error("Chapter {index} is locked")]
    ChapterLocked { index: usize },

    #[error("Already at the last chapter")]
    NoNextChapter,

    // ========================================================================
    // Wrapped errors
    // ========================================================================
    /// Error reported by a host bridge (engine, media session, storage).
    #[error("Host bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    pub(crate) fn superseded(operation: impl Into<String>) -> Self {
        PlaybackError::Superseded {
            operation: operation.into(),
        }
    }

    /// Returns `true` if a newer request cancelled this one.
    pub fn is_supersession(&self) -> bool {
        match self {
            PlaybackError::Superseded { .. } => true,
            PlaybackError::Bridge(err) => err.is_interruption(),
            _ => false,
        }
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Timeout { .. } => true,
            PlaybackError::Bridge(err) => err.is_transient() && !err.is_interruption(),
            _ => false,
        }
    }

    /// Returns `true` if this outcome should feed the circuit breaker.
    pub fn counts_toward_breaker(&self) -> bool {
        !self.is_supersession() && !matches!(self, PlaybackError::CircuitOpen { .. })
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

//! Completion detector.
//!
//! Engines report a finished track through two streams: the high-level player
//! state stream, which hosts may stop delivering while the process is in the
//! background, and the lower-level playback event stream, which keeps flowing
//! but is noisier. Both adapters below feed one completion signal.
//!
//! The payloads differ between the two streams, so they are never correlated.
//! The transition guard in [`AdvanceMachine`] is the only deduplication: while
//! it is set both adapters return `None`.

use crate::advance::AdvanceMachine;
use bridge_traits::{PlaybackEventUpdate, PlayerStateUpdate};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Which engine stream reported the completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSource {
    StateStream,
    PlaybackEvents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionSignal {
    pub source: CompletionSource,
    /// Final position, when the stream carries one.
    pub position: Option<Duration>,
}

pub struct CompletionDetector {
    machine: Arc<AdvanceMachine>,
}

impl CompletionDetector {
    pub fn new(machine: Arc<AdvanceMachine>) -> Self {
        Self { machine }
    }

    /// Adapter for the high-level player state stream.
    pub fn on_state_changed(&self, update: &PlayerStateUpdate) -> Option<CompletionSignal> {
        if !update.processing.is_completed() {
            return None;
        }
        self.signal(CompletionSource::StateStream, None)
    }

    /// Adapter for the low-level playback event stream.
    pub fn on_playback_event(&self, update: &PlaybackEventUpdate) -> Option<CompletionSignal> {
        if !update.processing.is_completed() {
            return None;
        }
        self.signal(CompletionSource::PlaybackEvents, Some(update.position))
    }

    fn signal(&self, source: CompletionSource, position: Option<Duration>) -> Option<CompletionSignal> {
        if self.machine.is_suppressed() {
            trace!(?source, "Completion suppressed during transition");
            return None;
        }
        Some(CompletionSignal { source, position })
    }
}

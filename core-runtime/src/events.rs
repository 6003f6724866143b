//! # Event Bus System
//!
//! Observer notifications for the playback core, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The playback coordinator never calls into UI code directly. Everything an
//! observer may care about (a chapter finished, the coordinator advanced to the
//! next chapter, the transport state changed) is published as a
//! [`CoreEvent`] on the [`EventBus`]. Any number of observers subscribe
//! independently; a slow observer lags without blocking playback.
//!
//! ```text
//! ┌──────────────────────┐   emit    ┌───────────┐  subscribe  ┌──────────┐
//! │ PlaybackCoordinator  ├──────────>│ EventBus  ├────────────>│ UI layer │
//! └──────────────────────┘           │ (broadcast│             └──────────┘
//!                                    │  channel) ├────────────>┌──────────┐
//!                                    └───────────┘             │ Analytics│
//!                                                              └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut observer = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::ChapterAdvanced {
//!     content_id: "book-1".to_string(),
//!     from_index: 0,
//!     to_index: 1,
//! }))
//! .ok();
//!
//! let event = observer.recv().await.unwrap();
//! assert_eq!(event.description(), "Advanced to next chapter");
//! # }
//! ```
//!
//! ## Completion vs. advance
//!
//! `Completed` means playback ended (last chapter, gated chapter, sleep timer,
//! auto-advance disabled, or a failed advance). `ChapterAdvanced` means the
//! coordinator already started the next chapter by itself; observers should only
//! refresh their view and must not trigger another advance.
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the observer missed `n` events and can continue.
//! - **`RecvError::Closed`**: all senders dropped; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback-related events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Interrupted { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Completed { .. })
            | CoreEvent::Playback(PlaybackEvent::ChapterAdvanced { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Returns the inner playback event.
    pub fn as_playback(&self) -> Option<&PlaybackEvent> {
        match self {
            CoreEvent::Playback(event) => Some(event),
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Why playback ended instead of moving on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The last chapter finished.
    EndOfContent,
    /// The sleep timer was active when the chapter finished.
    SleepTimer,
    /// The listener turned auto-advance off.
    AutoAdvanceDisabled,
    /// The next chapter requires ownership the listener does not have.
    NextChapterLocked,
    /// Starting the next chapter failed. Shown to the listener like a plain stop.
    AdvanceFailed,
    /// Nothing was loaded when the completion arrived.
    NoSession,
}

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Transport state changed (play/pause/processing/chapter).
    StateChanged {
        content_id: Option<String>,
        chapter_index: Option<usize>,
        playing: bool,
        /// Engine processing state (snake_case name).
        processing: String,
        position_ms: u64,
    },
    /// A chapter was loaded and started by an explicit request.
    ChapterStarted {
        content_id: String,
        chapter_index: usize,
        title: String,
    },
    /// Playback paused.
    Paused {
        content_id: String,
        chapter_index: usize,
        position_ms: u64,
    },
    /// Playback resumed after pause.
    Resumed {
        content_id: String,
        chapter_index: usize,
    },
    /// Playback stopped and the session was cleared.
    Stopped { content_id: Option<String> },
    /// Playback reached an end state without moving on.
    Completed {
        content_id: Option<String>,
        chapter_index: Option<usize>,
        reason: CompletionReason,
    },
    /// The next chapter was started automatically.
    ChapterAdvanced {
        content_id: String,
        from_index: usize,
        to_index: usize,
    },
    /// The engine reported the real duration of the loaded chapter.
    DurationDiscovered {
        content_id: String,
        chapter_index: usize,
        duration_ms: u64,
    },
    /// Playback was paused because of an audio session interruption or route loss.
    Interrupted { cause: String },
    /// Playback error occurred.
    Error {
        content_id: Option<String>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::ChapterStarted { .. } => "Chapter started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Playback completed",
            PlaybackEvent::ChapterAdvanced { .. } => "Advanced to next chapter",
            PlaybackEvent::DurationDiscovered { .. } => "Chapter duration discovered",
            PlaybackEvent::Interrupted { .. } => "Playback interrupted",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus yields another handle on the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified per-subscriber buffer.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Shorthand for emitting a playback event when nobody listening is fine.
    pub fn emit_playback(&self, event: PlaybackEvent) {
        // No subscribers is a normal state (headless start-up).
        let _ = self.sender.send(CoreEvent::Playback(event));
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream, PlaybackEvent};
///
/// let bus = EventBus::new(16);
/// let completions = EventStream::new(bus.subscribe()).filter(|event| {
///     matches!(event, CoreEvent::Playback(PlaybackEvent::Completed { .. }))
/// });
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(index: usize) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Completed {
            content_id: Some("book-1".to_string()),
            chapter_index: Some(index),
            reason: CompletionReason::EndOfContent,
        })
    }

    fn advanced(from: usize, to: usize) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::ChapterAdvanced {
            content_id: "book-1".to_string(),
            from_index: from,
            to_index: to,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _subscriber = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(completed(2)).is_err());
        // The convenience path swallows the missing-subscriber error.
        bus.emit_playback(PlaybackEvent::Stopped { content_id: None });
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(advanced(0, 1)).unwrap(), 2);
        assert_eq!(first.recv().await.unwrap(), advanced(0, 1));
        assert_eq!(second.recv().await.unwrap(), advanced(0, 1));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).filter(|event| {
            matches!(
                event,
                CoreEvent::Playback(PlaybackEvent::ChapterAdvanced { .. })
            )
        });

        bus.emit(completed(0)).unwrap();
        bus.emit(advanced(0, 1)).unwrap();

        assert_eq!(stream.recv().await.unwrap(), advanced(0, 1));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut subscriber = bus.subscribe();

        for index in 0..5 {
            bus.emit(completed(index)).unwrap();
        }

        match subscriber.recv().await {
            Err(RecvError::Lagged(n)) => assert!(n > 0),
            other => panic!("expected lag, got {:?}", other),
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(completed(1).severity(), EventSeverity::Info);
        assert_eq!(advanced(0, 1).severity(), EventSeverity::Info);
        let error = CoreEvent::Playback(PlaybackEvent::Error {
            content_id: None,
            message: "engine wedged".to_string(),
            recoverable: false,
        });
        assert_eq!(error.severity(), EventSeverity::Error);
        let interrupted = CoreEvent::Playback(PlaybackEvent::Interrupted {
            cause: "route_lost".to_string(),
        });
        assert_eq!(interrupted.severity(), EventSeverity::Warning);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&advanced(2, 3)).unwrap();
        assert!(json.contains("\"type\":\"Playback\""));
        assert!(json.contains("\"event\":\"ChapterAdvanced\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, advanced(2, 3));
    }

    #[tokio::test]
    async fn test_try_recv_with_event() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        bus.emit(completed(0)).unwrap();

        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received.description(), "Playback completed");
        assert!(received.as_playback().is_some());
    }
}

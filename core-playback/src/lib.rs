//! # Playback Coordination Module
//!
//! Keeps chapter playback going while the host process is in the background.
//!
//! ## Overview
//!
//! This module handles:
//! - Serialized engine commands with timeout, retry and a circuit breaker
//! - Chapter completion detection across both engine event streams
//! - Auto-advance to the next eligible chapter
//! - Lock screen metadata and transport state publishing
//! - Audio session activation and interruption handling
//! - Chapter source resolution (downloads, local hints, remote URLs)
//!
//! [`PlaybackCoordinator`] owns the engine and ties the pieces together. The
//! other modules are usable on their own and are exported for hosts that want
//! to compose them differently.

pub mod advance;
pub mod audio_session;
pub mod circuit_breaker;
pub mod command_queue;
pub mod completion;
pub mod coordinator;
pub mod eligibility;
pub mod error;
pub mod metadata;
pub mod resolver;
pub mod retry;
pub mod session;

pub use advance::{
    decide, notifier_for, AdvanceDecision, AdvanceMachine, AdvanceState, EventBusNotifier,
    HeadlessNotifier, TransitionNotifier,
};
pub use audio_session::{AudioSessionCoordinator, SessionAction};
pub use circuit_breaker::{
    Admission, BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};
pub use command_queue::{CommandQueue, QueueTurn};
pub use completion::{CompletionDetector, CompletionSignal, CompletionSource};
pub use coordinator::{PlayChapterRequest, PlaybackCoordinator};
pub use eligibility::{Eligibility, EligibilityCache};
pub use error::{PlaybackError, Result};
pub use metadata::MetadataPublisher;
pub use resolver::{ChapterSourceResolver, ResolvedSource};
pub use retry::RetryPolicy;
pub use session::{Chapter, ContentInfo, PlaybackSession};

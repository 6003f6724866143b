//! # Auto-Advance State Machine
//!
//! Decides what happens when a chapter finishes: stop, pause, or load and
//! start the next chapter.
//!
//! ## States
//!
//! ```text
//!            completion (not suppressed, not in flight)
//!   Idle ───────────────────────────────> EvaluatingNext
//!    ^                                     │        │
//!    │ advanced                 gated/end  │        │ eligible
//!    │                                     v        v
//!    └──────────────────── Advancing    Stopped <── (failure)
//! ```
//!
//! ## Guards
//!
//! Two guards live in [`AdvanceMachine`]:
//!
//! - **in flight**: a completion is being handled; further completions are
//!   ignored.
//! - **suppress**: a stop/reload sequence is running; its own terminal-state
//!   churn must not read as a second completion.
//!
//! Both are set together before the engine is touched and cleared together by
//! [`AdvanceMachine::settle`] after a settle delay. Each transition gets a
//! generation number; only the settle of the newest transition clears the
//! guards, so a later transition extends the window instead of being cut short.
//!
//! ## Decision vs. execution
//!
//! [`decide`] is a pure function over the session and the eligibility snapshot.
//! The coordinator executes its result and reports through a
//! [`TransitionNotifier`] picked by [`ExecutionContext`].

use crate::eligibility::Eligibility;
use crate::session::PlaybackSession;
use async_trait::async_trait;
use bridge_traits::MediaSessionHost;
use core_runtime::config::ExecutionContext;
use core_runtime::events::{CompletionReason, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceState {
    #[default]
    Idle,
    EvaluatingNext,
    Advancing,
    Stopped,
}

#[derive(Debug, Default)]
struct MachineInner {
    state: AdvanceState,
    in_flight: bool,
    suppress: bool,
    generation: u64,
}

/// Guard flags and state of the auto-advance machine.
#[derive(Debug, Default)]
pub struct AdvanceMachine {
    inner: Mutex<MachineInner>,
}

impl AdvanceMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AdvanceState {
        self.inner.lock().state
    }

    pub fn is_suppressed(&self) -> bool {
        self.inner.lock().suppress
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.lock().in_flight
    }

    /// Claim a completion. Sets both guards and returns the transition's
    /// generation, or `None` if a completion is already being handled or a
    /// transition is settling.
    pub fn begin(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.in_flight || inner.suppress {
            return None;
        }

        inner.in_flight = true;
        inner.suppress = true;
        inner.state = AdvanceState::EvaluatingNext;
        inner.generation += 1;
        Some(inner.generation)
    }

    /// Suppress completions around a caller-initiated load.
    pub fn suppress_for_transition(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.suppress = true;
        inner.generation += 1;
        inner.generation
    }

    pub fn enter_advancing(&self) {
        self.inner.lock().state = AdvanceState::Advancing;
    }

    /// Record where a transition ended. Guards stay set until [`settle`](Self::settle).
    pub fn finish(&self, state: AdvanceState) {
        self.inner.lock().state = state;
    }

    /// Clear both guards if no newer transition started since `generation`.
    pub fn settle(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(
                generation,
                current = inner.generation,
                "Newer transition pending, keeping guards"
            );
            return false;
        }

        inner.in_flight = false;
        inner.suppress = false;
        true
    }
}

/// Outcome of evaluating a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceDecision {
    /// Nothing loaded; hard stop.
    NoSession,
    /// Sleep timer wins over auto-advance; pause.
    PauseForSleepTimer,
    /// Listener turned auto-advance off; pause.
    PauseAutoAdvanceDisabled,
    /// Last chapter finished.
    EndOfContent,
    /// Next chapter exists but is gated; pause.
    Locked { next_index: usize },
    Advance { next_index: usize },
}

impl AdvanceDecision {
    /// Whether the engine should be paused before reporting completion.
    pub fn pauses(&self) -> bool {
        matches!(
            self,
            AdvanceDecision::PauseForSleepTimer
                | AdvanceDecision::PauseAutoAdvanceDisabled
                | AdvanceDecision::Locked { .. }
        )
    }

    /// Reason reported to observers for every non-advancing decision.
    pub fn completion_reason(&self) -> Option<CompletionReason> {
        match self {
            AdvanceDecision::NoSession => Some(CompletionReason::NoSession),
            AdvanceDecision::PauseForSleepTimer => Some(CompletionReason::SleepTimer),
            AdvanceDecision::PauseAutoAdvanceDisabled => Some(CompletionReason::AutoAdvanceDisabled),
            AdvanceDecision::EndOfContent => Some(CompletionReason::EndOfContent),
            AdvanceDecision::Locked { .. } => Some(CompletionReason::NextChapterLocked),
            AdvanceDecision::Advance { .. } => None,
        }
    }
}

/// Decide what a completion leads to. Checks run in priority order.
pub fn decide(session: Option<&PlaybackSession>, eligibility: &Eligibility) -> AdvanceDecision {
    let Some(session) = session else {
        return AdvanceDecision::NoSession;
    };

    if eligibility.sleep_timer_active {
        return AdvanceDecision::PauseForSleepTimer;
    }

    if !eligibility.auto_advance_enabled {
        return AdvanceDecision::PauseAutoAdvanceDisabled;
    }

    let Some(next_index) = session.next_index() else {
        return AdvanceDecision::EndOfContent;
    };

    match session.chapter(next_index) {
        Some(next) if eligibility.can_play(next) => AdvanceDecision::Advance { next_index },
        _ => AdvanceDecision::Locked { next_index },
    }
}

// ============================================================================
// Transition notification
// ============================================================================

/// Who hears about completions and advances.
#[async_trait]
pub trait TransitionNotifier: Send + Sync {
    async fn notify(&self, event: PlaybackEvent);
}

/// Observers on the event bus only. Used while the interactive layer is alive.
pub struct EventBusNotifier {
    bus: EventBus,
}

impl EventBusNotifier {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl TransitionNotifier for EventBusNotifier {
    async fn notify(&self, event: PlaybackEvent) {
        self.bus.emit_playback(event);
    }
}

/// Event bus plus the host media session, which stays reachable when the
/// interactive layer is suspended.
pub struct HeadlessNotifier {
    bus: EventBus,
    media_session: Arc<dyn MediaSessionHost>,
}

impl HeadlessNotifier {
    pub fn new(bus: EventBus, media_session: Arc<dyn MediaSessionHost>) -> Self {
        Self { bus, media_session }
    }
}

#[async_trait]
impl TransitionNotifier for HeadlessNotifier {
    async fn notify(&self, event: PlaybackEvent) {
        if let Some((name, payload)) = host_event(&event) {
            if let Err(err) = self.media_session.send_custom_event(name, payload).await {
                warn!(event = name, error = %err, "Failed to forward transition to host");
            }
        }
        self.bus.emit_playback(event);
    }
}

/// Pick the notifier for the execution context.
pub fn notifier_for(
    context: ExecutionContext,
    bus: EventBus,
    media_session: Arc<dyn MediaSessionHost>,
) -> Arc<dyn TransitionNotifier> {
    match context {
        ExecutionContext::Interactive => Arc::new(EventBusNotifier::new(bus)),
        ExecutionContext::Headless => Arc::new(HeadlessNotifier::new(bus, media_session)),
    }
}

/// Custom host event for transitions; other events stay on the bus.
fn host_event(event: &PlaybackEvent) -> Option<(&'static str, BTreeMap<String, String>)> {
    let mut payload = BTreeMap::new();
    match event {
        PlaybackEvent::ChapterAdvanced {
            content_id,
            from_index,
            to_index,
        } => {
            payload.insert("content_id".to_string(), content_id.clone());
            payload.insert("from_index".to_string(), from_index.to_string());
            payload.insert("to_index".to_string(), to_index.to_string());
            Some(("chapter_advanced", payload))
        }
        PlaybackEvent::Completed {
            content_id,
            chapter_index,
            reason,
        } => {
            if let Some(content_id) = content_id {
                payload.insert("content_id".to_string(), content_id.clone());
            }
            if let Some(index) = chapter_index {
                payload.insert("chapter_index".to_string(), index.to_string());
            }
            let reason = serde_json::to_value(reason)
                .ok()
                .and_then(|value| value.as_str().map(str::to_string))
                .unwrap_or_default();
            payload.insert("reason".to_string(), reason);
            Some(("playback_completed", payload))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Chapter, ContentInfo};

    fn session(index: usize, next_is_preview: bool) -> PlaybackSession {
        let chapters = vec![
            Chapter::new("ch-0", "One"),
            Chapter::new("ch-1", "Two").with_preview(next_is_preview),
            Chapter::new("ch-2", "Three"),
        ];
        PlaybackSession::new(ContentInfo::new("book", "Book"), chapters, index, 1.0).unwrap()
    }

    #[test]
    fn begin_is_exclusive_until_settled() {
        let machine = AdvanceMachine::new();
        let generation = machine.begin().unwrap();
        assert!(machine.is_in_flight());
        assert!(machine.is_suppressed());
        assert_eq!(machine.state(), AdvanceState::EvaluatingNext);
        assert!(machine.begin().is_none());

        machine.finish(AdvanceState::Idle);
        assert!(machine.begin().is_none());

        assert!(machine.settle(generation));
        assert!(!machine.is_suppressed());
        assert!(machine.begin().is_some());
    }

    #[test]
    fn newer_transition_extends_guard_window() {
        let machine = AdvanceMachine::new();
        let advance = machine.begin().unwrap();
        let load = machine.suppress_for_transition();

        assert!(!machine.settle(advance));
        assert!(machine.is_suppressed());
        assert!(machine.settle(load));
        assert!(!machine.is_in_flight());
    }

    // owned/free/preview x auto-advance x sleep timer, with a next chapter present
    #[test]
    fn gating_matrix() {
        for bits in 0u8..32 {
            let owned = bits & 1 != 0;
            let free = bits & 2 != 0;
            let preview = bits & 4 != 0;
            let auto_advance = bits & 8 != 0;
            let sleep_timer = bits & 16 != 0;

            let eligibility = Eligibility {
                is_owned: owned,
                is_free_content: free,
                auto_advance_enabled: auto_advance,
                sleep_timer_active: sleep_timer,
            };
            let decision = decide(Some(&session(0, preview)), &eligibility);

            let should_advance = (owned || free || preview) && auto_advance && !sleep_timer;
            assert_eq!(
                decision == AdvanceDecision::Advance { next_index: 1 },
                should_advance,
                "owned={} free={} preview={} auto={} sleep={} -> {:?}",
                owned,
                free,
                preview,
                auto_advance,
                sleep_timer,
                decision
            );

            if sleep_timer {
                assert_eq!(decision, AdvanceDecision::PauseForSleepTimer);
            } else if !auto_advance {
                assert_eq!(decision, AdvanceDecision::PauseAutoAdvanceDisabled);
            } else if !should_advance {
                assert_eq!(decision, AdvanceDecision::Locked { next_index: 1 });
            }
        }
    }

    #[test]
    fn last_chapter_ends_content_regardless_of_access() {
        let eligibility = Eligibility {
            is_owned: true,
            ..Eligibility::default()
        };
        assert_eq!(
            decide(Some(&session(2, false)), &eligibility),
            AdvanceDecision::EndOfContent
        );
    }

    #[test]
    fn missing_session_is_hard_stop() {
        let decision = decide(None, &Eligibility::default());
        assert_eq!(decision, AdvanceDecision::NoSession);
        assert!(!decision.pauses());
        assert_eq!(decision.completion_reason(), Some(CompletionReason::NoSession));
    }

    #[test]
    fn host_event_payload_for_transitions() {
        let (name, payload) = host_event(&PlaybackEvent::ChapterAdvanced {
            content_id: "book".to_string(),
            from_index: 0,
            to_index: 1,
        })
        .unwrap();
        assert_eq!(name, "chapter_advanced");
        assert_eq!(payload["to_index"], "1");

        let (name, payload) = host_event(&PlaybackEvent::Completed {
            content_id: None,
            chapter_index: Some(2),
            reason: CompletionReason::EndOfContent,
        })
        .unwrap();
        assert_eq!(name, "playback_completed");
        assert_eq!(payload["reason"], "end_of_content");

        assert!(host_event(&PlaybackEvent::Stopped { content_id: None }).is_none());
    }
}

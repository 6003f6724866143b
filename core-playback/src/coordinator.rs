//! # Playback Coordinator
//!
//! Owns the audio engine and wires the playback components together.
//!
//! ## Overview
//!
//! ```text
//! caller / remote command ──> CommandQueue ──> AudioEngine
//!                                                  │ events
//!                                                  v
//!                 CompletionDetector ──> AdvanceMachine ──> TransitionNotifier
//!                                                  │
//!                                                  v
//!                                          MetadataPublisher ──> MediaSessionHost
//! ```
//!
//! - Caller commands (`play_chapter`, `pause`, `seek`, ...) are serialized
//!   through the [`CommandQueue`] and guarded by its circuit breaker.
//! - Completion handling and auto-advance do not go through the queue. They
//!   claim the [`AdvanceMachine`] guards before touching the engine and call it
//!   directly, so a backgrounded process keeps advancing while a queued command
//!   is still waiting.
//! - Every load takes a new loading key. A load (or advance) that sees a newer
//!   key gives up with [`PlaybackError::Superseded`].
//!
//! Engine, audio session and media session events reach the coordinator either
//! through [`PlaybackCoordinator::start`], which pumps the host streams, or by
//! the host calling the `handle_*` methods directly.

use crate::advance::{decide, notifier_for, AdvanceDecision, AdvanceMachine, AdvanceState, TransitionNotifier};
use crate::audio_session::{AudioSessionCoordinator, SessionAction};
use crate::circuit_breaker::BreakerStatus;
use crate::command_queue::CommandQueue;
use crate::completion::{CompletionDetector, CompletionSignal};
use crate::eligibility::{Eligibility, EligibilityCache};
use crate::error::{PlaybackError, Result};
use crate::metadata::MetadataPublisher;
use crate::resolver::{ChapterSourceResolver, ResolvedSource};
use crate::session::{Chapter, ContentInfo, PlaybackSession};
use bridge_traits::{
    AudioEngine, AudioSessionCategory, AudioSessionEvent, AudioSessionHost, AudioSource, Clock,
    EngineEvent, MediaControl, MediaSessionHost, ProcessingState, ProgressReason, ProgressSink,
    ProgressUpdate, RemoteCommand, TransportState,
};
use core_runtime::config::{CoreConfig, PlaybackSettings};
use core_runtime::events::{CompletionReason, CoreEvent, EventBus, PlaybackEvent, Receiver};
use core_runtime::logging::redact_locator;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// Request to load and start a chapter.
#[derive(Debug, Clone)]
pub struct PlayChapterRequest {
    pub content: ContentInfo,
    pub chapters: Vec<Chapter>,
    pub index: usize,
    /// Caller-resolved locator; the resolver runs when absent.
    pub locator: Option<String>,
    pub start_position: Option<Duration>,
    /// Whether `locator` is a local path.
    pub is_local: bool,
}

impl PlayChapterRequest {
    pub fn new(content: ContentInfo, chapters: Vec<Chapter>, index: usize) -> Self {
        Self {
            content,
            chapters,
            index,
            locator: None,
            start_position: None,
            is_local: false,
        }
    }

    pub fn with_locator(mut self, locator: impl Into<String>, is_local: bool) -> Self {
        self.locator = Some(locator.into());
        self.is_local = is_local;
        self
    }

    pub fn with_start_position(mut self, position: Duration) -> Self {
        self.start_position = Some(position);
        self
    }
}

pub struct PlaybackCoordinator {
    engine: Arc<dyn AudioEngine>,
    media_session: Arc<dyn MediaSessionHost>,
    audio_session_host: Arc<dyn AudioSessionHost>,
    progress: Option<Arc<dyn ProgressSink>>,
    clock: Arc<dyn Clock>,
    settings: PlaybackSettings,

    queue: CommandQueue,
    audio_session: AudioSessionCoordinator,
    metadata: MetadataPublisher,
    resolver: ChapterSourceResolver,
    machine: Arc<AdvanceMachine>,
    completion: CompletionDetector,
    notifier: Arc<dyn TransitionNotifier>,
    eligibility: EligibilityCache,
    events: EventBus,

    session: RwLock<Option<PlaybackSession>>,
    loading_key: Arc<AtomicU64>,
    user_requested_pause: AtomicBool,
    pumps: Mutex<Vec<JoinHandle<()>>>,
}

impl PlaybackCoordinator {
    /// Build a coordinator with its own event bus, sized by
    /// `settings.event_buffer_size`. Observers attach through [`Self::subscribe`].
    pub fn new(config: CoreConfig) -> Arc<Self> {
        let events = EventBus::new(config.settings.event_buffer_size);
        let machine = Arc::new(AdvanceMachine::new());
        let notifier = notifier_for(
            config.execution_context,
            events.clone(),
            Arc::clone(&config.media_session),
        );

        info!(context = ?config.execution_context, "Creating playback coordinator");

        Arc::new(Self {
            queue: CommandQueue::from_settings(&config.settings),
            audio_session: AudioSessionCoordinator::new(
                Arc::clone(&config.audio_session),
                AudioSessionCategory::SpokenAudio,
            ),
            metadata: MetadataPublisher::new(Arc::clone(&config.media_session)),
            resolver: ChapterSourceResolver::from_config(&config),
            completion: CompletionDetector::new(Arc::clone(&machine)),
            machine,
            notifier,
            eligibility: EligibilityCache::default(),
            events,
            session: RwLock::new(None),
            loading_key: Arc::new(AtomicU64::new(0)),
            user_requested_pause: AtomicBool::new(false),
            pumps: Mutex::new(Vec::new()),
            engine: config.engine,
            media_session: config.media_session,
            audio_session_host: config.audio_session,
            progress: config.progress_sink,
            clock: config.clock,
            settings: config.settings,
        })
    }

    /// Subscribe to host streams and route them into the coordinator.
    ///
    /// The engine stream is required. Media session commands and audio session
    /// events are optional; a host that cannot provide them is logged and
    /// skipped.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.audio_session.configure_once().await;

        let mut pumps = Vec::new();

        let mut engine_events = self.engine.subscribe_events().await?;
        let weak = Arc::downgrade(self);
        pumps.push(tokio::spawn(async move {
            while let Some(event) = engine_events.next().await {
                let Some(this) = weak.upgrade() else { break };
                this.handle_engine_event(event).await;
            }
            debug!("Engine event stream ended");
        }));

        match self.media_session.subscribe_commands().await {
            Ok(mut commands) => {
                let weak = Arc::downgrade(self);
                pumps.push(tokio::spawn(async move {
                    while let Some(command) = commands.next().await {
                        let Some(this) = weak.upgrade() else { break };
                        this.handle_remote_command(command).await;
                    }
                    debug!("Remote command stream ended");
                }));
            }
            Err(err) => warn!(error = %err, "Remote commands unavailable"),
        }

        match self.audio_session_host.subscribe_events().await {
            Ok(mut session_events) => {
                let weak: Weak<Self> = Arc::downgrade(self);
                pumps.push(tokio::spawn(async move {
                    while let Some(event) = session_events.next().await {
                        let Some(this) = weak.upgrade() else { break };
                        this.handle_audio_session_event(event).await;
                    }
                    debug!("Audio session event stream ended");
                }));
            }
            Err(err) => warn!(error = %err, "Audio session events unavailable"),
        }

        self.pumps.lock().extend(pumps);
        Ok(())
    }

    // ========================================================================
    // Caller commands
    // ========================================================================

    /// Load a chapter and start playing it.
    ///
    /// Replaces the session wholesale. Speed carries over when the same content
    /// is reloaded; a different content item starts at the default speed.
    ///
    /// The queue position is claimed before any host call, so commands issued
    /// after this one run after it. The session and lock screen switch to the
    /// new chapter only once the engine has opened it; a rejected or failed
    /// open leaves the previous session in place.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::CircuitOpen`] without side effects while the breaker
    /// is open, [`PlaybackError::Superseded`] if a newer load started before
    /// this one finished; otherwise whatever resolution or the engine reported.
    #[instrument(skip(self, request), fields(content = %request.content.id, index = request.index))]
    pub async fn play_chapter(&self, request: PlayChapterRequest) -> Result<()> {
        let PlayChapterRequest {
            content,
            chapters,
            index,
            locator,
            start_position,
            is_local,
        } = request;

        let speed = self.speed_for(&content.id);
        let session = PlaybackSession::new(content, chapters, index, speed)?;

        let turn = self.queue.reserve("load_chapter")?;
        let key = self.next_loading_key();
        self.user_requested_pause.store(false, Ordering::SeqCst);

        // An unresolvable chapter drops the turn, which leaves the breaker alone.
        let resolved = match locator {
            Some(locator) => ResolvedSource {
                source: AudioSource::from_locator(locator, is_local),
                is_local,
            },
            None => {
                self.resolver
                    .resolve(session.content_id(), session.current_chapter())
                    .await?
            }
        };

        debug!(
            source = %redact_locator(&resolved.source.locator()),
            local = resolved.is_local,
            "Loading chapter"
        );
        let pending = &session;
        let source = &resolved.source;
        let result = turn
            .run(move || self.load_chapter(key, pending, source, start_position))
            .await;

        match result {
            Ok(duration) => {
                if let Some(duration) = duration {
                    self.apply_duration(duration).await;
                }
                self.events.emit_playback(PlaybackEvent::ChapterStarted {
                    content_id: session.content_id().to_string(),
                    chapter_index: session.current_index(),
                    title: session.current_chapter().title.clone(),
                });
                self.record_progress(
                    &session,
                    start_position.unwrap_or_default(),
                    ProgressReason::ChapterChange,
                );
                self.republish_transport().await;
                Ok(())
            }
            Err(err) if err.is_supersession() => {
                debug!("Chapter load superseded");
                Err(err)
            }
            Err(err) => {
                error!(error = %err, "Chapter load failed");
                self.events.emit_playback(PlaybackEvent::Error {
                    content_id: Some(session.content_id().to_string()),
                    message: err.to_string(),
                    recoverable: err.is_transient(),
                });
                self.republish_transport().await;
                Err(err)
            }
        }
    }

    /// Resume the loaded chapter.
    #[instrument(skip(self))]
    pub async fn play(&self) -> Result<()> {
        let (content_id, chapter_index) = self.current_ids().ok_or(PlaybackError::NoActiveSession)?;

        let turn = self.queue.reserve("play")?;
        self.user_requested_pause.store(false, Ordering::SeqCst);
        turn.run(move || self.resume_engine()).await?;

        self.events.emit_playback(PlaybackEvent::Resumed {
            content_id,
            chapter_index,
        });
        self.republish_transport().await;
        Ok(())
    }

    /// Pause. Marks the pause as deliberate so auto-advance never overrides it.
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        self.user_requested_pause.store(true, Ordering::SeqCst);
        self.enqueue_engine("pause", |engine| async move { engine.pause().await })
            .await?;

        let position = self.engine.snapshot().position;
        let session = self.session.read().clone();
        if let Some(session) = session {
            self.events.emit_playback(PlaybackEvent::Paused {
                content_id: session.content_id().to_string(),
                chapter_index: session.current_index(),
                position_ms: position.as_millis() as u64,
            });
            self.record_progress(&session, position, ProgressReason::Pause);
        }
        self.republish_transport().await;
        Ok(())
    }

    /// Stop and clear the session. Pending loads are superseded.
    ///
    /// The session is cleared even if the engine fails to stop; the engine
    /// error is still returned.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let position = self.engine.snapshot().position;
        self.loading_key.fetch_add(1, Ordering::SeqCst);

        let result = self
            .enqueue_engine("stop", |engine| async move { engine.stop().await })
            .await;

        let previous = self.session.write().take();
        self.machine.finish(AdvanceState::Stopped);
        self.user_requested_pause.store(false, Ordering::SeqCst);

        if let Some(session) = &previous {
            self.record_progress(session, position, ProgressReason::Stop);
        }
        if let Err(err) = self.metadata.clear().await {
            warn!(error = %err, "Failed to clear media session");
        }
        self.audio_session.deactivate().await;

        self.events.emit_playback(PlaybackEvent::Stopped {
            content_id: previous.map(|session| session.content_id().to_string()),
        });
        result
    }

    #[instrument(skip(self))]
    pub async fn seek(&self, position: Duration) -> Result<()> {
        if self.session.read().is_none() {
            return Err(PlaybackError::NoActiveSession);
        }

        self.enqueue_engine("seek", move |engine| async move { engine.seek(position).await })
            .await?;
        self.republish_transport().await;
        Ok(())
    }

    /// Change the playback rate. Persists across chapter changes.
    #[instrument(skip(self))]
    pub async fn set_speed(&self, speed: f32) -> Result<()> {
        if !self.settings.speed_in_range(speed) {
            return Err(PlaybackError::InvalidSpeed(speed));
        }

        self.enqueue_engine("set_speed", move |engine| async move {
            engine.set_speed(speed).await
        })
        .await?;

        if let Some(session) = self.session.write().as_mut() {
            session.set_speed(speed);
        }
        self.republish_transport().await;
        Ok(())
    }

    /// Load the next chapter.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoNextChapter`] at the end,
    /// [`PlaybackError::ChapterLocked`] when the next chapter is gated.
    pub async fn skip_to_next(&self) -> Result<()> {
        let request = {
            let current = self.session.read();
            let session = current.as_ref().ok_or(PlaybackError::NoActiveSession)?;
            let next = session.next_index().ok_or(PlaybackError::NoNextChapter)?;
            self.request_for(session, next)?
        };
        self.play_chapter(request).await
    }

    /// Restart the current chapter when past the restart threshold or at the
    /// first chapter; otherwise load the previous chapter.
    pub async fn skip_to_previous(&self) -> Result<()> {
        let position = self.engine.snapshot().position;
        let request = {
            let current = self.session.read();
            let session = current.as_ref().ok_or(PlaybackError::NoActiveSession)?;
            match session.previous_index() {
                Some(previous) if position <= self.settings.previous_restart_threshold => {
                    Some(self.request_for(session, previous)?)
                }
                _ => None,
            }
        };

        match request {
            Some(request) => self.play_chapter(request).await,
            None => self.seek(Duration::ZERO).await,
        }
    }

    /// Manual operator override for the circuit breaker.
    pub fn reset_circuit_breaker(&self) {
        self.queue.reset_circuit_breaker();
    }

    // ========================================================================
    // Eligibility setters (access-control layer)
    // ========================================================================

    pub fn set_eligibility(&self, eligibility: Eligibility) {
        debug!(?eligibility, "Eligibility updated");
        self.eligibility.replace(eligibility);
    }

    pub fn set_owned(&self, is_owned: bool) {
        self.eligibility.update(|e| e.is_owned = is_owned);
    }

    pub fn set_free_content(&self, is_free_content: bool) {
        self.eligibility.update(|e| e.is_free_content = is_free_content);
    }

    pub fn set_auto_advance_enabled(&self, enabled: bool) {
        self.eligibility.update(|e| e.auto_advance_enabled = enabled);
    }

    pub fn set_sleep_timer_active(&self, active: bool) {
        self.eligibility.update(|e| e.sleep_timer_active = active);
    }

    // ========================================================================
    // Observers and accessors
    // ========================================================================

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> Option<PlaybackSession> {
        self.session.read().clone()
    }

    pub fn eligibility(&self) -> Eligibility {
        self.eligibility.snapshot()
    }

    pub fn advance_state(&self) -> AdvanceState {
        self.machine.state()
    }

    pub fn breaker_status(&self) -> BreakerStatus {
        self.queue.breaker_status()
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.pending()
    }

    // ========================================================================
    // Inbound host events
    // ========================================================================

    pub async fn handle_engine_event(self: &Arc<Self>, event: EngineEvent) {
        match event {
            EngineEvent::StateChanged(update) => {
                self.emit_state_changed(update.playing, update.processing);
                if let Some(signal) = self.completion.on_state_changed(&update) {
                    self.on_completion(signal);
                }
                self.republish_transport().await;
            }
            EngineEvent::Playback(update) => {
                if let Some(signal) = self.completion.on_playback_event(&update) {
                    self.on_completion(signal);
                }
                // Late events from the previous chapter carry its duration.
                if let Some(duration) = update.duration {
                    if !self.machine.is_suppressed() {
                        self.apply_duration(duration).await;
                    }
                }
            }
            EngineEvent::DurationDiscovered(duration) => self.apply_duration(duration).await,
        }
    }

    pub async fn handle_audio_session_event(&self, event: AudioSessionEvent) {
        let playing = self.engine.snapshot().playing;
        if self.audio_session.action_for(event, playing) != SessionAction::Pause {
            return;
        }

        let cause = match event {
            AudioSessionEvent::RouteLost => "route_lost",
            _ => "interruption",
        };
        self.events.emit_playback(PlaybackEvent::Interrupted {
            cause: cause.to_string(),
        });

        if let Err(err) = self.pause().await {
            warn!(error = %err, cause, "Pause after audio session event failed");
        }
    }

    /// Route a media session command through the public API. Errors are
    /// logged, never returned to the host callback.
    pub async fn handle_remote_command(&self, command: RemoteCommand) {
        debug!(?command, "Remote command");
        let result = match command {
            RemoteCommand::Play => self.play().await,
            RemoteCommand::Pause => self.pause().await,
            RemoteCommand::Stop => self.stop().await,
            RemoteCommand::Seek(position) => self.seek(position).await,
            RemoteCommand::SkipToNext => self.skip_to_next().await,
            RemoteCommand::SkipToPrevious => self.skip_to_previous().await,
            RemoteCommand::SetSpeed(speed) => self.set_speed(speed).await,
        };

        match result {
            Ok(()) => {}
            Err(err) if err.is_supersession() => debug!(?command, "Remote command superseded"),
            Err(err) => warn!(?command, error = %err, "Remote command failed"),
        }
    }

    // ========================================================================
    // Completion and auto-advance
    // ========================================================================

    fn on_completion(self: &Arc<Self>, signal: CompletionSignal) {
        let Some(generation) = self.machine.begin() else {
            trace!(source = ?signal.source, "Completion already being handled");
            return;
        };

        info!(source = ?signal.source, "Chapter completed");
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_advance(generation).await;
        });
    }

    async fn run_advance(&self, generation: u64) {
        let session = self.session.read().clone();
        let eligibility = self.eligibility.snapshot();
        let decision = decide(session.as_ref(), &eligibility);

        let content_id = session.as_ref().map(|s| s.content_id().to_string());
        let from_index = session.as_ref().map(|s| s.current_index());

        match (decision, session) {
            (AdvanceDecision::Advance { next_index }, Some(session)) => {
                self.machine.enter_advancing();
                match self.advance_to(&session, next_index).await {
                    Ok(()) => {
                        self.machine.finish(AdvanceState::Idle);
                        info!(from = session.current_index(), to = next_index, "Auto-advanced");
                        self.notifier
                            .notify(PlaybackEvent::ChapterAdvanced {
                                content_id: session.content_id().to_string(),
                                from_index: session.current_index(),
                                to_index: next_index,
                            })
                            .await;
                    }
                    Err(err) if err.is_supersession() => {
                        debug!("Auto-advance superseded by a newer load");
                        self.machine.finish(AdvanceState::Idle);
                    }
                    Err(err) => {
                        error!(error = %err, next_index, "Auto-advance failed, stopping");
                        self.machine.finish(AdvanceState::Stopped);
                        self.notifier
                            .notify(PlaybackEvent::Completed {
                                content_id,
                                chapter_index: from_index,
                                reason: CompletionReason::AdvanceFailed,
                            })
                            .await;
                    }
                }
            }
            (decision, _) => {
                match decision {
                    AdvanceDecision::NoSession => {
                        warn!("Completion without a session, stopping engine");
                        if let Err(err) = self.engine_call("stop", self.engine.stop()).await {
                            warn!(error = %err, "Engine stop failed");
                        }
                    }
                    decision if decision.pauses() => {
                        if let Err(err) = self.engine_call("pause", self.engine.pause()).await {
                            warn!(error = %err, "Engine pause failed");
                        }
                    }
                    _ => {}
                }

                info!(?decision, "Playback ended without advancing");
                self.machine.finish(AdvanceState::Stopped);
                self.notifier
                    .notify(PlaybackEvent::Completed {
                        content_id,
                        chapter_index: from_index,
                        reason: decision
                            .completion_reason()
                            .unwrap_or(CompletionReason::NoSession),
                    })
                    .await;
            }
        }

        self.schedule_settle(generation, self.settings.advance_settle_delay);
        self.republish_transport().await;
    }

    /// Resolve, switch the session index, stop, publish, open, reapply speed,
    /// play, then verify.
    async fn advance_to(&self, session: &PlaybackSession, next_index: usize) -> Result<()> {
        let key = self.next_loading_key();
        let chapter = session
            .chapter(next_index)
            .cloned()
            .ok_or(PlaybackError::InvalidChapterIndex {
                index: next_index,
                len: session.chapter_count(),
            })?;

        let resolved = self.resolver.resolve(session.content_id(), &chapter).await?;

        let updated = {
            let mut current = self.session.write();
            self.ensure_current(key, "auto_advance")?;
            match current.as_mut() {
                Some(current) if current.content_id() == session.content_id() => {
                    current.set_current_index(next_index)?;
                    current.clone()
                }
                _ => return Err(PlaybackError::superseded("auto_advance")),
            }
        };

        self.engine_call("stop", self.engine.stop()).await?;

        if let Err(err) = self.metadata.publish(updated.now_playing()).await {
            warn!(error = %err, "Failed to publish metadata for next chapter");
        }

        self.ensure_current(key, "auto_advance")?;
        let duration = self
            .engine_call("open", self.engine.open(resolved.source, None))
            .await?;
        self.engine_call("set_speed", self.engine.set_speed(updated.speed()))
            .await?;

        self.ensure_current(key, "auto_advance")?;
        self.engine_call("play", self.engine.play()).await?;

        if let Some(duration) = duration {
            self.apply_duration(duration).await;
        }
        self.record_progress(&updated, Duration::ZERO, ProgressReason::ChapterChange);

        tokio::time::sleep(self.settings.play_verify_grace).await;
        self.verify_playing(key).await
    }

    /// Retry `play` once if the engine is neither playing nor on its way there
    /// and the listener did not pause on purpose.
    async fn verify_playing(&self, key: u64) -> Result<()> {
        let snapshot = self.engine.snapshot();
        if snapshot.playing || snapshot.processing.is_pending() {
            return Ok(());
        }
        if self.user_requested_pause.load(Ordering::SeqCst) {
            debug!("Listener paused during advance, not retrying play");
            return Ok(());
        }

        self.ensure_current(key, "auto_advance")?;
        warn!(processing = ?snapshot.processing, "Next chapter not playing, retrying play once");
        self.engine_call("play", self.engine.play()).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Body of a queued chapter load. Runs once per attempt.
    async fn load_chapter(
        &self,
        key: u64,
        session: &PlaybackSession,
        source: &AudioSource,
        start_position: Option<Duration>,
    ) -> Result<Option<Duration>> {
        self.ensure_current(key, "load_chapter")?;

        // Late completion events from the outgoing source must not advance.
        let generation = self.machine.suppress_for_transition();
        self.machine.finish(AdvanceState::Idle);
        self.schedule_settle(generation, self.settings.completion_settle_delay);

        let duration = self.engine.open(source.clone(), start_position).await?;

        {
            let mut current = self.session.write();
            self.ensure_current(key, "load_chapter")?;
            *current = Some(session.clone());
        }

        if let Err(err) = self.metadata.publish(session.now_playing()).await {
            warn!(error = %err, "Failed to publish metadata");
        }
        self.audio_session.activate().await;

        self.ensure_current(key, "load_chapter")?;
        self.engine.set_speed(session.speed()).await?;
        self.engine.play().await?;
        Ok(duration)
    }

    async fn resume_engine(&self) -> Result<()> {
        self.audio_session.activate().await;
        self.engine.play().await.map_err(PlaybackError::from)
    }

    fn enqueue_engine<F, Fut>(&self, name: &'static str, call: F) -> BoxFuture<'static, Result<()>>
    where
        F: Fn(Arc<dyn AudioEngine>) -> Fut + Send + 'static,
        Fut: Future<Output = bridge_traits::error::Result<()>> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        self.queue.enqueue(name, move || {
            let pending = call(Arc::clone(&engine));
            async move { pending.await.map_err(PlaybackError::from) }
        })
    }

    /// Direct engine call with the operation timeout, bypassing the queue.
    async fn engine_call<T>(
        &self,
        name: &'static str,
        call: impl Future<Output = bridge_traits::error::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.settings.operation_timeout, call).await {
            Ok(result) => result.map_err(PlaybackError::from),
            Err(_) => Err(PlaybackError::Timeout {
                operation: name.to_string(),
                timeout: self.settings.operation_timeout,
            }),
        }
    }

    fn next_loading_key(&self) -> u64 {
        self.loading_key.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn ensure_current(&self, key: u64, operation: &str) -> Result<()> {
        if self.loading_key.load(Ordering::SeqCst) == key {
            Ok(())
        } else {
            Err(PlaybackError::superseded(operation))
        }
    }

    fn schedule_settle(&self, generation: u64, delay: Duration) {
        let machine = Arc::clone(&self.machine);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if machine.settle(generation) {
                trace!(generation, "Transition guards cleared");
            }
        });
    }

    fn speed_for(&self, content_id: &str) -> f32 {
        match self.session.read().as_ref() {
            Some(session) if session.content_id() == content_id => session.speed(),
            _ => self.settings.default_speed,
        }
    }

    fn request_for(&self, session: &PlaybackSession, index: usize) -> Result<PlayChapterRequest> {
        let chapter = session.chapter(index).ok_or(PlaybackError::InvalidChapterIndex {
            index,
            len: session.chapter_count(),
        })?;
        if !self.eligibility.snapshot().can_play(chapter) {
            return Err(PlaybackError::ChapterLocked { index });
        }
        Ok(PlayChapterRequest::new(
            session.content().clone(),
            session.chapters().to_vec(),
            index,
        ))
    }

    fn current_ids(&self) -> Option<(String, usize)> {
        self.session
            .read()
            .as_ref()
            .map(|session| (session.content_id().to_string(), session.current_index()))
    }

    async fn apply_duration(&self, duration: Duration) {
        match self.metadata.update_duration(duration).await {
            Ok(true) => {
                if let Some((content_id, chapter_index)) = self.current_ids() {
                    self.events.emit_playback(PlaybackEvent::DurationDiscovered {
                        content_id,
                        chapter_index,
                        duration_ms: duration.as_millis() as u64,
                    });
                }
                self.republish_transport().await;
            }
            Ok(false) => {}
            Err(err) => warn!(error = %err, "Failed to republish duration"),
        }
    }

    fn emit_state_changed(&self, playing: bool, processing: ProcessingState) {
        let ids = self.current_ids();
        self.events.emit_playback(PlaybackEvent::StateChanged {
            content_id: ids.as_ref().map(|(id, _)| id.clone()),
            chapter_index: ids.map(|(_, index)| index),
            playing,
            processing: processing_name(processing).to_string(),
            position_ms: self.engine.snapshot().position.as_millis() as u64,
        });
    }

    fn transport_state(&self) -> TransportState {
        let snapshot = self.engine.snapshot();
        let session = self.session.read();

        let mut controls = Vec::new();
        if session.is_some() {
            controls.push(MediaControl::SkipToPrevious);
        }
        controls.push(if snapshot.playing {
            MediaControl::Pause
        } else {
            MediaControl::Play
        });
        if session.as_ref().is_some_and(|s| s.next_index().is_some()) {
            controls.push(MediaControl::SkipToNext);
        }
        controls.extend([MediaControl::Stop, MediaControl::Seek, MediaControl::SetSpeed]);

        TransportState {
            playing: snapshot.playing,
            processing: snapshot.processing,
            position: snapshot.position,
            buffered_position: snapshot.buffered_position,
            speed: session.as_ref().map_or(snapshot.speed, |s| s.speed()),
            controls,
            queue_index: session.as_ref().map(|s| s.current_index()),
        }
    }

    async fn republish_transport(&self) {
        let transport = self.transport_state();
        if let Err(err) = self.metadata.republish_current_state(transport).await {
            warn!(error = %err, "Failed to republish transport state");
        }
    }

    /// Fire-and-forget progress report.
    fn record_progress(&self, session: &PlaybackSession, position: Duration, reason: ProgressReason) {
        let Some(sink) = self.progress.clone() else {
            return;
        };

        let update = ProgressUpdate {
            content_id: session.content_id().to_string(),
            chapter_id: session.current_chapter().id.clone(),
            chapter_index: session.current_index(),
            position,
            reason,
            recorded_at: self.clock.now(),
        };

        tokio::spawn(async move {
            if let Err(err) = sink.record(update).await {
                warn!(error = %err, "Progress sink rejected update");
            }
        });
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        for pump in self.pumps.get_mut().drain(..) {
            pump.abort();
        }
    }
}

fn processing_name(processing: ProcessingState) -> &'static str {
    match processing {
        ProcessingState::Idle => "idle",
        ProcessingState::Loading => "loading",
        ProcessingState::Buffering => "buffering",
        ProcessingState::Ready => "ready",
        ProcessingState::Completed => "completed",
    }
}

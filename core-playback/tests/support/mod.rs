//! Recording fakes for the host bridges, shared by the coordinator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioEngine, AudioSessionCategory, AudioSessionEvent, AudioSessionEventStream,
    AudioSessionHost, AudioSource, BridgeError, EngineEvent, EngineEventStream, EngineSnapshot,
    MediaSessionHost, NowPlaying, ProcessingState, ProgressSink, ProgressUpdate, RemoteCommand,
    RemoteCommandStream, TransportState,
};
use core_playback::{Chapter, ContentInfo, PlaybackCoordinator};
use core_runtime::config::{CoreConfig, ExecutionContext, PlaybackSettings};
use core_runtime::events::{CoreEvent, PlaybackEvent, Receiver, RecvError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Open(String),
    Play,
    Pause,
    Stop,
    Seek(Duration),
    SetSpeed(f32),
}

#[derive(Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    snapshot: EngineSnapshot,
    failing_opens: usize,
    ignore_play: bool,
    events: Option<mpsc::UnboundedSender<EngineEvent>>,
}

#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn take_calls(&self) -> Vec<EngineCall> {
        std::mem::take(&mut self.state.lock().unwrap().calls)
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Open(locator) => Some(locator),
                _ => None,
            })
            .collect()
    }

    /// Fail the next `count` opens with a non-transient error.
    pub fn fail_opens(&self, count: usize) {
        self.state.lock().unwrap().failing_opens = count;
    }

    /// Accept `play` without starting output.
    pub fn ignore_play(&self, ignore: bool) {
        self.state.lock().unwrap().ignore_play = ignore;
    }

    pub fn set_position(&self, position: Duration) {
        self.state.lock().unwrap().snapshot.position = position;
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Some(events) = &self.state.lock().unwrap().events {
            let _ = events.send(event);
        }
    }

    fn record(&self, call: EngineCall) -> std::sync::MutexGuard<'_, EngineState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn open(
        &self,
        source: AudioSource,
        start_position: Option<Duration>,
    ) -> BridgeResult<Option<Duration>> {
        let mut state = self.record(EngineCall::Open(source.locator()));
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(BridgeError::OperationFailed("decoder rejected source".to_string()));
        }
        state.snapshot.playing = false;
        state.snapshot.processing = ProcessingState::Ready;
        state.snapshot.position = start_position.unwrap_or_default();
        Ok(None)
    }

    async fn play(&self) -> BridgeResult<()> {
        let mut state = self.record(EngineCall::Play);
        if !state.ignore_play {
            state.snapshot.playing = true;
        }
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record(EngineCall::Pause).snapshot.playing = false;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        let mut state = self.record(EngineCall::Stop);
        state.snapshot.playing = false;
        state.snapshot.processing = ProcessingState::Idle;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        self.record(EngineCall::Seek(position)).snapshot.position = position;
        Ok(())
    }

    async fn set_speed(&self, speed: f32) -> BridgeResult<()> {
        self.record(EngineCall::SetSpeed(speed)).snapshot.speed = speed;
        Ok(())
    }

    fn snapshot(&self) -> EngineSnapshot {
        self.state.lock().unwrap().snapshot
    }

    async fn subscribe_events(&self) -> BridgeResult<Box<dyn EngineEventStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().events = Some(tx);
        Ok(Box::new(ChannelStream(rx)))
    }
}

pub struct ChannelStream<T>(mpsc::UnboundedReceiver<T>);

#[async_trait]
impl EngineEventStream for ChannelStream<EngineEvent> {
    async fn next(&mut self) -> Option<EngineEvent> {
        self.0.recv().await
    }
}

#[async_trait]
impl RemoteCommandStream for ChannelStream<RemoteCommand> {
    async fn next(&mut self) -> Option<RemoteCommand> {
        self.0.recv().await
    }
}

#[async_trait]
impl AudioSessionEventStream for ChannelStream<AudioSessionEvent> {
    async fn next(&mut self) -> Option<AudioSessionEvent> {
        self.0.recv().await
    }
}

// ============================================================================
// Media session
// ============================================================================

#[derive(Default)]
pub struct MediaSessionLog {
    pub metadata: Vec<NowPlaying>,
    pub transport: Vec<TransportState>,
    pub custom_events: Vec<(String, BTreeMap<String, String>)>,
    pub clears: usize,
}

#[derive(Default)]
pub struct FakeMediaSession {
    log: Mutex<MediaSessionLog>,
    commands: Mutex<Option<mpsc::UnboundedSender<RemoteCommand>>>,
    yields: AtomicBool,
}

impl FakeMediaSession {
    /// Make metadata publishing suspend once, like a real platform bridge.
    pub fn yield_on_publish(&self, yields: bool) {
        self.yields.store(yields, Ordering::SeqCst);
    }

    pub fn with_log<R>(&self, read: impl FnOnce(&MediaSessionLog) -> R) -> R {
        read(&self.log.lock().unwrap())
    }

    pub fn send_command(&self, command: RemoteCommand) {
        if let Some(commands) = &*self.commands.lock().unwrap() {
            let _ = commands.send(command);
        }
    }
}

#[async_trait]
impl MediaSessionHost for FakeMediaSession {
    async fn set_metadata(&self, metadata: NowPlaying) -> BridgeResult<()> {
        if self.yields.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        self.log.lock().unwrap().metadata.push(metadata);
        Ok(())
    }

    async fn set_transport_state(&self, state: TransportState) -> BridgeResult<()> {
        self.log.lock().unwrap().transport.push(state);
        Ok(())
    }

    async fn clear(&self) -> BridgeResult<()> {
        self.log.lock().unwrap().clears += 1;
        Ok(())
    }

    async fn send_custom_event(
        &self,
        name: &str,
        payload: BTreeMap<String, String>,
    ) -> BridgeResult<()> {
        self.log
            .lock()
            .unwrap()
            .custom_events
            .push((name.to_string(), payload));
        Ok(())
    }

    async fn subscribe_commands(&self) -> BridgeResult<Box<dyn RemoteCommandStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.commands.lock().unwrap() = Some(tx);
        Ok(Box::new(ChannelStream(rx)))
    }
}

// ============================================================================
// Audio session
// ============================================================================

#[derive(Default)]
pub struct FakeAudioSession {
    configured: Mutex<Vec<AudioSessionCategory>>,
    activations: Mutex<Vec<bool>>,
    events: Mutex<Option<mpsc::UnboundedSender<AudioSessionEvent>>>,
    yields: AtomicBool,
}

impl FakeAudioSession {
    /// Make activation suspend once, like a real platform bridge.
    pub fn yield_on_activate(&self, yields: bool) {
        self.yields.store(yields, Ordering::SeqCst);
    }

    pub fn configured(&self) -> Vec<AudioSessionCategory> {
        self.configured.lock().unwrap().clone()
    }

    pub fn activations(&self) -> Vec<bool> {
        self.activations.lock().unwrap().clone()
    }

    pub fn emit(&self, event: AudioSessionEvent) {
        if let Some(events) = &*self.events.lock().unwrap() {
            let _ = events.send(event);
        }
    }
}

#[async_trait]
impl AudioSessionHost for FakeAudioSession {
    async fn configure(&self, category: AudioSessionCategory) -> BridgeResult<()> {
        self.configured.lock().unwrap().push(category);
        Ok(())
    }

    async fn set_active(&self, active: bool) -> BridgeResult<()> {
        if self.yields.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        self.activations.lock().unwrap().push(active);
        Ok(())
    }

    async fn subscribe_events(&self) -> BridgeResult<Box<dyn AudioSessionEventStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(tx);
        Ok(Box::new(ChannelStream(rx)))
    }
}

// ============================================================================
// Progress sink
// ============================================================================

#[derive(Default)]
pub struct FakeProgressSink {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl FakeProgressSink {
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for FakeProgressSink {
    async fn record(&self, update: ProgressUpdate) -> BridgeResult<()> {
        self.updates.lock().unwrap().push(update);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub coordinator: Arc<PlaybackCoordinator>,
    pub engine: Arc<FakeEngine>,
    pub media: Arc<FakeMediaSession>,
    pub audio: Arc<FakeAudioSession>,
    pub progress: Arc<FakeProgressSink>,
    pub events: Receiver<CoreEvent>,
}

pub fn harness() -> Harness {
    harness_with(ExecutionContext::Interactive, PlaybackSettings::default())
}

pub fn harness_with(context: ExecutionContext, settings: PlaybackSettings) -> Harness {
    let engine = Arc::new(FakeEngine::default());
    let media = Arc::new(FakeMediaSession::default());
    let audio = Arc::new(FakeAudioSession::default());
    let progress = Arc::new(FakeProgressSink::default());

    let config = CoreConfig::builder()
        .engine(engine.clone())
        .media_session(media.clone())
        .audio_session(audio.clone())
        .progress_sink(progress.clone())
        .execution_context(context)
        .settings(settings)
        .build()
        .expect("valid config");

    let coordinator = PlaybackCoordinator::new(config);
    let events = coordinator.subscribe();

    Harness {
        coordinator,
        engine,
        media,
        audio,
        progress,
        events,
    }
}

pub fn book() -> ContentInfo {
    ContentInfo::new("book-1", "The Long Road").with_author("A. Writer")
}

pub fn chapter_url(index: usize) -> String {
    format!("https://cdn.example.com/book-1/ch{}.mp3", index)
}

/// `count` streamable chapters; the first one is a free preview.
pub fn chapters(count: usize) -> Vec<Chapter> {
    (0..count)
        .map(|index| {
            Chapter::new(format!("ch-{}", index), format!("Chapter {}", index + 1))
                .with_remote_url(chapter_url(index))
                .with_preview(index == 0)
        })
        .collect()
}

/// Long enough for every guard window to close.
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(10)).await;
}

pub fn completed_state() -> EngineEvent {
    EngineEvent::StateChanged(bridge_traits::PlayerStateUpdate {
        playing: false,
        processing: ProcessingState::Completed,
    })
}

pub fn completed_playback(duration: Duration) -> EngineEvent {
    EngineEvent::Playback(bridge_traits::PlaybackEventUpdate {
        processing: ProcessingState::Completed,
        position: duration,
        buffered_position: duration,
        duration: Some(duration),
    })
}

pub async fn wait_for<F>(events: &mut Receiver<CoreEvent>, mut matches: F) -> PlaybackEvent
where
    F: FnMut(&PlaybackEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            match events.recv().await {
                Ok(CoreEvent::Playback(event)) if matches(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for playback event")
}

pub fn drain(events: &mut Receiver<CoreEvent>) -> Vec<PlaybackEvent> {
    let mut drained = Vec::new();
    while let Ok(CoreEvent::Playback(event)) = events.try_recv() {
        drained.push(event);
    }
    drained
}

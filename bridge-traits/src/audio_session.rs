//! Platform audio session (audio focus, category, interruptions, routes).

use crate::error::Result;
use async_trait::async_trait;

/// Category requested from the platform when configuring the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioSessionCategory {
    /// Long-form speech (audiobooks, podcasts).
    #[default]
    SpokenAudio,
    /// Music playback.
    Music,
}

/// Notifications raised by the platform audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSessionEvent {
    /// Another party took audio focus (phone call, other app, alarm).
    InterruptionBegan,
    /// The interruption is over. `should_resume` is the platform's hint.
    InterruptionEnded { should_resume: bool },
    /// The output route disappeared (headphones unplugged, Bluetooth lost).
    RouteLost,
}

/// Platform audio session.
#[async_trait]
pub trait AudioSessionHost: Send + Sync {
    /// Configure category and focus semantics.
    async fn configure(&self, category: AudioSessionCategory) -> Result<()>;

    /// Request or abandon audio focus.
    async fn set_active(&self, active: bool) -> Result<()>;

    /// Subscribe to interruption and route notifications.
    async fn subscribe_events(&self) -> Result<Box<dyn AudioSessionEventStream>>;
}

/// Stream of [`AudioSessionEvent`]s.
#[async_trait]
pub trait AudioSessionEventStream: Send {
    async fn next(&mut self) -> Option<AudioSessionEvent>;
}

//! Audio session coordinator.
//!
//! Configures the platform session once and keeps activation idempotent;
//! rapid re-activation degrades focus handling on some platforms. Failures are
//! logged and swallowed since several platforms play fine without an explicit
//! activation.

use bridge_traits::{AudioSessionCategory, AudioSessionEvent, AudioSessionHost};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the coordinator should do in response to a session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Pause through the normal command path.
    Pause,
    None,
}

pub struct AudioSessionCoordinator {
    host: Arc<dyn AudioSessionHost>,
    category: AudioSessionCategory,
    configured: AtomicBool,
    active: AtomicBool,
}

impl AudioSessionCoordinator {
    pub fn new(host: Arc<dyn AudioSessionHost>, category: AudioSessionCategory) -> Self {
        Self {
            host,
            category,
            configured: AtomicBool::new(false),
            active: AtomicBool::new(false),
        }
    }

    pub async fn configure_once(&self) {
        if self.configured.load(Ordering::SeqCst) {
            return;
        }

        match self.host.configure(self.category).await {
            Ok(()) => {
                self.configured.store(true, Ordering::SeqCst);
                debug!(category = ?self.category, "Audio session configured");
            }
            Err(err) => warn!(error = %err, "Audio session configuration failed"),
        }
    }

    pub async fn activate(&self) {
        self.configure_once().await;
        self.set_active(true).await;
    }

    pub async fn deactivate(&self) {
        self.set_active(false).await;
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn set_active(&self, active: bool) {
        if self.active.load(Ordering::SeqCst) == active {
            return;
        }

        match self.host.set_active(active).await {
            Ok(()) => {
                self.active.store(active, Ordering::SeqCst);
                debug!(active, "Audio session activation changed");
            }
            Err(err) => warn!(active, error = %err, "Audio session activation failed"),
        }
    }

    /// Map a session event to an action given whether the engine is playing.
    ///
    /// The end of an interruption never resumes playback, even when the
    /// platform hints that it may; the listener resumes explicitly.
    pub fn action_for(&self, event: AudioSessionEvent, playing: bool) -> SessionAction {
        match event {
            AudioSessionEvent::InterruptionBegan | AudioSessionEvent::RouteLost if playing => {
                info!(?event, "Pausing for audio session event");
                SessionAction::Pause
            }
            AudioSessionEvent::InterruptionEnded { should_resume } => {
                info!(should_resume, "Interruption ended, staying paused");
                SessionAction::None
            }
            _ => SessionAction::None,
        }
    }
}

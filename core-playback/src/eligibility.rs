//! Eligibility cache.
//!
//! Access-control facts pushed in by the entitlement layer so the next chapter
//! can be gated without a network round-trip from a backgrounded process. The
//! snapshot may be a few seconds stale after an entitlement change; that is an
//! accepted risk.

use crate::session::Chapter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub is_owned: bool,
    pub is_free_content: bool,
    pub auto_advance_enabled: bool,
    pub sleep_timer_active: bool,
}

impl Default for Eligibility {
    fn default() -> Self {
        Self {
            is_owned: false,
            is_free_content: false,
            auto_advance_enabled: true,
            sleep_timer_active: false,
        }
    }
}

impl Eligibility {
    /// Whether the listener may play `chapter`.
    pub fn can_play(&self, chapter: &Chapter) -> bool {
        self.is_owned || self.is_free_content || chapter.is_preview
    }
}

/// Written only through the coordinator's setters; read as snapshots.
#[derive(Debug, Default)]
pub struct EligibilityCache {
    inner: RwLock<Eligibility>,
}

impl EligibilityCache {
    pub fn new(initial: Eligibility) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    pub fn snapshot(&self) -> Eligibility {
        *self.inner.read()
    }

    pub fn replace(&self, eligibility: Eligibility) {
        *self.inner.write() = eligibility;
    }

    pub fn update(&self, apply: impl FnOnce(&mut Eligibility)) {
        let mut guard = self.inner.write();
        apply(&mut *guard);
    }
}

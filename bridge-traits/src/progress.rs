//! Listening progress sink.
//!
//! Persistence of listening position belongs to another subsystem. The core
//! only reports the moments worth saving and never waits on the outcome.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why a progress update was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressReason {
    Pause,
    Stop,
    ChapterChange,
}

/// Listening position at a given moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub content_id: String,
    pub chapter_id: String,
    pub chapter_index: usize,
    pub position: Duration,
    pub reason: ProgressReason,
    pub recorded_at: DateTime<Utc>,
}

/// Receiver of progress updates.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn record(&self, update: ProgressUpdate) -> Result<()>;
}

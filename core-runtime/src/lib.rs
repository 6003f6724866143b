//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the playback crates:
//! - Logging and tracing initialisation
//! - Configuration and host bridge injection
//! - Event bus for observers
//!
//! ## Overview
//!
//! Nothing here knows about chapters or engines beyond the bridge traits it
//! carries. `core-playback` builds the coordinator on top of these pieces.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, ExecutionContext, PlaybackSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream, PlaybackEvent};

//! Audiobook playback core.
//!
//! Single dependency for hosts: re-exports the bridge contracts they implement,
//! the runtime pieces they configure, and the playback coordinator they drive.
//!
//! ```ignore
//! use audiobook_core::{CoreConfig, PlaybackCoordinator, PlayChapterRequest};
//!
//! let config = CoreConfig::builder()
//!     .engine(engine)
//!     .media_session(media_session)
//!     .audio_session(audio_session)
//!     .build()?;
//! let coordinator = PlaybackCoordinator::new(config);
//! let mut events = coordinator.subscribe();
//! coordinator.start().await?;
//! coordinator
//!     .play_chapter(PlayChapterRequest::new(content, chapters, 0))
//!     .await?;
//! ```

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

pub use core_playback::{
    Chapter, ContentInfo, Eligibility, PlayChapterRequest, PlaybackCoordinator, PlaybackError,
    PlaybackSession,
};
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder, ExecutionContext, PlaybackSettings};
pub use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

//! Metadata publisher for the host media session.
//!
//! Keeps the lock screen and notification controls in step with what the
//! engine is doing. The initial duration of a stream is frequently a
//! placeholder, so [`MetadataPublisher::update_duration`] republishes once the
//! engine has parsed the real one, and skips the host call when nothing changed.

use crate::error::Result;
use bridge_traits::{MediaSessionHost, NowPlaying, TransportState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Default)]
struct Published {
    now_playing: Option<NowPlaying>,
    transport: Option<TransportState>,
}

pub struct MetadataPublisher {
    host: Arc<dyn MediaSessionHost>,
    published: Mutex<Published>,
}

impl MetadataPublisher {
    pub fn new(host: Arc<dyn MediaSessionHost>) -> Self {
        Self {
            host,
            published: Mutex::new(Published::default()),
        }
    }

    /// Replace the now-playing metadata.
    pub async fn publish(&self, now_playing: NowPlaying) -> Result<()> {
        debug!(id = %now_playing.id, duration = ?now_playing.duration, "Publishing metadata");
        self.published.lock().now_playing = Some(now_playing.clone());
        self.host.set_metadata(now_playing).await?;
        Ok(())
    }

    /// Republish with the engine-discovered duration.
    ///
    /// Returns `false` without calling the host when nothing is published or
    /// the duration is unchanged.
    pub async fn update_duration(&self, duration: Duration) -> Result<bool> {
        let updated = {
            let mut published = self.published.lock();
            match published.now_playing.as_mut() {
                None => return Ok(false),
                Some(current) if current.duration == Some(duration) => return Ok(false),
                Some(current) => {
                    current.duration = Some(duration);
                    current.clone()
                }
            }
        };

        debug!(id = %updated.id, ?duration, "Duration discovered, republishing");
        self.host.set_metadata(updated).await?;
        Ok(true)
    }

    /// Push the transport state (play/pause, position, controls) to the host.
    pub async fn republish_current_state(&self, transport: TransportState) -> Result<()> {
        self.published.lock().transport = Some(transport.clone());
        self.host.set_transport_state(transport).await?;
        Ok(())
    }

    /// Remove the now-playing entry.
    pub async fn clear(&self) -> Result<()> {
        *self.published.lock() = Published::default();
        self.host.clear().await?;
        Ok(())
    }

    pub fn current(&self) -> Option<NowPlaying> {
        self.published.lock().now_playing.clone()
    }

    pub fn last_transport_state(&self) -> Option<TransportState> {
        self.published.lock().transport.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, RemoteCommandStream};
    use mockall::mock;
    use std::collections::BTreeMap;

    mock! {
        pub Host {}

        #[async_trait]
        impl MediaSessionHost for Host {
            async fn set_metadata(&self, metadata: NowPlaying) -> bridge_traits::error::Result<()>;
            async fn set_transport_state(&self, state: TransportState) -> bridge_traits::error::Result<()>;
            async fn clear(&self) -> bridge_traits::error::Result<()>;
            async fn send_custom_event(
                &self,
                name: &str,
                payload: BTreeMap<String, String>,
            ) -> bridge_traits::error::Result<()>;
            async fn subscribe_commands(&self) -> bridge_traits::error::Result<Box<dyn RemoteCommandStream>>;
        }
    }

    fn chapter_metadata() -> NowPlaying {
        NowPlaying::new("ch-1", "Chapter 2").with_extra("chapter_index", "1")
    }

    #[tokio::test]
    async fn same_duration_is_published_once() {
        let mut host = MockHost::new();
        host.expect_set_metadata()
            .withf(|metadata| metadata.duration.is_none())
            .times(1)
            .returning(|_| Ok(()));
        host.expect_set_metadata()
            .withf(|metadata| metadata.duration == Some(Duration::from_secs(1325)))
            .times(1)
            .returning(|_| Ok(()));

        let publisher = MetadataPublisher::new(Arc::new(host));
        publisher.publish(chapter_metadata()).await.unwrap();

        assert!(publisher
            .update_duration(Duration::from_secs(1325))
            .await
            .unwrap());
        assert!(!publisher
            .update_duration(Duration::from_secs(1325))
            .await
            .unwrap());
        assert_eq!(
            publisher.current().unwrap().duration,
            Some(Duration::from_secs(1325))
        );
    }

    #[tokio::test]
    async fn duration_without_metadata_is_ignored() {
        let publisher = MetadataPublisher::new(Arc::new(MockHost::new()));
        assert!(!publisher
            .update_duration(Duration::from_secs(10))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn clear_forgets_published_state() {
        let mut host = MockHost::new();
        host.expect_set_metadata().returning(|_| Ok(()));
        host.expect_set_transport_state().returning(|_| Ok(()));
        host.expect_clear().times(1).returning(|| Ok(()));

        let publisher = MetadataPublisher::new(Arc::new(host));
        publisher.publish(chapter_metadata()).await.unwrap();
        publisher
            .republish_current_state(TransportState::default())
            .await
            .unwrap();
        publisher.clear().await.unwrap();

        assert!(publisher.current().is_none());
        assert!(publisher.last_transport_state().is_none());
    }

    #[tokio::test]
    async fn host_failure_propagates() {
        let mut host = MockHost::new();
        host.expect_set_metadata()
            .returning(|_| Err(BridgeError::NotAvailable("session released".to_string())));

        let publisher = MetadataPublisher::new(Arc::new(host));
        assert!(publisher.publish(chapter_metadata()).await.is_err());
    }
}

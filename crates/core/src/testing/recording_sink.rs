//! Announcement sink that records what it receives.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::first_blood::{AnnouncementSink, FirstBloodAnnouncement};
use crate::platform::PlatformError;

/// Records announcements instead of posting them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    announcements: Arc<RwLock<Vec<(u64, FirstBloodAnnouncement)>>>,
    next_error: Arc<RwLock<Option<PlatformError>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next announcement fail with `error`.
    pub async fn fail_next(&self, error: PlatformError) {
        *self.next_error.write().await = Some(error);
    }

    /// Announcements delivered, with their channel id.
    pub async fn announcements(&self) -> Vec<(u64, FirstBloodAnnouncement)> {
        self.announcements.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.announcements.read().await.len()
    }
}

#[async_trait]
impl AnnouncementSink for RecordingSink {
    async fn announce(
        &self,
        channel_id: u64,
        announcement: &FirstBloodAnnouncement,
    ) -> Result<(), PlatformError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        self.announcements
            .write()
            .await
            .push((channel_id, announcement.clone()));
        Ok(())
    }
}

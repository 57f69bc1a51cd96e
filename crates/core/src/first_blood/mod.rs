//! CTFd First Blood monitor.
//!
//! The [`PollScheduler`] runs [`FirstBloodDetector::check_once`] on a fixed
//! interval. Each challenge is announced at most once; announced ids persist
//! through a [`NotifiedStore`].

mod announcement;
mod detector;
mod scheduler;
mod solver;
mod state;
mod timeparse;

pub use announcement::{category_color, FirstBloodAnnouncement, ANNOUNCEMENT_FOOTER, ANNOUNCEMENT_TITLE};
pub use detector::{earliest_solve, FirstBloodDetector, MonitorError, PollReport};
pub use scheduler::{CycleOutcome, PollScheduler, SchedulerStatus};
pub use solver::{resolve as resolve_solver, Solver, SolverRef};
pub use state::{JsonNotifiedStore, MemoryNotifiedStore, NotifiedStore, NotifiedStoreError};
pub use timeparse::{parse_timestamp, solve_time};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::platform::{ChatPlatform, OutgoingMessage, PlatformError};

/// Destination for First Blood announcements.
#[async_trait]
pub trait AnnouncementSink: Send + Sync {
    async fn announce(
        &self,
        channel_id: u64,
        announcement: &FirstBloodAnnouncement,
    ) -> Result<(), PlatformError>;
}

/// Posts announcements as notices through a [`ChatPlatform`].
pub struct PlatformSink {
    platform: Arc<dyn ChatPlatform>,
}

impl PlatformSink {
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl AnnouncementSink for PlatformSink {
    async fn announce(
        &self,
        channel_id: u64,
        announcement: &FirstBloodAnnouncement,
    ) -> Result<(), PlatformError> {
        let message = OutgoingMessage::notice(announcement.notice(Utc::now()));
        self.platform.send_message(channel_id, &message).await
    }
}

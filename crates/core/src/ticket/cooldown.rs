//! Per-user ticket creation cooldown.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// In-memory cooldown map. Lost on restart.
///
/// Every call takes an explicit `now` so callers control the clock.
#[derive(Debug)]
pub struct CooldownStore {
    window: Duration,
    last_created: RwLock<HashMap<u64, DateTime<Utc>>>,
}

impl CooldownStore {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_created: RwLock::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Remaining cooldown for `user_id`, or `None` if they may open a ticket.
    pub async fn remaining(&self, user_id: u64, now: DateTime<Utc>) -> Option<Duration> {
        let last = *self.last_created.read().await.get(&user_id)?;
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < self.window {
            Some(self.window - elapsed)
        } else {
            None
        }
    }

    /// Record a successful ticket creation, dropping expired entries.
    pub async fn record(&self, user_id: u64, now: DateTime<Utc>) {
        let mut map = self.last_created.write().await;
        Self::retain_active(&mut map, self.window, now);
        map.insert(user_id, now);
    }

    /// Drop entries whose window has elapsed.
    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.last_created.write().await;
        Self::retain_active(&mut map, self.window, now)
    }

    /// Number of users currently tracked.
    pub async fn tracked_users(&self) -> usize {
        self.last_created.read().await.len()
    }

    fn retain_active(
        map: &mut HashMap<u64, DateTime<Utc>>,
        window: Duration,
        now: DateTime<Utc>,
    ) -> usize {
        let before = map.len();
        map.retain(|_, last| (now - *last).to_std().map(|e| e < window).unwrap_or(true));
        before - map.len()
    }
}

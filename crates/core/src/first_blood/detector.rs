//! First Blood detection cycle.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::ctfd::{ChallengeSummary, CtfdError, CtfdUser, ScoringApi};
use crate::metrics;
use crate::platform::PlatformError;

use super::solver::{self, SolverRef};
use super::state::{NotifiedStore, NotifiedStoreError};
use super::timeparse::solve_time;
use super::{AnnouncementSink, FirstBloodAnnouncement};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("No alert channel configured")]
    NoAlertChannel,

    #[error(transparent)]
    Api(#[from] CtfdError),

    #[error("Failed to post announcement: {0}")]
    Delivery(#[from] PlatformError),

    #[error(transparent)]
    State(#[from] NotifiedStoreError),
}

/// Summary of one detection cycle.
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    /// Challenges returned by the server.
    pub challenges: usize,
    pub announced: Vec<FirstBloodAnnouncement>,
    /// Unannounced challenges still without a usable solve.
    pub pending: usize,
    /// Challenges whose check failed this cycle.
    pub failed: usize,
}

/// Detects first solves and announces each challenge at most once.
pub struct FirstBloodDetector {
    api: Arc<dyn ScoringApi>,
    sink: Arc<dyn AnnouncementSink>,
    store: Arc<dyn NotifiedStore>,
    notified: Mutex<BTreeSet<u64>>,
    alert_channel: RwLock<Option<u64>>,
}

impl FirstBloodDetector {
    /// Create a detector, loading the notified set from `store`.
    ///
    /// An unreadable state file is logged and treated as empty.
    pub fn new(
        api: Arc<dyn ScoringApi>,
        sink: Arc<dyn AnnouncementSink>,
        store: Arc<dyn NotifiedStore>,
        alert_channel: Option<u64>,
    ) -> Self {
        let notified = match store.load() {
            Ok(ids) => {
                info!("Loaded {} announced challenges", ids.len());
                ids
            }
            Err(e) => {
                error!("Failed to load First Blood state, starting empty: {}", e);
                BTreeSet::new()
            }
        };

        Self {
            api,
            sink,
            store,
            notified: Mutex::new(notified),
            alert_channel: RwLock::new(alert_channel),
        }
    }

    pub fn scoring_api(&self) -> &Arc<dyn ScoringApi> {
        &self.api
    }

    pub async fn alert_channel(&self) -> Option<u64> {
        *self.alert_channel.read().await
    }

    pub async fn set_alert_channel(&self, channel_id: Option<u64>) {
        *self.alert_channel.write().await = channel_id;
        info!(channel_id = ?channel_id, "First Blood alert channel set");
    }

    pub async fn notified_count(&self) -> usize {
        self.notified.lock().await.len()
    }

    pub async fn is_notified(&self, challenge_id: u64) -> bool {
        self.notified.lock().await.contains(&challenge_id)
    }

    /// Check the API credentials against `users/me`.
    pub async fn test_connection(&self) -> Result<Option<CtfdUser>, CtfdError> {
        let user = self.api.current_user().await?;
        if let Some(user) = &user {
            info!("CTFd connection ok, authenticated as {}", user.display_name());
        }
        Ok(user)
    }

    /// Forget every announced challenge.
    pub async fn reset(&self) -> Result<(), MonitorError> {
        let mut notified = self.notified.lock().await;
        notified.clear();
        self.store.save(&notified)?;
        info!("First Blood notifications reset");
        Ok(())
    }

    /// Run one detection cycle.
    ///
    /// Failing to list challenges aborts the cycle; per-challenge failures are
    /// logged and leave that challenge pending.
    pub async fn check_once(&self) -> Result<PollReport, MonitorError> {
        let channel_id = self.alert_channel().await.ok_or(MonitorError::NoAlertChannel)?;

        let challenges = self.api.challenges().await?;
        debug!("Checking {} challenges", challenges.len());

        let mut report = PollReport {
            challenges: challenges.len(),
            ..Default::default()
        };

        for challenge in &challenges {
            if self.is_notified(challenge.id).await {
                continue;
            }

            match self.check_challenge(challenge, channel_id).await {
                Ok(Some(announcement)) => report.announced.push(announcement),
                Ok(None) => report.pending += 1,
                Err(e) => {
                    warn!(challenge_id = challenge.id, "First Blood check failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn check_challenge(
        &self,
        challenge: &ChallengeSummary,
        channel_id: u64,
    ) -> Result<Option<FirstBloodAnnouncement>, MonitorError> {
        let challenge_id = challenge.id;

        let mut solves = self.api.solves(challenge_id).await?;
        if solves.is_empty() {
            debug!(challenge_id, "No solves listed, trying correct submissions");
            solves = self.api.correct_submissions(challenge_id).await?;
        }

        let Some((index, solved_at)) = earliest_solve(&solves) else {
            return Ok(None);
        };
        if index != 0 {
            warn!(
                challenge_id,
                index, "Solve list is not in time order, using the earliest solve"
            );
        }

        let Some(solver_ref) = SolverRef::classify(&solves[index]) else {
            warn!(challenge_id, "Unrecognized solve record: {}", solves[index]);
            return Ok(None);
        };

        let Some(detail) = self.api.challenge(challenge_id).await? else {
            error!(challenge_id, "Challenge details unavailable");
            return Ok(None);
        };

        let Some(solver) = solver::resolve(self.api.as_ref(), &solver_ref).await? else {
            warn!(challenge_id, ?solver_ref, "Could not identify the solver");
            return Ok(None);
        };

        let solved_at = solved_at.unwrap_or_else(|| {
            warn!(challenge_id, "Solve time missing or unparsable, using current time");
            Utc::now()
        });

        let announcement = FirstBloodAnnouncement {
            challenge_id,
            challenge_name: detail.name.clone(),
            category: detail.category_or_default().to_string(),
            points: detail.points(),
            solver,
            solved_at,
        };

        self.sink.announce(channel_id, &announcement).await?;
        self.mark_notified(challenge_id).await;

        metrics::FIRST_BLOODS_ANNOUNCED.inc();
        info!(
            challenge_id,
            "First Blood announced: {} by {}",
            announcement.challenge_name,
            announcement.solver_display()
        );

        Ok(Some(announcement))
    }

    async fn mark_notified(&self, challenge_id: u64) {
        let mut notified = self.notified.lock().await;
        notified.insert(challenge_id);
        // The in-memory set still prevents repeats until restart
        if let Err(e) = self.store.save(&notified) {
            error!(challenge_id, "Failed to persist First Blood state: {}", e);
        }
    }
}

/// Index and time of the earliest solve.
///
/// The earliest parsable timestamp wins and ties keep list order. When no
/// entry has a parsable time the first entry is used with no time.
pub fn earliest_solve(solves: &[Value]) -> Option<(usize, Option<DateTime<Utc>>)> {
    if solves.is_empty() {
        return None;
    }

    let earliest = solves
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| solve_time(raw).map(|t| (i, t)))
        .min_by_key(|(_, t)| *t);

    Some(match earliest {
        Some((index, time)) => (index, Some(time)),
        None => (0, None),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_earliest_solve_sorted() {
        let solves = vec![
            json!({"name": "a", "date": "2024-05-04T10:00:00Z"}),
            json!({"name": "b", "date": "2024-05-04T11:00:00Z"}),
        ];
        assert_eq!(earliest_solve(&solves).unwrap().0, 0);
    }

    #[test]
    fn test_earliest_solve_unsorted_and_ties() {
        let solves = vec![
            json!({"name": "late", "date": "2024-05-04T11:00:00Z"}),
            json!({"name": "tie1", "date": "2024-05-04T09:00:00Z"}),
            json!({"name": "tie2", "date": "2024-05-04T09:00:00Z"}),
        ];
        assert_eq!(earliest_solve(&solves).unwrap().0, 1);
    }

    #[test]
    fn test_earliest_solve_skips_unparsable() {
        let solves = vec![
            json!({"name": "unknown", "date": "soon"}),
            json!({"name": "known", "date": "2024-05-04T11:00:00Z"}),
        ];
        assert_eq!(earliest_solve(&solves).unwrap().0, 1);

        let none_parse = vec![json!({"name": "x"}), json!({"name": "y"})];
        assert_eq!(earliest_solve(&none_parse), Some((0, None)));
        assert_eq!(earliest_solve(&[]), None);
    }
}

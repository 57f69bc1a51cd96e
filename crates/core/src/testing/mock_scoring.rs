//! Mock CTFd API for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ctfd::{ChallengeDetail, ChallengeSummary, CtfdError, CtfdTeam, CtfdUser, ScoringApi};

/// Mock implementation of the ScoringApi trait.
///
/// Provides controllable behavior for testing:
/// - Configurable challenges, solves, submissions, users and teams
/// - Records every call for assertions
/// - Fails the next call on demand
pub struct MockScoringApi {
    challenges: Arc<RwLock<Vec<ChallengeDetail>>>,
    solves: Arc<RwLock<HashMap<u64, Vec<serde_json::Value>>>>,
    submissions: Arc<RwLock<HashMap<u64, Vec<serde_json::Value>>>>,
    users: Arc<RwLock<HashMap<u64, CtfdUser>>>,
    teams: Arc<RwLock<HashMap<u64, CtfdTeam>>>,
    current_user: Arc<RwLock<Option<CtfdUser>>>,
    calls: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<CtfdError>>>,
}

impl std::fmt::Debug for MockScoringApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockScoringApi")
            .field("challenges", &"<challenges>")
            .field("calls", &"<calls>")
            .finish()
    }
}

impl Default for MockScoringApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScoringApi {
    pub fn new() -> Self {
        Self {
            challenges: Arc::new(RwLock::new(Vec::new())),
            solves: Arc::new(RwLock::new(HashMap::new())),
            submissions: Arc::new(RwLock::new(HashMap::new())),
            users: Arc::new(RwLock::new(HashMap::new())),
            teams: Arc::new(RwLock::new(HashMap::new())),
            current_user: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    // =========================================================================
    // Test Configuration Methods
    // =========================================================================

    pub async fn add_challenge(&self, id: u64, name: &str, category: &str, value: i64) {
        self.challenges.write().await.push(ChallengeDetail {
            id,
            name: name.to_string(),
            category: Some(category.to_string()),
            value: Some(value),
        });
    }

    /// Set the `challenges/{id}/solves` records.
    pub async fn set_solves(&self, challenge_id: u64, solves: Vec<serde_json::Value>) {
        self.solves.write().await.insert(challenge_id, solves);
    }

    /// Set the `submissions?type=correct` records.
    pub async fn set_submissions(&self, challenge_id: u64, submissions: Vec<serde_json::Value>) {
        self.submissions.write().await.insert(challenge_id, submissions);
    }

    pub async fn add_user(&self, id: u64, name: &str, team_id: Option<u64>) {
        self.users.write().await.insert(
            id,
            CtfdUser {
                id: Some(id),
                name: Some(name.to_string()),
                team_id,
            },
        );
    }

    pub async fn add_team(&self, id: u64, name: &str) {
        self.teams.write().await.insert(
            id,
            CtfdTeam {
                id: Some(id),
                name: Some(name.to_string()),
            },
        );
    }

    /// Store a user record as-is, including partial ones.
    pub async fn insert_user(&self, id: u64, user: CtfdUser) {
        self.users.write().await.insert(id, user);
    }

    /// Store a team record as-is, including partial ones.
    pub async fn insert_team(&self, id: u64, team: CtfdTeam) {
        self.teams.write().await.insert(id, team);
    }

    pub async fn set_current_user(&self, user: Option<CtfdUser>) {
        *self.current_user.write().await = user;
    }

    /// Make the next call, whatever it is, fail with `error`.
    pub async fn fail_next(&self, error: CtfdError) {
        *self.next_error.write().await = Some(error);
    }

    // =========================================================================
    // Test Assertion Methods
    // =========================================================================

    /// Calls made so far, e.g. `challenges`, `solves/3`, `user/7`.
    pub async fn recorded_calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    async fn record(&self, call: String) -> Result<(), CtfdError> {
        self.calls.write().await.push(call);
        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ScoringApi for MockScoringApi {
    async fn current_user(&self) -> Result<Option<CtfdUser>, CtfdError> {
        self.record("users/me".to_string()).await?;
        Ok(self.current_user.read().await.clone())
    }

    async fn challenges(&self) -> Result<Vec<ChallengeSummary>, CtfdError> {
        self.record("challenges".to_string()).await?;
        Ok(self
            .challenges
            .read()
            .await
            .iter()
            .map(|c| ChallengeSummary {
                id: c.id,
                name: Some(c.name.clone()),
                category: c.category.clone(),
                value: c.value,
            })
            .collect())
    }

    async fn challenge(&self, challenge_id: u64) -> Result<Option<ChallengeDetail>, CtfdError> {
        self.record(format!("challenge/{}", challenge_id)).await?;
        Ok(self
            .challenges
            .read()
            .await
            .iter()
            .find(|c| c.id == challenge_id)
            .cloned())
    }

    async fn solves(&self, challenge_id: u64) -> Result<Vec<serde_json::Value>, CtfdError> {
        self.record(format!("solves/{}", challenge_id)).await?;
        Ok(self
            .solves
            .read()
            .await
            .get(&challenge_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn correct_submissions(
        &self,
        challenge_id: u64,
    ) -> Result<Vec<serde_json::Value>, CtfdError> {
        self.record(format!("submissions/{}", challenge_id)).await?;
        Ok(self
            .submissions
            .read()
            .await
            .get(&challenge_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn user(&self, user_id: u64) -> Result<Option<CtfdUser>, CtfdError> {
        self.record(format!("user/{}", user_id)).await?;
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn team(&self, team_id: u64) -> Result<Option<CtfdTeam>, CtfdError> {
        self.record(format!("team/{}", team_id)).await?;
        Ok(self.teams.read().await.get(&team_id).cloned())
    }
}

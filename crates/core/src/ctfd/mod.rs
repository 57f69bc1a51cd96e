//! CTFd scoring server integration.
//!
//! [`CtfdClient`] talks to the CTFd REST API; the First Blood detector only
//! depends on the [`ScoringApi`] trait.

mod client;
mod types;

pub use client::CtfdClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that abort a CTFd request.
///
/// Other non-success statuses (403, 404, 5xx) are logged by the client and
/// surface as "no data" instead.
#[derive(Debug, Error)]
pub enum CtfdError {
    /// Server unreachable or request timed out.
    #[error("Cannot reach CTFd: {0}")]
    Connection(String),

    /// The API token was rejected (401).
    #[error("CTFd rejected the API token (401 Unauthorized)")]
    Unauthorized,

    /// Response body did not match the expected shape.
    #[error("Failed to parse CTFd response: {0}")]
    Parse(String),

    /// Client not configured (missing URL, placeholder token, etc.).
    #[error("CTFd client not configured: {0}")]
    NotConfigured(String),
}

/// Read access to a CTFd instance.
#[async_trait]
pub trait ScoringApi: Send + Sync {
    /// The account owning the API token (`users/me`).
    async fn current_user(&self) -> Result<Option<CtfdUser>, CtfdError>;

    /// All visible challenges.
    async fn challenges(&self) -> Result<Vec<ChallengeSummary>, CtfdError>;

    async fn challenge(&self, challenge_id: u64) -> Result<Option<ChallengeDetail>, CtfdError>;

    /// Raw solve records of a challenge, in server order.
    async fn solves(&self, challenge_id: u64) -> Result<Vec<serde_json::Value>, CtfdError>;

    /// Raw correct submissions of a challenge, in server order.
    async fn correct_submissions(
        &self,
        challenge_id: u64,
    ) -> Result<Vec<serde_json::Value>, CtfdError>;

    async fn user(&self, user_id: u64) -> Result<Option<CtfdUser>, CtfdError>;

    async fn team(&self, team_id: u64) -> Result<Option<CtfdTeam>, CtfdError>;
}

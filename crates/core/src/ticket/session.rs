//! Short-lived interaction sessions.
//!
//! Multi-step UI flows (panel button → type select → details modal, and
//! close request → confirmation) carry an opaque token in their component
//! ids. Each token belongs to one user, expires, and is consumed on use.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

/// Where a user is in a multi-step flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStage {
    /// Waiting for the ticket type select menu.
    ChoosingType,
    /// Waiting for the details modal of a chosen type.
    Describing { ticket_type: String },
    /// Waiting for the requester to confirm closing a ticket channel.
    ConfirmingClose { channel_id: u64 },
}

impl SessionStage {
    /// How long the stage waits for the user.
    pub fn ttl(&self) -> Duration {
        match self {
            SessionStage::ChoosingType => Duration::seconds(60),
            SessionStage::ConfirmingClose { .. } => Duration::seconds(60),
            // Modals stay open as long as the interaction token is valid
            SessionStage::Describing { .. } => Duration::minutes(15),
        }
    }
}

#[derive(Debug, Clone)]
struct InteractionSession {
    user_id: u64,
    stage: SessionStage,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("This interaction expired. Please start again.")]
    Expired,

    #[error("This interaction belongs to another user.")]
    WrongUser,
}

/// Registry of pending interaction sessions keyed by token.
#[derive(Debug, Default)]
pub struct InteractionSessions {
    sessions: Mutex<HashMap<String, InteractionSession>>,
}

impl InteractionSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `user_id` and return its token.
    pub async fn begin(&self, user_id: u64, stage: SessionStage, now: DateTime<Utc>) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let expires_at = now + stage.ttl();
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(
            token.clone(),
            InteractionSession {
                user_id,
                stage,
                expires_at,
            },
        );
        token
    }

    /// Consume a session. A different user gets `WrongUser` and the
    /// session stays available to its owner.
    pub async fn take(
        &self,
        token: &str,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<SessionStage, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get(token).ok_or(SessionError::Expired)?;

        if session.expires_at <= now {
            sessions.remove(token);
            return Err(SessionError::Expired);
        }
        if session.user_id != user_id {
            return Err(SessionError::WrongUser);
        }

        sessions
            .remove(token)
            .map(|s| s.stage)
            .ok_or(SessionError::Expired)
    }

    /// Drop a session regardless of owner.
    pub async fn cancel(&self, token: &str) -> bool {
        self.sessions.lock().await.remove(token).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

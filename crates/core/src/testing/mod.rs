//! Testing utilities and mock implementations.
//!
//! This module provides in-memory implementations of the external service
//! traits, so the ticket workflow and the First Blood monitor can be tested
//! without Discord or a CTFd server.
//!
//! # Example
//!
//! ```rust,ignore
//! use ctfdesk_core::testing::{fixtures, MockScoringApi, RecordingSink};
//!
//! let api = MockScoringApi::new();
//! api.add_challenge(1, "babyweb", "web", 100).await;
//! api.set_solves(1, vec![fixtures::named_solve("alice", Some(7), "2024-05-04T10:00:00Z")]).await;
//! api.add_user(7, "alice", None).await;
//!
//! // Build a FirstBloodDetector with a RecordingSink and check the result...
//! ```

mod mock_platform;
mod mock_scoring;
mod recording_sink;

pub use mock_platform::{MockChannel, MockChatPlatform, MockOperation};
pub use mock_scoring::MockScoringApi;
pub use recording_sink::RecordingSink;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};

    use super::MockChatPlatform;
    use crate::config::TicketsConfig;
    use crate::platform::Actor;

    pub const CATEGORY_ID: u64 = 100;
    pub const SUPPORT_ROLE_ID: u64 = 200;
    pub const ADMIN_ROLE_ID: u64 = 201;
    pub const LOG_CHANNEL_ID: u64 = 900;

    /// Ticket config pointing at the ids created by [`guild`], with no delete delay.
    pub fn tickets_config() -> TicketsConfig {
        TicketsConfig {
            category_id: Some(CATEGORY_ID),
            support_role_id: Some(SUPPORT_ROLE_ID),
            admin_role_id: Some(ADMIN_ROLE_ID),
            log_channel_id: Some(LOG_CHANNEL_ID),
            delete_delay_secs: 0,
            ..Default::default()
        }
    }

    /// A mock guild with the ticket category, roles and log channel.
    pub async fn guild() -> MockChatPlatform {
        let platform = MockChatPlatform::new();
        platform.add_channel(CATEGORY_ID, "Tickets", None).await;
        platform.add_channel(LOG_CHANNEL_ID, "ticket-logs", None).await;
        platform.add_role(SUPPORT_ROLE_ID).await;
        platform.add_role(ADMIN_ROLE_ID).await;
        platform
    }

    /// Regular member.
    pub fn member(user_id: u64, name: &str) -> Actor {
        Actor {
            user_id,
            name: name.to_string(),
            is_support: false,
            is_admin: false,
            can_manage_channels: false,
        }
    }

    /// Support role holder.
    pub fn support(user_id: u64, name: &str) -> Actor {
        Actor {
            is_support: true,
            ..member(user_id, name)
        }
    }

    /// Guild administrator.
    pub fn admin(user_id: u64, name: &str) -> Actor {
        Actor {
            is_support: true,
            is_admin: true,
            can_manage_channels: true,
            ..member(user_id, name)
        }
    }

    /// Solve record in the current CTFd `solves` format.
    pub fn named_solve(name: &str, account_id: Option<u64>, date: &str) -> Value {
        match account_id {
            Some(id) => json!({"account_id": id, "name": name, "date": date}),
            None => json!({"name": name, "date": date}),
        }
    }
}

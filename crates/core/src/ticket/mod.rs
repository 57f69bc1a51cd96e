//! Support ticket workflow: records, cooldowns, transcripts and the lifecycle controller.

mod controller;
mod cooldown;
mod session;
mod sqlite_store;
mod store;
mod transcript;
mod types;

pub use controller::{
    claimed_by, ticket_channel_name, ticket_controls, validate_description, ClosedTicket,
    OpenTicketRequest, OpenedTicket, SetupReport, TicketController, TicketFlowError, CLAIM_MARKER,
    MAX_DESCRIPTION_CHARS, MIN_DESCRIPTION_CHARS,
};
pub use cooldown::CooldownStore;
pub use session::{InteractionSessions, SessionError, SessionStage};
pub use sqlite_store::SqliteTicketStore;
pub use store::{CreateTicketRequest, TicketError, TicketFilter, TicketStore};
pub use transcript::{render as render_transcript, render_html, render_text, RenderedTranscript};
pub use types::{StoredTranscript, Ticket, TicketAction, TicketLogEntry, TicketStatus};

/// Custom ids of the message components used by the ticket workflow.
///
/// Ids ending in `:` are followed by an interaction session token.
pub mod component_ids {
    pub const OPEN_TICKET: &str = "ctfdesk:open";
    pub const CLAIM: &str = "ctfdesk:claim";
    pub const CLOSE: &str = "ctfdesk:close";
    pub const TRANSCRIPT: &str = "ctfdesk:transcript";
    pub const TYPE_SELECT: &str = "ctfdesk:type:";
    pub const DETAILS_MODAL: &str = "ctfdesk:details:";
    pub const DETAILS_INPUT: &str = "ctfdesk:details-input";
    pub const CLOSE_CONFIRM: &str = "ctfdesk:close-confirm:";
    pub const CLOSE_CANCEL: &str = "ctfdesk:close-cancel:";

    /// Append a session token to a prefix id.
    pub fn with_token(prefix: &str, token: &str) -> String {
        format!("{}{}", prefix, token)
    }

    /// Session token carried by `custom_id` if it starts with `prefix`.
    pub fn token<'a>(custom_id: &'a str, prefix: &str) -> Option<&'a str> {
        custom_id.strip_prefix(prefix).filter(|t| !t.is_empty())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_token_round_trip() {
            let id = with_token(CLOSE_CONFIRM, "abc123");
            assert_eq!(token(&id, CLOSE_CONFIRM), Some("abc123"));
            assert_eq!(token(&id, CLOSE_CANCEL), None);
            assert_eq!(token(CLOSE_CONFIRM, CLOSE_CONFIRM), None);
        }
    }
}

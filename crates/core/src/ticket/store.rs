//! Ticket storage trait and types.

use std::fmt;

use super::{StoredTranscript, Ticket, TicketAction, TicketLogEntry};

/// Error type for ticket operations.
#[derive(Debug)]
pub enum TicketError {
    /// Ticket not found.
    NotFound(String),
    /// A ticket already exists for this channel.
    AlreadyExists(u64),
    /// Cannot perform operation due to current status.
    InvalidState {
        ticket_id: i64,
        current_status: String,
        operation: String,
    },
    /// Database error.
    Database(String),
}

impl fmt::Display for TicketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketError::NotFound(what) => write!(f, "Ticket not found: {}", what),
            TicketError::AlreadyExists(channel_id) => {
                write!(f, "A ticket already exists for channel {}", channel_id)
            }
            TicketError::InvalidState {
                ticket_id,
                current_status,
                operation,
            } => write!(
                f,
                "Cannot {} ticket {}: current status is {}",
                operation, ticket_id, current_status
            ),
            TicketError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for TicketError {}

/// Request to create a new ticket.
#[derive(Debug, Clone)]
pub struct CreateTicketRequest {
    pub channel_id: u64,
    pub owner_id: u64,
    pub ticket_type: String,
}

/// Filter for querying tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Filter by status ("open" / "closed").
    pub status: Option<String>,
    /// Filter by owner.
    pub owner_id: Option<u64>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            owner_id: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Filter by owner.
    pub fn with_owner(mut self, owner_id: u64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for ticket storage backends.
///
/// Each call is independent; no cross-table transaction is implied.
pub trait TicketStore: Send + Sync {
    /// Create a new open ticket.
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: i64) -> Result<Option<Ticket>, TicketError>;

    /// Get the ticket hosted in a channel.
    fn get_by_channel(&self, channel_id: u64) -> Result<Option<Ticket>, TicketError>;

    /// List tickets matching the filter, newest first.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count tickets matching the filter.
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Mark the ticket in `channel_id` closed. Fails if it is already closed.
    fn close(&self, channel_id: u64, closed_by: u64) -> Result<Ticket, TicketError>;

    /// Append a log entry.
    fn append_log(
        &self,
        ticket_id: i64,
        action: TicketAction,
        actor_id: u64,
        details: Option<serde_json::Value>,
    ) -> Result<TicketLogEntry, TicketError>;

    /// All log entries of a ticket, oldest first.
    fn logs(&self, ticket_id: i64) -> Result<Vec<TicketLogEntry>, TicketError>;

    /// Store the rendered transcript of a ticket.
    fn save_transcript(&self, ticket_id: i64, content: &str)
        -> Result<StoredTranscript, TicketError>;

    /// Latest stored transcript of a ticket.
    fn transcript(&self, ticket_id: i64) -> Result<Option<StoredTranscript>, TicketError>;
}

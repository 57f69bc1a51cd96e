//! Ticket record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A support ticket. One ticket maps to exactly one channel for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Database row id.
    pub id: i64,
    /// Channel hosting the conversation.
    pub channel_id: u64,
    /// User who opened the ticket.
    pub owner_id: u64,
    /// Ticket type name chosen from the configured types.
    pub ticket_type: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<u64>,
    pub status: TicketStatus,
}

impl Ticket {
    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Open
    }
}

/// Ticket status as stored in the database.
///
/// Claiming is not a status; it is recorded on the channel topic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(TicketStatus::Open),
            "closed" => Some(TicketStatus::Closed),
            _ => None,
        }
    }
}

/// Action tag of a ticket log entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketAction {
    Created,
    Claimed,
    Closed,
    ForceClosed,
    MemberAdded,
    MemberRemoved,
}

impl TicketAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketAction::Created => "created",
            TicketAction::Claimed => "claimed",
            TicketAction::Closed => "closed",
            TicketAction::ForceClosed => "force_closed",
            TicketAction::MemberAdded => "member_added",
            TicketAction::MemberRemoved => "member_removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(TicketAction::Created),
            "claimed" => Some(TicketAction::Claimed),
            "closed" => Some(TicketAction::Closed),
            "force_closed" => Some(TicketAction::ForceClosed),
            "member_added" => Some(TicketAction::MemberAdded),
            "member_removed" => Some(TicketAction::MemberRemoved),
            _ => None,
        }
    }
}

/// Immutable, append-only audit entry for a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketLogEntry {
    pub id: i64,
    pub ticket_id: i64,
    pub action: TicketAction,
    pub actor_id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Rendered transcript stored once at close time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredTranscript {
    pub id: i64,
    pub ticket_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

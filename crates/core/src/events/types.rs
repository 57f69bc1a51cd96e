use chrono::{DateTime, Utc};

use crate::platform::{mention_channel, mention_user, FileAttachment, Notice};

const CREATED_COLOR: u32 = 0x2E_CC_71;
const CLAIMED_COLOR: u32 = 0x34_98_DB;
const CLOSED_COLOR: u32 = 0xE7_4C_3C;
const FORCE_CLOSED_COLOR: u32 = 0xE6_7E_22;

/// Ticket lifecycle events relayed to the log channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TicketEvent {
    Created {
        ticket_id: i64,
        channel_id: u64,
        owner_id: u64,
        ticket_type: String,
    },
    Claimed {
        ticket_id: i64,
        channel_id: u64,
        claimed_by: u64,
    },
    Closed {
        ticket_id: i64,
        channel_name: String,
        owner_id: u64,
        closed_by: u64,
        message_count: usize,
        transcript: Option<FileAttachment>,
    },
    ForceClosed {
        ticket_id: i64,
        channel_name: String,
        owner_id: u64,
        closed_by: u64,
        reason: String,
        transcript: Option<FileAttachment>,
    },
}

impl TicketEvent {
    /// Event type string, matching the ticket log action tags.
    pub fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::Created { .. } => "created",
            TicketEvent::Claimed { .. } => "claimed",
            TicketEvent::Closed { .. } => "closed",
            TicketEvent::ForceClosed { .. } => "force_closed",
        }
    }

    pub fn ticket_id(&self) -> i64 {
        match self {
            TicketEvent::Created { ticket_id, .. }
            | TicketEvent::Claimed { ticket_id, .. }
            | TicketEvent::Closed { ticket_id, .. }
            | TicketEvent::ForceClosed { ticket_id, .. } => *ticket_id,
        }
    }

    /// Transcript file to attach to the log message, if any.
    pub fn attachment(&self) -> Option<&FileAttachment> {
        match self {
            TicketEvent::Closed { transcript, .. } | TicketEvent::ForceClosed { transcript, .. } => {
                transcript.as_ref()
            }
            _ => None,
        }
    }

    /// Log-channel card describing the event.
    pub fn notice(&self, timestamp: DateTime<Utc>) -> Notice {
        let notice = match self {
            TicketEvent::Created {
                ticket_id,
                channel_id,
                owner_id,
                ticket_type,
            } => Notice::new("Ticket created", format!("Ticket #{}", ticket_id), CREATED_COLOR)
                .field("Channel", mention_channel(*channel_id), true)
                .field("Owner", mention_user(*owner_id), true)
                .field("Type", ticket_type.clone(), true),
            TicketEvent::Claimed {
                ticket_id,
                channel_id,
                claimed_by,
            } => Notice::new("Ticket claimed", format!("Ticket #{}", ticket_id), CLAIMED_COLOR)
                .field("Channel", mention_channel(*channel_id), true)
                .field("Claimed by", mention_user(*claimed_by), true),
            TicketEvent::Closed {
                ticket_id,
                channel_name,
                owner_id,
                closed_by,
                message_count,
                ..
            } => Notice::new("Ticket closed", format!("Ticket #{}", ticket_id), CLOSED_COLOR)
                .field("Channel", channel_name.clone(), true)
                .field("Owner", mention_user(*owner_id), true)
                .field("Closed by", mention_user(*closed_by), true)
                .field("Messages", message_count.to_string(), true),
            TicketEvent::ForceClosed {
                ticket_id,
                channel_name,
                owner_id,
                closed_by,
                reason,
                ..
            } => Notice::new(
                "Ticket force closed",
                format!("Ticket #{}", ticket_id),
                FORCE_CLOSED_COLOR,
            )
            .field("Channel", channel_name.clone(), true)
            .field("Owner", mention_user(*owner_id), true)
            .field("Closed by", mention_user(*closed_by), true)
            .field("Reason", reason.clone(), false),
        };
        notice.timestamp(timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_notice() {
        let event = TicketEvent::Closed {
            ticket_id: 3,
            channel_name: "ticket-0003-bob".to_string(),
            owner_id: 10,
            closed_by: 20,
            message_count: 12,
            transcript: Some(FileAttachment {
                filename: "ticket-0003-bob_transcript.html".to_string(),
                data: b"<html></html>".to_vec(),
            }),
        };

        let notice = event.notice(Utc::now());
        assert_eq!(notice.title, "Ticket closed");
        assert_eq!(notice.color, CLOSED_COLOR);
        assert!(notice
            .fields
            .iter()
            .any(|f| f.name == "Messages" && f.value == "12"));
        assert_eq!(event.event_type(), "closed");
        assert!(event.attachment().is_some());
    }

    #[test]
    fn test_force_closed_notice_includes_owner_and_reason() {
        let event = TicketEvent::ForceClosed {
            ticket_id: 4,
            channel_name: "ticket-0004-eve".to_string(),
            owner_id: 11,
            closed_by: 1,
            reason: "Admin force close".to_string(),
            transcript: None,
        };

        let notice = event.notice(Utc::now());
        assert_eq!(notice.color, FORCE_CLOSED_COLOR);
        assert!(notice.fields.iter().any(|f| f.value == "<@11>"));
        assert!(notice.fields.iter().any(|f| f.value == "Admin force close"));
        assert!(event.attachment().is_none());
    }
}

//! Ticket lifecycle controller.
//!
//! Drives a ticket from creation to channel deletion:
//! - open: cooldown check, channel provisioning, record creation, welcome message
//! - claim: topic annotation by a support member
//! - close / force close: transcript capture, record closure, channel removal

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::TicketsConfig;
use crate::events::{EventHandle, TicketEvent};
use crate::metrics;
use crate::platform::{
    mention_role, mention_user, AccessGrant, AccessLevel, AccessSubject, Actor, ChannelSpec,
    ChatPlatform, Control, ControlStyle, FileAttachment, Notice, OutgoingMessage, PlatformError,
};

use super::transcript::{self, RenderedTranscript};
use super::{
    component_ids, CooldownStore, CreateTicketRequest, Ticket, TicketAction, TicketError,
    TicketFilter, TicketStore,
};

/// Topic marker written when a support member claims a ticket.
pub const CLAIM_MARKER: &str = "Claimed by:";

pub const MIN_DESCRIPTION_CHARS: usize = 10;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

const FORCE_CLOSE_REASON: &str = "Admin force close";
const CLAIM_COLOR: u32 = 0x2E_CC_71;
const CLOSE_COLOR: u32 = 0xE7_4C_3C;
const MEMBER_COLOR: u32 = 0x34_98_DB;

static NAME_SANITIZER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_-]+").unwrap());

/// Errors surfaced to the user driving the ticket workflow.
#[derive(Debug, Error)]
pub enum TicketFlowError {
    #[error("Ticket system is not configured: {0}")]
    NotConfigured(String),

    #[error("You can open a new ticket in {remaining_secs} seconds.")]
    CooldownActive { remaining_secs: u64 },

    #[error("Unknown ticket type: {0}")]
    UnknownTicketType(String),

    #[error("Description must be between {min} and {max} characters.", min = MIN_DESCRIPTION_CHARS, max = MAX_DESCRIPTION_CHARS)]
    InvalidDescription,

    #[error("This channel is not a ticket.")]
    NotATicketChannel,

    #[error("This ticket is already closed.")]
    AlreadyClosed,

    #[error("This ticket is already claimed by {0}.")]
    AlreadyClaimed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Store(#[from] TicketError),
}

/// User input collected by the creation flow.
#[derive(Debug, Clone)]
pub struct OpenTicketRequest {
    pub ticket_type: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct OpenedTicket {
    pub ticket: Ticket,
    pub channel_name: String,
}

#[derive(Debug, Clone)]
pub struct ClosedTicket {
    pub ticket: Ticket,
    pub transcript: RenderedTranscript,
}

/// Result of checking the configured ids against the guild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub problems: Vec<String>,
}

impl SetupReport {
    pub fn is_ready(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Ticket found in a channel targeted by a close.
enum CloseTarget {
    Open(Ticket),
    /// Already closed, but deleting its channel failed.
    Leftover(Ticket),
}

#[derive(Debug, Clone)]
enum CloseMode {
    Requested,
    Forced { reason: String },
}

/// Drives tickets through open → claimed → closed.
pub struct TicketController {
    config: TicketsConfig,
    store: Arc<dyn TicketStore>,
    platform: Arc<dyn ChatPlatform>,
    cooldown: Arc<CooldownStore>,
    events: EventHandle,
}

impl TicketController {
    pub fn new(
        config: TicketsConfig,
        store: Arc<dyn TicketStore>,
        platform: Arc<dyn ChatPlatform>,
        cooldown: Arc<CooldownStore>,
        events: EventHandle,
    ) -> Self {
        Self {
            config,
            store,
            platform,
            cooldown,
            events,
        }
    }

    pub fn config(&self) -> &TicketsConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Verify that the configured category, roles and log channel exist.
    pub async fn check_setup(&self) -> Result<SetupReport, TicketFlowError> {
        let mut report = SetupReport::default();

        match self.config.category_id {
            None => report.problems.push("ticket category id is not set".to_string()),
            Some(id) if !self.platform.channel_exists(id).await? => report
                .problems
                .push(format!("ticket category {} does not exist", id)),
            Some(_) => {}
        }

        match self.config.support_role_id {
            None => report.problems.push("support role id is not set".to_string()),
            Some(id) if !self.platform.role_exists(id).await? => report
                .problems
                .push(format!("support role {} does not exist", id)),
            Some(_) => {}
        }

        match self.config.log_channel_id {
            None => report.problems.push("log channel id is not set".to_string()),
            Some(id) if !self.platform.channel_exists(id).await? => report
                .problems
                .push(format!("log channel {} does not exist", id)),
            Some(_) => {}
        }

        Ok(report)
    }

    /// Post the ticket panel in `channel_id`. Administrators only.
    pub async fn post_panel(&self, actor: &Actor, channel_id: u64) -> Result<(), TicketFlowError> {
        if !actor.is_admin {
            return Err(TicketFlowError::PermissionDenied(
                "only administrators can post the ticket panel".to_string(),
            ));
        }

        let report = self.check_setup().await?;
        if !report.is_ready() {
            return Err(TicketFlowError::NotConfigured(report.problems.join("; ")));
        }

        let mut notice = Notice::new(
            "🎫 Support Tickets",
            "Use the button below to open a ticket. A member of the support team will respond as soon as possible.",
            self.config.embed_color,
        );
        for ticket_type in &self.config.types {
            notice = notice.field(
                format!("{} {}", ticket_type.emoji, ticket_type.name),
                if ticket_type.description.is_empty() {
                    "\u{200b}".to_string()
                } else {
                    ticket_type.description.clone()
                },
                false,
            );
        }

        let message = OutgoingMessage::notice(notice).with_controls(vec![Control::new(
            component_ids::OPEN_TICKET,
            "Open a ticket",
            ControlStyle::Primary,
        )
        .emoji("📩")]);

        self.platform.send_message(channel_id, &message).await?;
        info!(channel_id, actor = actor.user_id, "Ticket panel posted");
        Ok(())
    }

    /// Remaining cooldown before `user_id` may open another ticket.
    pub async fn cooldown_remaining(&self, user_id: u64, now: DateTime<Utc>) -> Option<Duration> {
        self.cooldown.remaining(user_id, now).await
    }

    /// Fail with `CooldownActive` if the user is still cooling down.
    pub async fn ensure_can_open(&self, user_id: u64, now: DateTime<Utc>) -> Result<(), TicketFlowError> {
        match self.cooldown.remaining(user_id, now).await {
            Some(remaining) => {
                metrics::COOLDOWN_REJECTIONS.inc();
                Err(TicketFlowError::CooldownActive {
                    remaining_secs: remaining.as_secs().max(1),
                })
            }
            None => Ok(()),
        }
    }

    /// Open a ticket for `actor`.
    ///
    /// Nothing is created when the cooldown is active or the input is invalid.
    pub async fn open_ticket(
        &self,
        actor: &Actor,
        request: OpenTicketRequest,
        now: DateTime<Utc>,
    ) -> Result<OpenedTicket, TicketFlowError> {
        self.ensure_can_open(actor.user_id, now).await?;

        let ticket_type = self
            .config
            .ticket_type(&request.ticket_type)
            .cloned()
            .ok_or_else(|| TicketFlowError::UnknownTicketType(request.ticket_type.clone()))?;

        let description = validate_description(&request.description)?;

        let category_id = ticket_type
            .category
            .or(self.config.category_id)
            .ok_or_else(|| TicketFlowError::NotConfigured("ticket category id is not set".to_string()))?;
        let support_role_id = self
            .config
            .support_role_id
            .ok_or_else(|| TicketFlowError::NotConfigured("support role id is not set".to_string()))?;

        if !self.platform.channel_exists(category_id).await? {
            return Err(TicketFlowError::NotConfigured(format!(
                "ticket category {} does not exist",
                category_id
            )));
        }
        if !self.platform.role_exists(support_role_id).await? {
            return Err(TicketFlowError::NotConfigured(format!(
                "support role {} does not exist",
                support_role_id
            )));
        }

        let existing = self
            .platform
            .count_channels_with_prefix(category_id, &self.config.prefix)
            .await?;
        let channel_name = ticket_channel_name(&self.config.prefix, existing + 1, &actor.name);

        let mut grants = vec![
            AccessGrant::new(AccessSubject::Everyone, AccessLevel::Denied),
            AccessGrant::new(AccessSubject::Member(actor.user_id), AccessLevel::Participant),
            AccessGrant::new(AccessSubject::Role(support_role_id), AccessLevel::Staff),
            AccessGrant::new(AccessSubject::Bot, AccessLevel::Manager),
        ];
        if let Some(admin_role_id) = self.config.admin_role_id {
            grants.push(AccessGrant::new(AccessSubject::Role(admin_role_id), AccessLevel::Staff));
        }

        let spec = ChannelSpec {
            name: channel_name.clone(),
            category_id,
            topic: format!("Owner: {} | Type: {}", actor.mention(), ticket_type.name),
            grants,
            reason: format!("Ticket opened by {}", actor.name),
        };

        let channel_id = self.platform.create_channel(&spec).await?;

        let ticket = match self.store.create(CreateTicketRequest {
            channel_id,
            owner_id: actor.user_id,
            ticket_type: ticket_type.name.clone(),
        }) {
            Ok(ticket) => ticket,
            Err(e) => {
                // Keep "channel exists iff ticket is open"
                if let Err(del) = self
                    .platform
                    .delete_channel(channel_id, "Ticket record could not be created")
                    .await
                {
                    warn!(channel_id, "Failed to remove orphan ticket channel: {}", del);
                }
                return Err(e.into());
            }
        };

        self.cooldown.record(actor.user_id, now).await;

        let welcome = Notice::new(
            format!("{} New {} ticket", ticket_type.emoji, ticket_type.name),
            self.config.messages.welcome.replace("{user}", &actor.mention()),
            self.config.embed_color,
        )
        .field("Type", format!("{} {}", ticket_type.emoji, ticket_type.name), true)
        .field("Created", now.format("%Y-%m-%d %H:%M UTC").to_string(), true)
        .field("Description", description.clone(), false)
        .footer("A member of the support team will respond shortly.")
        .timestamp(now);

        let message = OutgoingMessage::notice(welcome)
            .with_content(format!("{} {}", actor.mention(), mention_role(support_role_id)))
            .with_controls(ticket_controls());

        if let Err(e) = self.platform.send_message(channel_id, &message).await {
            warn!(ticket_id = ticket.id, "Failed to send welcome message: {}", e);
        }

        self.append_log(
            ticket.id,
            TicketAction::Created,
            actor.user_id,
            Some(json!({
                "ticket_type": ticket_type.name,
                "description": description,
            })),
        );

        self.events
            .emit(TicketEvent::Created {
                ticket_id: ticket.id,
                channel_id,
                owner_id: actor.user_id,
                ticket_type: ticket_type.name.clone(),
            })
            .await;

        metrics::TICKETS_OPENED.inc();
        info!(
            ticket_id = ticket.id,
            channel_id,
            owner = actor.user_id,
            "Ticket {} opened",
            channel_name
        );

        Ok(OpenedTicket {
            ticket,
            channel_name,
        })
    }

    /// Claim the ticket in `channel_id`. Support members only.
    pub async fn claim(&self, actor: &Actor, channel_id: u64) -> Result<Ticket, TicketFlowError> {
        if !actor.is_support {
            return Err(TicketFlowError::PermissionDenied(
                "only the support team can claim tickets".to_string(),
            ));
        }

        let ticket = self.open_ticket_in(channel_id)?;

        let info = self
            .platform
            .channel_info(channel_id)
            .await?
            .ok_or(TicketFlowError::NotATicketChannel)?;
        let topic = info.topic.unwrap_or_default();

        if let Some(claimed_by) = claimed_by(&topic) {
            return Err(TicketFlowError::AlreadyClaimed(claimed_by));
        }

        let new_topic = if topic.is_empty() {
            format!("{} {}", CLAIM_MARKER, actor.mention())
        } else {
            format!("{} | {} {}", topic, CLAIM_MARKER, actor.mention())
        };
        self.platform.set_topic(channel_id, &new_topic).await?;

        let notice = Notice::new(
            "✅ Ticket claimed",
            format!("{} is handling this ticket.", actor.mention()),
            CLAIM_COLOR,
        )
        .timestamp(Utc::now());
        if let Err(e) = self
            .platform
            .send_message(channel_id, &OutgoingMessage::notice(notice))
            .await
        {
            warn!(ticket_id = ticket.id, "Failed to announce claim: {}", e);
        }

        self.append_log(ticket.id, TicketAction::Claimed, actor.user_id, None);
        self.events
            .emit(TicketEvent::Claimed {
                ticket_id: ticket.id,
                channel_id,
                claimed_by: actor.user_id,
            })
            .await;

        info!(ticket_id = ticket.id, claimed_by = actor.user_id, "Ticket claimed");
        Ok(ticket)
    }

    /// Check that `actor` may close the ticket in `channel_id`.
    ///
    /// Owner, support team and administrators may close. A closed ticket whose
    /// channel is still there can be closed again to remove the channel.
    pub async fn authorize_close(&self, actor: &Actor, channel_id: u64) -> Result<Ticket, TicketFlowError> {
        let ticket = match self.close_target(channel_id).await? {
            CloseTarget::Open(ticket) | CloseTarget::Leftover(ticket) => ticket,
        };
        Self::check_close_permission(&ticket, actor)?;
        Ok(ticket)
    }

    /// Close the ticket after the requester confirmed.
    pub async fn close_ticket(
        &self,
        actor: &Actor,
        channel_id: u64,
        now: DateTime<Utc>,
    ) -> Result<ClosedTicket, TicketFlowError> {
        match self.close_target(channel_id).await? {
            CloseTarget::Open(ticket) => {
                Self::check_close_permission(&ticket, actor)?;
                self.finish(ticket, actor, CloseMode::Requested, now).await
            }
            CloseTarget::Leftover(ticket) => {
                Self::check_close_permission(&ticket, actor)?;
                self.remove_leftover_channel(ticket, actor, now).await
            }
        }
    }

    /// Close a ticket without confirmation. Requires manage-channels or administrator.
    pub async fn force_close(
        &self,
        actor: &Actor,
        channel_id: u64,
        now: DateTime<Utc>,
    ) -> Result<ClosedTicket, TicketFlowError> {
        if !(actor.can_manage_channels || actor.is_admin) {
            return Err(TicketFlowError::PermissionDenied(
                "force close requires the Manage Channels permission".to_string(),
            ));
        }

        match self.close_target(channel_id).await? {
            CloseTarget::Open(ticket) => {
                self.finish(
                    ticket,
                    actor,
                    CloseMode::Forced {
                        reason: FORCE_CLOSE_REASON.to_string(),
                    },
                    now,
                )
                .await
            }
            CloseTarget::Leftover(ticket) => self.remove_leftover_channel(ticket, actor, now).await,
        }
    }

    /// Render the current history of a ticket channel without closing it.
    pub async fn export_transcript(
        &self,
        channel_id: u64,
        now: DateTime<Utc>,
    ) -> Result<RenderedTranscript, TicketFlowError> {
        let ticket = self.open_ticket_in(channel_id)?;
        let channel_name = self.channel_name(&ticket).await;
        let history = self.platform.fetch_history(channel_id).await?;
        Ok(transcript::render(&channel_name, &history, now))
    }

    /// Give `member_id` access to the ticket in `channel_id`.
    pub async fn add_member(
        &self,
        actor: &Actor,
        channel_id: u64,
        member_id: u64,
    ) -> Result<Ticket, TicketFlowError> {
        self.change_member(actor, channel_id, member_id, true).await
    }

    /// Revoke `member_id`'s access to the ticket in `channel_id`.
    pub async fn remove_member(
        &self,
        actor: &Actor,
        channel_id: u64,
        member_id: u64,
    ) -> Result<Ticket, TicketFlowError> {
        self.change_member(actor, channel_id, member_id, false).await
    }

    /// Open tickets, newest first.
    pub fn active_tickets(&self) -> Result<Vec<Ticket>, TicketFlowError> {
        Ok(self
            .store
            .list(&TicketFilter::new().with_status("open"))?)
    }

    async fn change_member(
        &self,
        actor: &Actor,
        channel_id: u64,
        member_id: u64,
        add: bool,
    ) -> Result<Ticket, TicketFlowError> {
        if !(actor.is_support || actor.is_admin) {
            return Err(TicketFlowError::PermissionDenied(
                "only the support team can change ticket members".to_string(),
            ));
        }

        let ticket = self.open_ticket_in(channel_id)?;
        if !add && member_id == ticket.owner_id {
            return Err(TicketFlowError::PermissionDenied(
                "the ticket owner cannot be removed".to_string(),
            ));
        }

        let (level, action, text) = if add {
            (
                AccessLevel::Participant,
                TicketAction::MemberAdded,
                format!("{} was added to this ticket.", mention_user(member_id)),
            )
        } else {
            (
                AccessLevel::Denied,
                TicketAction::MemberRemoved,
                format!("{} was removed from this ticket.", mention_user(member_id)),
            )
        };

        self.platform
            .grant_access(channel_id, &AccessGrant::new(AccessSubject::Member(member_id), level))
            .await?;

        let notice = Notice::new("Ticket members", text, MEMBER_COLOR);
        if let Err(e) = self
            .platform
            .send_message(channel_id, &OutgoingMessage::notice(notice))
            .await
        {
            warn!(ticket_id = ticket.id, "Failed to announce member change: {}", e);
        }

        self.append_log(
            ticket.id,
            action,
            actor.user_id,
            Some(json!({ "member_id": member_id.to_string() })),
        );

        Ok(ticket)
    }

    async fn finish(
        &self,
        ticket: Ticket,
        actor: &Actor,
        mode: CloseMode,
        now: DateTime<Utc>,
    ) -> Result<ClosedTicket, TicketFlowError> {
        let channel_id = ticket.channel_id;
        let channel_name = self.channel_name(&ticket).await;

        // Capture before any state change so a failed fetch leaves the ticket open
        let history = self.platform.fetch_history(channel_id).await?;
        let rendered = transcript::render(&channel_name, &history, now);

        let closed = self.store.close(channel_id, actor.user_id).map_err(|e| match e {
            TicketError::InvalidState { .. } => TicketFlowError::AlreadyClosed,
            other => TicketFlowError::Store(other),
        })?;

        let (action, details) = match &mode {
            CloseMode::Requested => (TicketAction::Closed, None),
            CloseMode::Forced { reason } => {
                (TicketAction::ForceClosed, Some(json!({ "reason": reason })))
            }
        };
        self.append_log(closed.id, action, actor.user_id, details);

        if let Err(e) = self.store.save_transcript(closed.id, &rendered.text) {
            warn!(ticket_id = closed.id, "Failed to store transcript: {}", e);
        }

        if matches!(mode, CloseMode::Requested) && self.config.transcript_dm {
            let dm = OutgoingMessage::notice(Notice::new(
                "Your ticket was closed",
                format!(
                    "Ticket channel: {}\nThe conversation transcript is attached.",
                    channel_name
                ),
                self.config.embed_color,
            ))
            .with_attachment(rendered.html_filename(), rendered.html.clone().into_bytes())
            .with_attachment(rendered.text_filename(), rendered.text.clone().into_bytes());

            if let Err(e) = self.platform.send_direct(closed.owner_id, &dm).await {
                // Users may have DMs disabled
                debug!(owner = closed.owner_id, "Could not DM transcript: {}", e);
            }
        }

        let html = Some(FileAttachment {
            filename: rendered.html_filename(),
            data: rendered.html.clone().into_bytes(),
        });
        let event = match &mode {
            CloseMode::Requested => TicketEvent::Closed {
                ticket_id: closed.id,
                channel_name: channel_name.clone(),
                owner_id: closed.owner_id,
                closed_by: actor.user_id,
                message_count: rendered.message_count,
                transcript: html,
            },
            CloseMode::Forced { reason } => TicketEvent::ForceClosed {
                ticket_id: closed.id,
                channel_name: channel_name.clone(),
                owner_id: closed.owner_id,
                closed_by: actor.user_id,
                reason: reason.clone(),
                transcript: html,
            },
        };
        self.events.emit(event).await;

        let delay = match mode {
            CloseMode::Requested if self.config.auto_delete_after_close => {
                Duration::from_secs(self.config.delete_delay_secs)
            }
            _ => Duration::ZERO,
        };

        let mut closing_text = self.config.messages.closed.clone();
        if !delay.is_zero() {
            closing_text.push_str(&format!(
                "\nThis channel will be deleted in {} seconds.",
                delay.as_secs()
            ));
        }
        let closing = OutgoingMessage::notice(
            Notice::new("🔒 Ticket closed", closing_text, CLOSE_COLOR).timestamp(now),
        );
        if let Err(e) = self.platform.send_message(channel_id, &closing).await {
            warn!(ticket_id = closed.id, "Failed to post closing message: {}", e);
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mode_label = match mode {
            CloseMode::Requested => "requested",
            CloseMode::Forced { .. } => "forced",
        };
        metrics::TICKETS_CLOSED.with_label_values(&[mode_label]).inc();

        let reason = match mode_label {
            "forced" => format!("Ticket force closed by {}", actor.name),
            _ => format!("Ticket closed by {}", actor.name),
        };
        // On failure the ticket stays closed; closing again removes the channel
        self.platform.delete_channel(channel_id, &reason).await?;

        info!(
            ticket_id = closed.id,
            closed_by = actor.user_id,
            mode = mode_label,
            messages = rendered.message_count,
            "Ticket {} closed",
            channel_name
        );

        Ok(ClosedTicket {
            ticket: closed,
            transcript: rendered,
        })
    }

    /// Delete the surviving channel of a closed ticket.
    ///
    /// The record, logs and stored transcript are left as the first close wrote them.
    async fn remove_leftover_channel(
        &self,
        ticket: Ticket,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ClosedTicket, TicketFlowError> {
        let channel_name = self.channel_name(&ticket).await;
        let history = match self.platform.fetch_history(ticket.channel_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(ticket_id = ticket.id, "Failed to read leftover channel history: {}", e);
                Vec::new()
            }
        };
        let rendered = transcript::render(&channel_name, &history, now);

        self.platform
            .delete_channel(
                ticket.channel_id,
                &format!("Removing channel of closed ticket for {}", actor.name),
            )
            .await?;

        info!(
            ticket_id = ticket.id,
            removed_by = actor.user_id,
            "Removed leftover channel {}",
            channel_name
        );
        Ok(ClosedTicket {
            ticket,
            transcript: rendered,
        })
    }

    async fn close_target(&self, channel_id: u64) -> Result<CloseTarget, TicketFlowError> {
        let ticket = self
            .store
            .get_by_channel(channel_id)?
            .ok_or(TicketFlowError::NotATicketChannel)?;
        if ticket.is_open() {
            return Ok(CloseTarget::Open(ticket));
        }
        match self.platform.channel_info(channel_id).await? {
            Some(_) => Ok(CloseTarget::Leftover(ticket)),
            None => Err(TicketFlowError::AlreadyClosed),
        }
    }

    fn check_close_permission(ticket: &Ticket, actor: &Actor) -> Result<(), TicketFlowError> {
        if ticket.owner_id == actor.user_id || actor.is_support || actor.is_admin {
            Ok(())
        } else {
            Err(TicketFlowError::PermissionDenied(
                "only the ticket owner or the support team can close this ticket".to_string(),
            ))
        }
    }

    fn open_ticket_in(&self, channel_id: u64) -> Result<Ticket, TicketFlowError> {
        let ticket = self
            .store
            .get_by_channel(channel_id)?
            .ok_or(TicketFlowError::NotATicketChannel)?;
        if !ticket.is_open() {
            return Err(TicketFlowError::AlreadyClosed);
        }
        Ok(ticket)
    }

    async fn channel_name(&self, ticket: &Ticket) -> String {
        match self.platform.channel_info(ticket.channel_id).await {
            Ok(Some(info)) => info.name,
            Ok(None) => format!("{}{}", self.config.prefix, ticket.id),
            Err(e) => {
                warn!(ticket_id = ticket.id, "Failed to read channel name: {}", e);
                format!("{}{}", self.config.prefix, ticket.id)
            }
        }
    }

    fn append_log(
        &self,
        ticket_id: i64,
        action: TicketAction,
        actor_id: u64,
        details: Option<serde_json::Value>,
    ) {
        if let Err(e) = self.store.append_log(ticket_id, action, actor_id, details) {
            warn!(ticket_id, action = action.as_str(), "Failed to append ticket log: {}", e);
        }
    }
}

/// Buttons attached to the welcome message of every ticket.
pub fn ticket_controls() -> Vec<Control> {
    vec![
        Control::new(component_ids::CLAIM, "Claim", ControlStyle::Primary).emoji("📌"),
        Control::new(component_ids::CLOSE, "Close", ControlStyle::Danger).emoji("🔒"),
        Control::new(component_ids::TRANSCRIPT, "Save transcript", ControlStyle::Secondary)
            .emoji("💾"),
    ]
}

/// Trimmed description if its length is acceptable.
pub fn validate_description(raw: &str) -> Result<String, TicketFlowError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if (MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS).contains(&len) {
        Ok(trimmed.to_string())
    } else {
        Err(TicketFlowError::InvalidDescription)
    }
}

/// `{prefix}{number:04}-{username}` with the username reduced to channel-safe characters.
pub fn ticket_channel_name(prefix: &str, number: usize, username: &str) -> String {
    let lowered = username.to_lowercase();
    let cleaned = NAME_SANITIZER.replace_all(&lowered, "-");
    let mut slug: String = cleaned.trim_matches('-').chars().take(20).collect();
    slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        slug = "user".to_string();
    }
    format!("{}{:04}-{}", prefix, number, slug)
}

/// The claimer recorded in a channel topic, if any.
pub fn claimed_by(topic: &str) -> Option<String> {
    let (_, rest) = topic.split_once(CLAIM_MARKER)?;
    let claimer = rest.split('|').next().unwrap_or_default().trim();
    Some(claimer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_format() {
        assert_eq!(ticket_channel_name("ticket-", 1, "Alice"), "ticket-0001-alice");
        assert_eq!(ticket_channel_name("ticket-", 42, "Bob Smith!"), "ticket-0042-bob-smith");
        assert_eq!(ticket_channel_name("help-", 12345, "x"), "help-12345-x");
    }

    #[test]
    fn test_channel_name_fallback() {
        assert_eq!(ticket_channel_name("ticket-", 3, "ツ"), "ticket-0003-user");
        assert_eq!(
            ticket_channel_name("ticket-", 3, "a_very_long_username_that_keeps_going"),
            "ticket-0003-a_very_long_username"
        );
    }

    #[test]
    fn test_validate_description() {
        assert!(matches!(
            validate_description("too short"),
            Err(TicketFlowError::InvalidDescription)
        ));
        assert_eq!(
            validate_description("  My flag is rejected  ").unwrap(),
            "My flag is rejected"
        );
        assert!(validate_description(&"x".repeat(1001)).is_err());
        assert!(validate_description(&"x".repeat(1000)).is_ok());
    }

    #[test]
    fn test_claimed_by() {
        assert_eq!(claimed_by("Owner: <@1> | Type: General"), None);
        assert_eq!(
            claimed_by("Owner: <@1> | Type: General | Claimed by: <@2>"),
            Some("<@2>".to_string())
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TicketFlowError::AlreadyClaimed("<@2>".to_string()).to_string(),
            "This ticket is already claimed by <@2>."
        );
        assert_eq!(
            TicketFlowError::InvalidDescription.to_string(),
            "Description must be between 10 and 1000 characters."
        );
    }
}

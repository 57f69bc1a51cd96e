//! Chat platform capability surface.
//!
//! The ticket workflow only talks to the chat service through [`ChatPlatform`].
//! The Discord gateway implements it in the bot crate; tests use
//! [`crate::testing::MockChatPlatform`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by chat platform calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing permission: {0}")]
    Forbidden(String),

    #[error("Platform request failed: {0}")]
    Request(String),
}

/// Who a permission overwrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessSubject {
    /// The guild-wide @everyone role.
    Everyone,
    Member(u64),
    Role(u64),
    /// The bot's own user.
    Bot,
}

/// Permission level granted on a ticket channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// Cannot view, send, read history, attach, or embed.
    Denied,
    /// View, send, read history, attach, embed, react.
    Participant,
    /// Participant plus manage messages.
    Staff,
    /// Staff plus manage channels.
    Manager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessGrant {
    pub subject: AccessSubject,
    pub level: AccessLevel,
}

impl AccessGrant {
    pub fn new(subject: AccessSubject, level: AccessLevel) -> Self {
        Self { subject, level }
    }
}

/// Everything needed to provision a ticket channel.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub name: String,
    pub category_id: u64,
    pub topic: String,
    pub grants: Vec<AccessGrant>,
    /// Audit log reason.
    pub reason: String,
}

/// Basic channel information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u64,
    pub name: String,
    pub topic: Option<String>,
    pub category_id: Option<u64>,
}

/// Rich message card (rendered as an embed on Discord).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<NoticeField>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color,
            ..Default::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(NoticeField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

/// A button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    /// Component custom id.
    pub id: String,
    pub label: String,
    pub style: ControlStyle,
    pub emoji: Option<String>,
}

impl Control {
    pub fn new(id: impl Into<String>, label: impl Into<String>, style: ControlStyle) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            style,
            emoji: None,
        }
    }

    pub fn emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub filename: String,
    pub data: Vec<u8>,
}

/// A message to post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub notice: Option<Notice>,
    pub controls: Vec<Control>,
    pub attachments: Vec<FileAttachment>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn notice(notice: Notice) -> Self {
        Self {
            notice: Some(notice),
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_controls(mut self, controls: Vec<Control>) -> Self {
        self.controls = controls;
        self
    }

    pub fn with_attachment(mut self, filename: impl Into<String>, data: Vec<u8>) -> Self {
        self.attachments.push(FileAttachment {
            filename: filename.into(),
            data,
        });
        self
    }
}

/// A message read back from channel history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryMessage {
    pub id: u64,
    pub author_id: u64,
    /// Account name (unique handle).
    pub author_name: String,
    /// Nickname or global display name.
    pub author_display: String,
    pub author_bot: bool,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub attachments: Vec<HistoryAttachment>,
    pub embeds: Vec<HistoryEmbed>,
    /// Join notices, pins and other non-user messages.
    pub system: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryAttachment {
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEmbed {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// The user invoking an operation, with the permissions that matter here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: u64,
    pub name: String,
    pub is_support: bool,
    pub is_admin: bool,
    pub can_manage_channels: bool,
}

impl Actor {
    pub fn mention(&self) -> String {
        mention_user(self.user_id)
    }
}

pub fn mention_user(user_id: u64) -> String {
    format!("<@{}>", user_id)
}

pub fn mention_role(role_id: u64) -> String {
    format!("<@&{}>", role_id)
}

pub fn mention_channel(channel_id: u64) -> String {
    format!("<#{}>", channel_id)
}

/// Channel, role, permission and message primitives used by the ticket workflow.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Whether a channel (or category) exists in the guild.
    async fn channel_exists(&self, channel_id: u64) -> Result<bool, PlatformError>;

    /// Whether a role exists in the guild.
    async fn role_exists(&self, role_id: u64) -> Result<bool, PlatformError>;

    /// Count channels under `category_id` whose name starts with `prefix`.
    async fn count_channels_with_prefix(
        &self,
        category_id: u64,
        prefix: &str,
    ) -> Result<usize, PlatformError>;

    /// Create a text channel with the given overwrites. Returns the new channel id.
    async fn create_channel(&self, spec: &ChannelSpec) -> Result<u64, PlatformError>;

    async fn channel_info(&self, channel_id: u64) -> Result<Option<ChannelInfo>, PlatformError>;

    async fn set_topic(&self, channel_id: u64, topic: &str) -> Result<(), PlatformError>;

    async fn send_message(
        &self,
        channel_id: u64,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError>;

    /// Send a direct message to a user.
    async fn send_direct(&self, user_id: u64, message: &OutgoingMessage)
        -> Result<(), PlatformError>;

    /// Full channel history, oldest first.
    async fn fetch_history(&self, channel_id: u64) -> Result<Vec<HistoryMessage>, PlatformError>;

    async fn delete_channel(&self, channel_id: u64, reason: &str) -> Result<(), PlatformError>;

    /// Add or replace a permission overwrite on a channel.
    async fn grant_access(&self, channel_id: u64, grant: &AccessGrant)
        -> Result<(), PlatformError>;
}

//! [`ChatPlatform`] backed by the Discord REST API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serenity::builder::{CreateChannel, EditChannel};
use serenity::http::Http;
use serenity::model::channel::{
    Channel, ChannelType, Message, MessageType, PermissionOverwrite, PermissionOverwriteType,
};
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};
use serenity::model::Permissions;
use tracing::{debug, info};

use ctfdesk_core::platform::{
    AccessGrant, AccessLevel, AccessSubject, ChannelInfo, ChannelSpec, ChatPlatform,
    HistoryAttachment, HistoryEmbed, HistoryMessage, OutgoingMessage, PlatformError,
};

use super::render;

/// Discord implementation of the ticket platform for one guild.
pub struct SerenityPlatform {
    http: Arc<Http>,
    guild_id: GuildId,
    bot_user_id: UserId,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, guild_id: u64, bot_user_id: u64) -> Self {
        Self {
            http,
            guild_id: GuildId::new(guild_id),
            bot_user_id: UserId::new(bot_user_id),
        }
    }

    fn overwrite(&self, grant: &AccessGrant) -> PermissionOverwrite {
        let kind = match grant.subject {
            // The @everyone role shares the guild id
            AccessSubject::Everyone => PermissionOverwriteType::Role(RoleId::new(self.guild_id.get())),
            AccessSubject::Member(id) => PermissionOverwriteType::Member(UserId::new(id)),
            AccessSubject::Role(id) => PermissionOverwriteType::Role(RoleId::new(id)),
            AccessSubject::Bot => PermissionOverwriteType::Member(self.bot_user_id),
        };
        let (allow, deny) = permissions_for(grant.level);
        PermissionOverwrite { allow, deny, kind }
    }
}

/// Allowed and denied permission bits for an access level.
pub fn permissions_for(level: AccessLevel) -> (Permissions, Permissions) {
    let basic = Permissions::VIEW_CHANNEL
        | Permissions::SEND_MESSAGES
        | Permissions::READ_MESSAGE_HISTORY
        | Permissions::ATTACH_FILES
        | Permissions::EMBED_LINKS;
    let participant = basic | Permissions::ADD_REACTIONS;

    match level {
        AccessLevel::Denied => (Permissions::empty(), basic),
        AccessLevel::Participant => (participant, Permissions::empty()),
        AccessLevel::Staff => (participant | Permissions::MANAGE_MESSAGES, Permissions::empty()),
        AccessLevel::Manager => (
            participant | Permissions::MANAGE_MESSAGES | Permissions::MANAGE_CHANNELS,
            Permissions::empty(),
        ),
    }
}

/// Map a serenity error onto the platform error taxonomy.
pub fn platform_error(e: serenity::Error) -> PlatformError {
    if let serenity::Error::Http(http_error) = &e {
        match http_error.status_code().map(|status| status.as_u16()) {
            Some(403) => return PlatformError::Forbidden(e.to_string()),
            Some(404) => return PlatformError::NotFound(e.to_string()),
            _ => {}
        }
    }
    PlatformError::Request(e.to_string())
}

fn history_message(message: &Message) -> HistoryMessage {
    let author_display = message
        .member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .or_else(|| message.author.global_name.clone())
        .unwrap_or_else(|| message.author.name.clone());

    HistoryMessage {
        id: message.id.get(),
        author_id: message.author.id.get(),
        author_name: message.author.name.clone(),
        author_display,
        author_bot: message.author.bot,
        content: message.content.clone(),
        timestamp: DateTime::<Utc>::from_timestamp(message.timestamp.unix_timestamp(), 0)
            .unwrap_or_else(Utc::now),
        attachments: message
            .attachments
            .iter()
            .map(|a| HistoryAttachment {
                filename: a.filename.clone(),
                size: u64::from(a.size),
            })
            .collect(),
        embeds: message
            .embeds
            .iter()
            .map(|e| HistoryEmbed {
                title: e.title.clone(),
                description: e.description.clone(),
            })
            .collect(),
        system: !matches!(
            message.kind,
            MessageType::Regular | MessageType::InlineReply | MessageType::ChatInputCommand
        ),
    }
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    async fn channel_exists(&self, channel_id: u64) -> Result<bool, PlatformError> {
        let channels = self
            .guild_id
            .channels(&self.http)
            .await
            .map_err(platform_error)?;
        Ok(channels.contains_key(&ChannelId::new(channel_id)))
    }

    async fn role_exists(&self, role_id: u64) -> Result<bool, PlatformError> {
        let roles = self
            .guild_id
            .roles(&self.http)
            .await
            .map_err(platform_error)?;
        Ok(roles.contains_key(&RoleId::new(role_id)))
    }

    async fn count_channels_with_prefix(
        &self,
        category_id: u64,
        prefix: &str,
    ) -> Result<usize, PlatformError> {
        let category = ChannelId::new(category_id);
        let channels = self
            .guild_id
            .channels(&self.http)
            .await
            .map_err(platform_error)?;
        Ok(channels
            .values()
            .filter(|c| c.parent_id == Some(category) && c.name.starts_with(prefix))
            .count())
    }

    async fn create_channel(&self, spec: &ChannelSpec) -> Result<u64, PlatformError> {
        let overwrites: Vec<PermissionOverwrite> =
            spec.grants.iter().map(|g| self.overwrite(g)).collect();

        let builder = CreateChannel::new(&spec.name)
            .kind(ChannelType::Text)
            .category(ChannelId::new(spec.category_id))
            .topic(&spec.topic)
            .permissions(overwrites)
            .audit_log_reason(&spec.reason);

        let channel = self
            .guild_id
            .create_channel(&self.http, builder)
            .await
            .map_err(platform_error)?;

        debug!(channel_id = channel.id.get(), name = %channel.name, "Channel created");
        Ok(channel.id.get())
    }

    async fn channel_info(&self, channel_id: u64) -> Result<Option<ChannelInfo>, PlatformError> {
        match ChannelId::new(channel_id).to_channel(&self.http).await {
            Ok(Channel::Guild(channel)) if channel.guild_id == self.guild_id => {
                Ok(Some(ChannelInfo {
                    id: channel.id.get(),
                    name: channel.name,
                    topic: channel.topic,
                    category_id: channel.parent_id.map(|p| p.get()),
                }))
            }
            Ok(_) => Ok(None),
            Err(e) => match platform_error(e) {
                PlatformError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn set_topic(&self, channel_id: u64, topic: &str) -> Result<(), PlatformError> {
        ChannelId::new(channel_id)
            .edit(&self.http, EditChannel::new().topic(topic))
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: u64,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError> {
        ChannelId::new(channel_id)
            .send_message(&self.http, render::create_message(message))
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn send_direct(
        &self,
        user_id: u64,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError> {
        let dm = UserId::new(user_id)
            .create_dm_channel(&self.http)
            .await
            .map_err(platform_error)?;
        dm.id
            .send_message(&self.http, render::create_message(message))
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn fetch_history(&self, channel_id: u64) -> Result<Vec<HistoryMessage>, PlatformError> {
        let mut stream = ChannelId::new(channel_id).messages_iter(&self.http).boxed();
        let mut history = Vec::new();

        while let Some(item) = stream.next().await {
            let message = item.map_err(platform_error)?;
            history.push(history_message(&message));
        }

        // Discord pages newest first
        history.reverse();
        Ok(history)
    }

    async fn delete_channel(&self, channel_id: u64, reason: &str) -> Result<(), PlatformError> {
        ChannelId::new(channel_id)
            .delete(&self.http)
            .await
            .map_err(platform_error)?;
        info!(channel_id, reason, "Channel deleted");
        Ok(())
    }

    async fn grant_access(
        &self,
        channel_id: u64,
        grant: &AccessGrant,
    ) -> Result<(), PlatformError> {
        ChannelId::new(channel_id)
            .create_permission(&self.http, self.overwrite(grant))
            .await
            .map_err(platform_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_level_denies_basic_access() {
        let (allow, deny) = permissions_for(AccessLevel::Denied);
        assert!(allow.is_empty());
        assert!(deny.contains(Permissions::VIEW_CHANNEL));
        assert!(deny.contains(Permissions::SEND_MESSAGES));
        assert!(!deny.contains(Permissions::ADD_REACTIONS));
    }

    #[test]
    fn test_levels_are_cumulative() {
        let (participant, _) = permissions_for(AccessLevel::Participant);
        let (staff, _) = permissions_for(AccessLevel::Staff);
        let (manager, _) = permissions_for(AccessLevel::Manager);

        assert!(participant.contains(Permissions::ADD_REACTIONS));
        assert!(!participant.contains(Permissions::MANAGE_MESSAGES));
        assert!(staff.contains(participant | Permissions::MANAGE_MESSAGES));
        assert!(!staff.contains(Permissions::MANAGE_CHANNELS));
        assert!(manager.contains(staff | Permissions::MANAGE_CHANNELS));
    }

    #[test]
    fn test_overwrite_targets() {
        let platform = SerenityPlatform::new(Arc::new(Http::new("token")), 555, 1);

        let everyone = platform.overwrite(&AccessGrant::new(AccessSubject::Everyone, AccessLevel::Denied));
        assert_eq!(everyone.kind, PermissionOverwriteType::Role(RoleId::new(555)));

        let bot = platform.overwrite(&AccessGrant::new(AccessSubject::Bot, AccessLevel::Manager));
        assert_eq!(bot.kind, PermissionOverwriteType::Member(UserId::new(1)));
    }
}

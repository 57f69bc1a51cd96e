mod bot;
mod commands;
mod components;
pub mod platform;
pub mod render;

use std::borrow::Borrow;
use std::sync::Arc;

use serenity::model::guild::Member;
use serenity::model::user::User;
use serenity::model::Permissions;
use serenity::prelude::*;
use tracing::info;

use ctfdesk_core::ticket::SessionError;
use ctfdesk_core::{Actor, CtfdError, MonitorError, TicketFlowError, TicketsConfig};

use crate::state::AppState;

pub use bot::Bot;
pub use commands::definitions as command_definitions;
pub use platform::SerenityPlatform;

/// Create the Discord client for the configured guild.
pub async fn start_discord_bot(
    token: &str,
    state: Arc<AppState>,
) -> Result<Client, DiscordError> {
    if token.trim().is_empty() {
        return Err(DiscordError::MissingToken);
    }

    info!("Starting Discord bot...");

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;

    let bot = Bot::new(state);

    Client::builder(token, intents)
        .event_handler(bot)
        .await
        .map_err(|e| DiscordError::ClientError(e.to_string()))
}

/// Discord-related errors
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("Discord bot token is not set")]
    MissingToken,

    #[error("Failed to create Discord client: {0}")]
    ClientError(String),
}

/// Failure of a slash command or component action, shown to the invoking user.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Ticket(#[from] TicketFlowError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Ctfd(#[from] CtfdError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0}")]
    Rejected(String),
}

/// Build an [`Actor`] from the interaction user and guild member.
///
/// Interaction kinds store the member either inline or boxed.
pub fn actor_from<M: Borrow<Member>>(
    user: &User,
    member: Option<&M>,
    config: &TicketsConfig,
) -> Actor {
    let member = member.map(|m| m.borrow());
    let roles: Vec<u64> = member
        .map(|m| m.roles.iter().map(|r| r.get()).collect())
        .unwrap_or_default();
    let permissions = member
        .and_then(|m| m.permissions)
        .unwrap_or_else(Permissions::empty);
    actor_from_parts(user.id.get(), &user.name, &roles, permissions, config)
}

/// Role and permission checks behind [`actor_from`].
pub fn actor_from_parts(
    user_id: u64,
    name: &str,
    roles: &[u64],
    permissions: Permissions,
    config: &TicketsConfig,
) -> Actor {
    let has_role = |role: Option<u64>| role.is_some_and(|id| roles.contains(&id));
    let administrator = permissions.contains(Permissions::ADMINISTRATOR);

    Actor {
        user_id,
        name: name.to_string(),
        is_support: has_role(config.support_role_id),
        is_admin: administrator || has_role(config.admin_role_id),
        can_manage_channels: administrator || permissions.contains(Permissions::MANAGE_CHANNELS),
    }
}

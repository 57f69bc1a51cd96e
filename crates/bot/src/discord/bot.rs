use std::sync::Arc;

use serenity::async_trait;
use serenity::builder::{
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
};
use serenity::model::application::Interaction;
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};

use ctfdesk_core::platform::Notice;

use crate::metrics::INTERACTION_ERRORS;
use crate::state::AppState;

use super::{commands, components, render, CommandError};

/// Gateway event handler.
pub struct Bot {
    state: Arc<AppState>,
}

impl Bot {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    async fn handle_interaction(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => commands::handle(&self.state, &ctx, &command).await,
            Interaction::Component(component) => {
                components::handle_component(&self.state, &ctx, &component).await
            }
            Interaction::Modal(modal) => components::handle_modal(&self.state, &ctx, &modal).await,
            _ => {}
        }
    }
}

#[async_trait]
impl EventHandler for Bot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        let guild_id = GuildId::new(self.state.guild_id());
        match guild_id
            .set_commands(&ctx.http, commands::definitions())
            .await
        {
            Ok(registered) => info!(
                "Registered {} slash commands on guild {}",
                registered.len(),
                guild_id
            ),
            Err(e) => error!("Failed to register slash commands: {}", e),
        }

        match self.state.controller().check_setup().await {
            Ok(report) if report.is_ready() => info!("Ticket system ready"),
            Ok(report) => warn!(
                "Ticket system is not fully configured: {}",
                report.problems.join("; ")
            ),
            Err(e) => warn!("Could not verify ticket configuration: {}", e),
        }

        // ready fires again after reconnects
        if let Some(scheduler) = self.state.scheduler() {
            let autostart = self
                .state
                .config()
                .ctfd
                .as_ref()
                .is_some_and(|c| c.autostart);
            if autostart && !scheduler.is_running() && scheduler.start() {
                info!("First Blood monitor started");
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        self.handle_interaction(ctx, interaction).await;
    }
}

/// Reply content for a deferred interaction.
#[derive(Debug, Clone, Default)]
pub(super) struct Reply {
    pub content: String,
    pub notice: Option<Notice>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            notice: None,
        }
    }

    pub fn notice(notice: Notice) -> Self {
        Self {
            content: String::new(),
            notice: Some(notice),
        }
    }

    pub fn into_edit(self) -> EditInteractionResponse {
        let mut edit = EditInteractionResponse::new().content(self.content);
        if let Some(notice) = &self.notice {
            edit = edit.embed(render::embed(notice));
        }
        edit
    }
}

pub(super) fn ephemeral(content: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

/// Acknowledge now and answer later with an edit.
pub(super) fn deferred() -> CreateInteractionResponse {
    CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true))
}

/// User-facing text for a failed interaction.
pub(super) fn failure(kind: &str, e: &CommandError) -> String {
    INTERACTION_ERRORS.with_label_values(&[kind]).inc();
    debug!(kind, "Interaction rejected: {}", e);
    format!("❌ {}", e)
}

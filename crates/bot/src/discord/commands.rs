//! Slash command definitions and handlers.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditInteractionResponse,
};
use serenity::model::application::{CommandInteraction, CommandOptionType};
use serenity::model::id::{ChannelId, UserId};
use serenity::model::Permissions;
use serenity::prelude::*;
use tracing::{debug, info, warn};

use ctfdesk_core::first_blood::CycleOutcome;
use ctfdesk_core::platform::{mention_channel, mention_user, Notice};
use ctfdesk_core::ticket::Ticket;
use ctfdesk_core::{Actor, PollScheduler, SchedulerStatus};

use crate::metrics::INTERACTIONS_TOTAL;
use crate::state::AppState;

use super::bot::{deferred, ephemeral, failure, Reply};
use super::{actor_from, components, render, CommandError};

const STATUS_RUNNING_COLOR: u32 = 0x2E_CC_71;
const STATUS_STOPPED_COLOR: u32 = 0x95_A5_A6;
const HELP_COLOR: u32 = 0x34_98_DB;

/// Tickets listed by `/activetickets` before truncating.
const MAX_LISTED_TICKETS: usize = 20;

/// Commands registered on the guild at startup.
pub fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("setup")
            .description("Post the ticket panel in this channel")
            .default_member_permissions(Permissions::ADMINISTRATOR),
        CreateCommand::new("close").description("Close this ticket"),
        CreateCommand::new("claim").description("Claim this ticket"),
        CreateCommand::new("forceclose")
            .description("Close a ticket immediately, without confirmation")
            .default_member_permissions(Permissions::MANAGE_CHANNELS)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Channel,
                    "channel",
                    "Ticket channel to close (defaults to this one)",
                )
                .required(false),
            ),
        CreateCommand::new("add")
            .description("Add a member to this ticket")
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "user", "Member to add")
                    .required(true),
            ),
        CreateCommand::new("remove")
            .description("Remove a member from this ticket")
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "user", "Member to remove")
                    .required(true),
            ),
        CreateCommand::new("activetickets").description("List open tickets"),
        CreateCommand::new("help").description("Show the available commands"),
        CreateCommand::new("ping").description("Check that the bot is responsive"),
        CreateCommand::new("ctfd-setup")
            .description("Set the channel receiving First Blood alerts")
            .default_member_permissions(Permissions::ADMINISTRATOR)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Channel,
                    "channel",
                    "Alert channel (defaults to this one)",
                )
                .required(false),
            ),
        CreateCommand::new("ctfd-start")
            .description("Start the First Blood monitor")
            .default_member_permissions(Permissions::ADMINISTRATOR),
        CreateCommand::new("ctfd-stop")
            .description("Stop the First Blood monitor")
            .default_member_permissions(Permissions::ADMINISTRATOR),
        CreateCommand::new("ctfd-status")
            .description("Show the First Blood monitor status")
            .default_member_permissions(Permissions::ADMINISTRATOR),
        CreateCommand::new("ctfd-test")
            .description("Test the connection to CTFd")
            .default_member_permissions(Permissions::ADMINISTRATOR),
        CreateCommand::new("ctfd-reset")
            .description("Forget announced First Bloods")
            .default_member_permissions(Permissions::ADMINISTRATOR),
    ]
}

pub(super) async fn handle(state: &AppState, ctx: &Context, command: &CommandInteraction) {
    let name = command.data.name.as_str();
    INTERACTIONS_TOTAL
        .with_label_values(&["command", name])
        .inc();

    let actor = actor_from(
        &command.user,
        command.member.as_ref(),
        state.controller().config(),
    );
    debug!(command = name, user = actor.user_id, "Slash command received");

    // Commands answered immediately
    match name {
        "ping" => return ping(ctx, command).await,
        "help" => {
            let response = CreateInteractionResponseMessage::new()
                .embed(render::embed(&help_notice()))
                .ephemeral(true);
            respond(ctx, command, CreateInteractionResponse::Message(response)).await;
            return;
        }
        "close" => {
            let response = match components::close_prompt(
                state,
                &actor,
                command.channel_id.get(),
                Utc::now(),
            )
            .await
            {
                Ok(message) => CreateInteractionResponse::Message(message),
                Err(e) => ephemeral(failure("command", &e)),
            };
            respond(ctx, command, response).await;
            return;
        }
        _ => {}
    }

    if let Err(e) = command.create_response(&ctx.http, deferred()).await {
        warn!("Failed to acknowledge /{}: {}", name, e);
        return;
    }

    let channel_id = command.channel_id.get();
    let result = match name {
        "setup" => setup(state, &actor, channel_id).await,
        "claim" => claim(state, &actor, channel_id).await,
        "forceclose" => {
            let target = channel_option(command, "channel").map_or(channel_id, |c| c.get());
            force_close(state, &actor, target).await
        }
        "add" | "remove" => match user_option(command, "user") {
            Some(user) => change_member(state, &actor, channel_id, user.get(), name == "add").await,
            None => Err(CommandError::Rejected("Please specify a user.".to_string())),
        },
        "activetickets" => active_tickets(state, &actor),
        "ctfd-setup" => {
            let target = channel_option(command, "channel").map_or(channel_id, |c| c.get());
            ctfd_setup(state, &actor, target).await
        }
        "ctfd-start" => ctfd_start(state, &actor).await,
        "ctfd-stop" => ctfd_stop(state, &actor),
        "ctfd-status" => ctfd_status(state, &actor).await,
        "ctfd-test" => ctfd_test(state, &actor).await,
        "ctfd-reset" => ctfd_reset(state, &actor).await,
        other => Err(CommandError::Rejected(format!("Unknown command: {}", other))),
    };

    let reply = result.unwrap_or_else(|e| Reply::text(failure("command", &e)));

    // The channel may be gone after a force close
    if let Err(e) = command.edit_response(&ctx.http, reply.into_edit()).await {
        debug!("Failed to answer /{}: {}", name, e);
    }
}

async fn respond(ctx: &Context, command: &CommandInteraction, response: CreateInteractionResponse) {
    if let Err(e) = command.create_response(&ctx.http, response).await {
        warn!("Failed to respond to /{}: {}", command.data.name, e);
    }
}

fn user_option(command: &CommandInteraction, name: &str) -> Option<UserId> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_user_id())
}

fn channel_option(command: &CommandInteraction, name: &str) -> Option<ChannelId> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_channel_id())
}

async fn ping(ctx: &Context, command: &CommandInteraction) {
    let started = Instant::now();
    if let Err(e) = command.create_response(&ctx.http, ephemeral("🏓 Pong!")).await {
        warn!("Failed to respond to /ping: {}", e);
        return;
    }
    let elapsed = started.elapsed().as_millis();
    let _ = command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().content(format!("🏓 Pong! ({} ms)", elapsed)),
        )
        .await;
}

// ============================================================================
// Ticket commands
// ============================================================================

async fn setup(state: &AppState, actor: &Actor, channel_id: u64) -> Result<Reply, CommandError> {
    state.controller().post_panel(actor, channel_id).await?;
    Ok(Reply::text("✅ Ticket panel posted."))
}

async fn claim(state: &AppState, actor: &Actor, channel_id: u64) -> Result<Reply, CommandError> {
    state.controller().claim(actor, channel_id).await?;
    Ok(Reply::text("✅ You claimed this ticket."))
}

async fn force_close(state: &AppState, actor: &Actor, channel_id: u64) -> Result<Reply, CommandError> {
    let closed = state
        .controller()
        .force_close(actor, channel_id, Utc::now())
        .await?;
    Ok(Reply::text(format!(
        "✅ Ticket `{}` was force closed ({} messages archived).",
        closed.transcript.channel_name, closed.transcript.message_count
    )))
}

async fn change_member(
    state: &AppState,
    actor: &Actor,
    channel_id: u64,
    member_id: u64,
    add: bool,
) -> Result<Reply, CommandError> {
    let controller = state.controller();
    if add {
        controller.add_member(actor, channel_id, member_id).await?;
        Ok(Reply::text(format!(
            "✅ {} was added to this ticket.",
            mention_user(member_id)
        )))
    } else {
        controller.remove_member(actor, channel_id, member_id).await?;
        Ok(Reply::text(format!(
            "✅ {} was removed from this ticket.",
            mention_user(member_id)
        )))
    }
}

fn active_tickets(state: &AppState, actor: &Actor) -> Result<Reply, CommandError> {
    if !(actor.is_support || actor.is_admin) {
        return Err(CommandError::Rejected(
            "Only the support team can list tickets.".to_string(),
        ));
    }
    let tickets = state.controller().active_tickets()?;
    Ok(Reply::notice(active_tickets_notice(
        &tickets,
        state.controller().config().embed_color,
    )))
}

/// Open tickets as a list, newest first.
pub fn active_tickets_notice(tickets: &[Ticket], color: u32) -> Notice {
    let description = if tickets.is_empty() {
        "There are no open tickets.".to_string()
    } else {
        let mut lines: Vec<String> = tickets
            .iter()
            .take(MAX_LISTED_TICKETS)
            .map(|t| {
                format!(
                    "• {} by {} ({}) opened <t:{}:R>",
                    mention_channel(t.channel_id),
                    mention_user(t.owner_id),
                    t.ticket_type,
                    t.created_at.timestamp()
                )
            })
            .collect();
        if tickets.len() > MAX_LISTED_TICKETS {
            lines.push(format!("…and {} more", tickets.len() - MAX_LISTED_TICKETS));
        }
        lines.join("\n")
    };

    Notice::new(
        format!("🎫 Active tickets ({})", tickets.len()),
        description,
        color,
    )
}

pub fn help_notice() -> Notice {
    Notice::new(
        "📖 Commands",
        "Open a ticket with the button on the ticket panel.",
        HELP_COLOR,
    )
    .field(
        "Tickets",
        "`/close` close this ticket\n\
         `/claim` claim this ticket (support)\n\
         `/add` `/remove` manage ticket members (support)\n\
         `/forceclose` close without confirmation (moderators)\n\
         `/activetickets` list open tickets (support)\n\
         `/setup` post the ticket panel (administrators)",
        false,
    )
    .field(
        "First Blood",
        "`/ctfd-setup` choose the alert channel\n\
         `/ctfd-start` `/ctfd-stop` control the monitor\n\
         `/ctfd-status` show monitor status\n\
         `/ctfd-test` test the CTFd connection\n\
         `/ctfd-reset` forget announced challenges",
        false,
    )
    .field("Other", "`/ping` check the bot\n`/help` this message", false)
}

// ============================================================================
// First Blood commands
// ============================================================================

fn require_admin(actor: &Actor) -> Result<(), CommandError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(CommandError::Rejected(
            "Only administrators can manage the First Blood monitor.".to_string(),
        ))
    }
}

fn monitor(state: &AppState) -> Result<&Arc<PollScheduler>, CommandError> {
    state.scheduler().ok_or_else(|| {
        CommandError::Rejected(
            "CTFd is not configured. Set CTFD_URL and CTFD_API_TOKEN and restart the bot."
                .to_string(),
        )
    })
}

async fn ctfd_setup(state: &AppState, actor: &Actor, channel_id: u64) -> Result<Reply, CommandError> {
    require_admin(actor)?;
    let scheduler = monitor(state)?;
    scheduler
        .detector()
        .set_alert_channel(Some(channel_id))
        .await;
    info!(channel_id, actor = actor.user_id, "First Blood alert channel set");
    Ok(Reply::text(format!(
        "✅ First Blood alerts will be posted in {}.",
        mention_channel(channel_id)
    )))
}

async fn ctfd_start(state: &AppState, actor: &Actor) -> Result<Reply, CommandError> {
    require_admin(actor)?;
    let scheduler = monitor(state)?;
    if scheduler.detector().alert_channel().await.is_none() {
        return Err(CommandError::Rejected(
            "Set an alert channel first with /ctfd-setup.".to_string(),
        ));
    }
    if scheduler.start() {
        let interval = scheduler.status().await.interval_secs;
        Ok(Reply::text(format!(
            "✅ First Blood monitor started (checking every {} seconds).",
            interval
        )))
    } else {
        Ok(Reply::text("ℹ️ The First Blood monitor is already running."))
    }
}

fn ctfd_stop(state: &AppState, actor: &Actor) -> Result<Reply, CommandError> {
    require_admin(actor)?;
    if monitor(state)?.stop() {
        Ok(Reply::text("⏹️ First Blood monitor stopped."))
    } else {
        Ok(Reply::text("ℹ️ The First Blood monitor is not running."))
    }
}

async fn ctfd_status(state: &AppState, actor: &Actor) -> Result<Reply, CommandError> {
    require_admin(actor)?;
    let status = monitor(state)?.status().await;
    Ok(Reply::notice(status_notice(&status)))
}

async fn ctfd_test(state: &AppState, actor: &Actor) -> Result<Reply, CommandError> {
    require_admin(actor)?;
    let detector = monitor(state)?.detector();

    let account = detector.test_connection().await?;
    let challenges = detector.scoring_api().challenges().await?;

    let who = match account {
        Some(user) => format!("as **{}**", user.display_name()),
        None => "but the token owner could not be read".to_string(),
    };
    Ok(Reply::text(format!(
        "✅ Connected to CTFd {} ({} challenges visible).",
        who,
        challenges.len()
    )))
}

async fn ctfd_reset(state: &AppState, actor: &Actor) -> Result<Reply, CommandError> {
    require_admin(actor)?;
    monitor(state)?.detector().reset().await?;
    info!(actor = actor.user_id, "First Blood state reset");
    Ok(Reply::text(
        "🔄 Announced challenges cleared. Solved challenges will be announced again on the next check.",
    ))
}

fn describe_outcome(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Completed {
            challenges,
            announced,
            pending,
            failed,
        } => format!(
            "{} challenges: {} announced, {} pending, {} failed",
            challenges, announced, pending, failed
        ),
        CycleOutcome::Skipped => "skipped (no alert channel)".to_string(),
        CycleOutcome::Failed { error } => format!("failed: {}", error),
    }
}

pub fn status_notice(status: &SchedulerStatus) -> Notice {
    let (state, color) = if status.running {
        ("🟢 Running", STATUS_RUNNING_COLOR)
    } else {
        ("🔴 Stopped", STATUS_STOPPED_COLOR)
    };

    Notice::new("🩸 First Blood monitor", "", color)
        .field("Status", state, true)
        .field("Interval", format!("{}s", status.interval_secs), true)
        .field(
            "Alert channel",
            status
                .alert_channel_id
                .map(mention_channel)
                .unwrap_or_else(|| "not set".to_string()),
            true,
        )
        .field("Announced", status.notified_count.to_string(), true)
        .field("Cycles", status.cycles.to_string(), true)
        .field(
            "Last check",
            status
                .last_cycle_at
                .map(|at| format!("<t:{}:R>", at.timestamp()))
                .unwrap_or_else(|| "never".to_string()),
            true,
        )
        .field(
            "Last outcome",
            status
                .last_outcome
                .as_ref()
                .map(describe_outcome)
                .unwrap_or_else(|| "none".to_string()),
            false,
        )
}

//! Button, select menu and modal flows of the ticket workflow.
//!
//! Panel button → type select → details modal opens a ticket. The close
//! button (or `/close`) asks for confirmation first. Both flows carry a
//! session token in their component ids.

use chrono::{DateTime, Utc};
use serenity::builder::{
    CreateActionRow, CreateAttachment, CreateInputText, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, CreateModal,
    CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption, EditInteractionResponse,
};
use serenity::model::application::{
    ActionRowComponent, ComponentInteraction, ComponentInteractionDataKind, InputTextStyle,
    ModalInteraction,
};
use serenity::model::channel::ReactionType;
use serenity::prelude::*;
use tracing::{debug, warn};

use ctfdesk_core::platform::{mention_channel, Control, ControlStyle};
use ctfdesk_core::ticket::{
    component_ids, OpenTicketRequest, OpenedTicket, SessionError, SessionStage,
    MAX_DESCRIPTION_CHARS, MIN_DESCRIPTION_CHARS,
};
use ctfdesk_core::{Actor, TicketFlowError};

use crate::metrics::INTERACTIONS_TOTAL;
use crate::state::AppState;

use super::bot::{deferred, ephemeral, failure};
use super::{actor_from, render, CommandError};

/// Discord caps modal titles at 45 characters.
const MODAL_TITLE_MAX: usize = 45;

/// Metric label for a component id, without its session token.
pub fn component_label(custom_id: &str) -> &'static str {
    use component_ids::*;

    match custom_id {
        OPEN_TICKET => "open",
        CLAIM => "claim",
        CLOSE => "close",
        TRANSCRIPT => "transcript",
        id if id.starts_with(TYPE_SELECT) => "type_select",
        id if id.starts_with(CLOSE_CONFIRM) => "close_confirm",
        id if id.starts_with(CLOSE_CANCEL) => "close_cancel",
        _ => "unknown",
    }
}

pub(super) async fn handle_component(state: &AppState, ctx: &Context, component: &ComponentInteraction) {
    let custom_id = component.data.custom_id.as_str();
    let label = component_label(custom_id);
    INTERACTIONS_TOTAL
        .with_label_values(&["component", label])
        .inc();

    let actor = actor_from(
        &component.user,
        component.member.as_ref(),
        state.controller().config(),
    );
    let channel_id = component.channel_id.get();
    let now = Utc::now();

    match label {
        "open" => {
            let response = match type_prompt(state, &actor, now).await {
                Ok(message) => CreateInteractionResponse::Message(message),
                Err(e) => ephemeral(failure("component", &e)),
            };
            respond(ctx, component, response).await;
        }
        "type_select" => {
            let token = component_ids::token(custom_id, component_ids::TYPE_SELECT).unwrap_or_default();
            let response = match details_modal(state, component, &actor, token, now).await {
                Ok(modal) => CreateInteractionResponse::Modal(modal),
                Err(e) => ephemeral(failure("component", &e)),
            };
            respond(ctx, component, response).await;
        }
        "close" => {
            let response = match close_prompt(state, &actor, channel_id, now).await {
                Ok(message) => CreateInteractionResponse::Message(message),
                Err(e) => ephemeral(failure("component", &e)),
            };
            respond(ctx, component, response).await;
        }
        "close_confirm" => {
            let token = component_ids::token(custom_id, component_ids::CLOSE_CONFIRM).unwrap_or_default();
            confirm_close(state, ctx, component, &actor, token).await;
        }
        "close_cancel" => {
            let token = component_ids::token(custom_id, component_ids::CLOSE_CANCEL).unwrap_or_default();
            let response = match state.sessions().take(token, actor.user_id, now).await {
                Ok(_) => CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .content("Ticket close cancelled.")
                        .components(vec![]),
                ),
                Err(e) => ephemeral(failure("component", &e.into())),
            };
            respond(ctx, component, response).await;
        }
        "claim" => {
            if !acknowledge(ctx, component).await {
                return;
            }
            let content = match state.controller().claim(&actor, channel_id).await {
                Ok(_) => "✅ You claimed this ticket.".to_string(),
                Err(e) => failure("component", &e.into()),
            };
            edit(ctx, component, EditInteractionResponse::new().content(content)).await;
        }
        "transcript" => {
            if !acknowledge(ctx, component).await {
                return;
            }
            let response = match state.controller().export_transcript(channel_id, now).await {
                Ok(transcript) => EditInteractionResponse::new()
                    .content(format!(
                        "📄 Transcript of `{}` ({} messages)",
                        transcript.channel_name, transcript.message_count
                    ))
                    .new_attachment(CreateAttachment::bytes(
                        transcript.html.clone().into_bytes(),
                        transcript.html_filename(),
                    ))
                    .new_attachment(CreateAttachment::bytes(
                        transcript.text.clone().into_bytes(),
                        transcript.text_filename(),
                    )),
                Err(e) => EditInteractionResponse::new().content(failure("component", &e.into())),
            };
            edit(ctx, component, response).await;
        }
        _ => debug!(custom_id, "Ignoring unknown component"),
    }
}

pub(super) async fn handle_modal(state: &AppState, ctx: &Context, modal: &ModalInteraction) {
    let Some(token) = component_ids::token(&modal.data.custom_id, component_ids::DETAILS_MODAL)
    else {
        debug!(custom_id = %modal.data.custom_id, "Ignoring unknown modal");
        return;
    };
    INTERACTIONS_TOTAL
        .with_label_values(&["modal", "details"])
        .inc();

    let actor = actor_from(
        &modal.user,
        modal.member.as_ref(),
        state.controller().config(),
    );

    if let Err(e) = modal.create_response(&ctx.http, deferred()).await {
        warn!("Failed to acknowledge ticket details: {}", e);
        return;
    }

    let content = match submit_details(state, modal, &actor, token).await {
        Ok(opened) => format!(
            "✅ Your ticket has been created: {}",
            mention_channel(opened.ticket.channel_id)
        ),
        Err(e) => failure("modal", &e),
    };

    if let Err(e) = modal
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await
    {
        debug!("Failed to answer ticket details: {}", e);
    }
}

/// Select menu listing the configured ticket types.
async fn type_prompt(
    state: &AppState,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<CreateInteractionResponseMessage, CommandError> {
    let controller = state.controller();
    controller.ensure_can_open(actor.user_id, now).await?;

    let token = state
        .sessions()
        .begin(actor.user_id, SessionStage::ChoosingType, now)
        .await;

    let options: Vec<CreateSelectMenuOption> = controller
        .config()
        .types
        .iter()
        .map(|t| {
            let mut option = CreateSelectMenuOption::new(&t.name, &t.name)
                .emoji(ReactionType::Unicode(t.emoji.clone()));
            if !t.description.is_empty() {
                option = option.description(&t.description);
            }
            option
        })
        .collect();

    let menu = CreateSelectMenu::new(
        component_ids::with_token(component_ids::TYPE_SELECT, &token),
        CreateSelectMenuKind::String { options },
    )
    .placeholder("Choose a ticket type");

    Ok(CreateInteractionResponseMessage::new()
        .content("What do you need help with?")
        .components(vec![CreateActionRow::SelectMenu(menu)])
        .ephemeral(true))
}

/// Modal asking for the ticket description once a type was chosen.
async fn details_modal(
    state: &AppState,
    component: &ComponentInteraction,
    actor: &Actor,
    token: &str,
    now: DateTime<Utc>,
) -> Result<CreateModal, CommandError> {
    let stage = state.sessions().take(token, actor.user_id, now).await?;
    if stage != SessionStage::ChoosingType {
        return Err(SessionError::Expired.into());
    }

    let selected = match &component.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => values.first().cloned(),
        _ => None,
    }
    .ok_or_else(|| CommandError::Rejected("No ticket type selected.".to_string()))?;

    let ticket_type = state
        .controller()
        .config()
        .ticket_type(&selected)
        .ok_or_else(|| TicketFlowError::UnknownTicketType(selected.clone()))?;

    let modal_token = state
        .sessions()
        .begin(
            actor.user_id,
            SessionStage::Describing {
                ticket_type: ticket_type.name.clone(),
            },
            now,
        )
        .await;

    let input = CreateInputText::new(
        InputTextStyle::Paragraph,
        "Describe your request",
        component_ids::DETAILS_INPUT,
    )
    .placeholder("Explain what you need help with")
    .min_length(MIN_DESCRIPTION_CHARS as u16)
    .max_length(MAX_DESCRIPTION_CHARS as u16)
    .required(true);

    let title: String = format!("{} ticket", ticket_type.name)
        .chars()
        .take(MODAL_TITLE_MAX)
        .collect();

    Ok(CreateModal::new(
        component_ids::with_token(component_ids::DETAILS_MODAL, &modal_token),
        title,
    )
    .components(vec![CreateActionRow::InputText(input)]))
}

async fn submit_details(
    state: &AppState,
    modal: &ModalInteraction,
    actor: &Actor,
    token: &str,
) -> Result<OpenedTicket, CommandError> {
    let now = Utc::now();
    let SessionStage::Describing { ticket_type } =
        state.sessions().take(token, actor.user_id, now).await?
    else {
        return Err(SessionError::Expired.into());
    };

    let description = modal_input(modal, component_ids::DETAILS_INPUT).unwrap_or_default();

    Ok(state
        .controller()
        .open_ticket(
            actor,
            OpenTicketRequest {
                ticket_type,
                description,
            },
            now,
        )
        .await?)
}

fn modal_input(modal: &ModalInteraction, custom_id: &str) -> Option<String> {
    modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) if input.custom_id == custom_id => {
                input.value.clone()
            }
            _ => None,
        })
}

/// Ephemeral confirmation shown before closing a ticket.
pub(super) async fn close_prompt(
    state: &AppState,
    actor: &Actor,
    channel_id: u64,
    now: DateTime<Utc>,
) -> Result<CreateInteractionResponseMessage, CommandError> {
    let ticket = state.controller().authorize_close(actor, channel_id).await?;

    let token = state
        .sessions()
        .begin(actor.user_id, SessionStage::ConfirmingClose { channel_id }, now)
        .await;

    let controls = vec![
        Control::new(
            component_ids::with_token(component_ids::CLOSE_CONFIRM, &token),
            "Close ticket",
            ControlStyle::Danger,
        )
        .emoji("🔒"),
        Control::new(
            component_ids::with_token(component_ids::CLOSE_CANCEL, &token),
            "Cancel",
            ControlStyle::Secondary,
        ),
    ];

    Ok(CreateInteractionResponseMessage::new()
        .content(format!(
            "Are you sure you want to close ticket #{}? The channel will be deleted.",
            ticket.id
        ))
        .components(render::action_rows(&controls))
        .ephemeral(true))
}

async fn confirm_close(
    state: &AppState,
    ctx: &Context,
    component: &ComponentInteraction,
    actor: &Actor,
    token: &str,
) {
    let here = component.channel_id.get();
    let stage = state.sessions().take(token, actor.user_id, Utc::now()).await;

    let channel_id = match stage {
        Ok(SessionStage::ConfirmingClose { channel_id }) if channel_id == here => channel_id,
        Ok(_) => {
            let e = CommandError::Rejected("This confirmation is not valid here.".to_string());
            respond(ctx, component, ephemeral(failure("component", &e))).await;
            return;
        }
        Err(e) => {
            respond(ctx, component, ephemeral(failure("component", &e.into()))).await;
            return;
        }
    };

    respond(
        ctx,
        component,
        CreateInteractionResponse::UpdateMessage(
            CreateInteractionResponseMessage::new()
                .content("🔒 Closing ticket...")
                .components(vec![]),
        ),
    )
    .await;

    if let Err(e) = state
        .controller()
        .close_ticket(actor, channel_id, Utc::now())
        .await
    {
        let followup = CreateInteractionResponseFollowup::new()
            .content(failure("component", &e.into()))
            .ephemeral(true);
        if let Err(e) = component.create_followup(&ctx.http, followup).await {
            warn!("Failed to report close failure: {}", e);
        }
    }
}

async fn respond(ctx: &Context, component: &ComponentInteraction, response: CreateInteractionResponse) {
    if let Err(e) = component.create_response(&ctx.http, response).await {
        warn!(
            custom_id = %component.data.custom_id,
            "Failed to respond to component: {}", e
        );
    }
}

/// Defer with an ephemeral "thinking" state. Returns false if Discord refused.
async fn acknowledge(ctx: &Context, component: &ComponentInteraction) -> bool {
    match component.create_response(&ctx.http, deferred()).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to acknowledge component: {}", e);
            false
        }
    }
}

async fn edit(ctx: &Context, component: &ComponentInteraction, response: EditInteractionResponse) {
    if let Err(e) = component.edit_response(&ctx.http, response).await {
        debug!("Failed to edit component response: {}", e);
    }
}

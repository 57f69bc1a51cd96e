//! Conversion of platform-neutral messages into serenity builders.

use serenity::builder::{
    CreateActionRow, CreateAttachment, CreateButton, CreateEmbed, CreateEmbedFooter, CreateMessage,
};
use serenity::model::application::ButtonStyle;
use serenity::model::channel::ReactionType;
use serenity::model::Timestamp;

use ctfdesk_core::platform::{Control, ControlStyle, FileAttachment, Notice, OutgoingMessage};

/// Discord allows at most five buttons per action row.
const BUTTONS_PER_ROW: usize = 5;

pub fn embed(notice: &Notice) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title(&notice.title).color(notice.color);

    // Discord rejects empty descriptions
    if !notice.description.is_empty() {
        embed = embed.description(&notice.description);
    }
    for field in &notice.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &notice.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    if let Some(timestamp) = notice.timestamp {
        if let Ok(ts) = Timestamp::from_unix_timestamp(timestamp.timestamp()) {
            embed = embed.timestamp(ts);
        }
    }
    embed
}

fn button_style(style: ControlStyle) -> ButtonStyle {
    match style {
        ControlStyle::Primary => ButtonStyle::Primary,
        ControlStyle::Secondary => ButtonStyle::Secondary,
        ControlStyle::Success => ButtonStyle::Success,
        ControlStyle::Danger => ButtonStyle::Danger,
    }
}

pub fn button(control: &Control) -> CreateButton {
    let mut button = CreateButton::new(&control.id)
        .label(&control.label)
        .style(button_style(control.style));
    if let Some(emoji) = &control.emoji {
        button = button.emoji(ReactionType::Unicode(emoji.clone()));
    }
    button
}

pub fn action_rows(controls: &[Control]) -> Vec<CreateActionRow> {
    controls
        .chunks(BUTTONS_PER_ROW)
        .map(|row| CreateActionRow::Buttons(row.iter().map(button).collect()))
        .collect()
}

pub fn attachment(file: &FileAttachment) -> CreateAttachment {
    CreateAttachment::bytes(file.data.clone(), file.filename.clone())
}

pub fn create_message(message: &OutgoingMessage) -> CreateMessage {
    let mut builder = CreateMessage::new();

    if let Some(content) = &message.content {
        builder = builder.content(content);
    }
    if let Some(notice) = &message.notice {
        builder = builder.embed(embed(notice));
    }
    if !message.controls.is_empty() {
        builder = builder.components(action_rows(&message.controls));
    }
    for file in &message.attachments {
        builder = builder.add_file(attachment(file));
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(n: usize) -> Control {
        Control::new(format!("id-{}", n), format!("Button {}", n), ControlStyle::Secondary)
    }

    #[test]
    fn test_controls_split_into_rows_of_five() {
        let controls: Vec<Control> = (0..7).map(control).collect();
        assert_eq!(action_rows(&controls).len(), 2);
        assert_eq!(action_rows(&controls[..5]).len(), 1);
        assert!(action_rows(&[]).is_empty());
    }
}

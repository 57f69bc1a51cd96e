//! Plain text and HTML transcript rendering.

use chrono::{DateTime, Utc};

use crate::platform::HistoryMessage;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Both renderings of a channel's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTranscript {
    pub channel_name: String,
    pub message_count: usize,
    pub text: String,
    pub html: String,
}

impl RenderedTranscript {
    pub fn text_filename(&self) -> String {
        format!("{}_transcript.txt", self.channel_name)
    }

    pub fn html_filename(&self) -> String {
        format!("{}_transcript.html", self.channel_name)
    }
}

/// Render `messages` (oldest first) in both formats.
pub fn render(
    channel_name: &str,
    messages: &[HistoryMessage],
    generated_at: DateTime<Utc>,
) -> RenderedTranscript {
    RenderedTranscript {
        channel_name: channel_name.to_string(),
        message_count: messages.len(),
        text: render_text(channel_name, messages, generated_at),
        html: render_html(channel_name, messages, generated_at),
    }
}

pub fn render_text(
    channel_name: &str,
    messages: &[HistoryMessage],
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Transcript: {} ===\n", channel_name));
    out.push_str(&format!("Generated: {}\n", generated_at.format(TIME_FORMAT)));
    out.push_str(&format!("Messages: {}\n", messages.len()));
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");

    for message in messages {
        let timestamp = message.timestamp.format(TIME_FORMAT);

        if message.system {
            out.push_str(&format!("[system] {}: {}\n\n", timestamp, message.content));
            continue;
        }

        out.push_str(&format!(
            "[{}] {} ({}):\n{}\n",
            timestamp, message.author_display, message.author_name, message.content
        ));

        if !message.attachments.is_empty() {
            out.push_str("Attachments:\n");
            for attachment in &message.attachments {
                out.push_str(&format!(
                    "  - {} ({}KB)\n",
                    attachment.filename,
                    attachment.size / 1024
                ));
            }
        }

        if !message.embeds.is_empty() {
            out.push_str("Embeds:\n");
            for embed in &message.embeds {
                if let Some(title) = &embed.title {
                    out.push_str(&format!("  Title: {}\n", title));
                }
                if let Some(description) = &embed.description {
                    out.push_str(&format!("  Description: {}\n", description));
                }
            }
        }

        out.push('\n');
    }

    out
}

pub fn render_html(
    channel_name: &str,
    messages: &[HistoryMessage],
    generated_at: DateTime<Utc>,
) -> String {
    let mut body = String::new();

    for message in messages {
        if message.system {
            body.push_str(&format!(
                "<div class=\"system-message\">{}</div>\n",
                escape_html(&message.content)
            ));
            continue;
        }

        let avatar = message
            .author_display
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect::<String>())
            .unwrap_or_else(|| "?".to_string());

        let mut extras = String::new();
        for attachment in &message.attachments {
            extras.push_str(&format!(
                "<div class=\"attachment\">Attachment: {} ({}KB)</div>",
                escape_html(&attachment.filename),
                attachment.size / 1024
            ));
        }
        for embed in &message.embeds {
            let mut inner = String::new();
            if let Some(title) = &embed.title {
                inner.push_str(&format!("<strong>{}</strong><br>", escape_html(title)));
            }
            if let Some(description) = &embed.description {
                inner.push_str(&format!("{}<br>", escape_html(description).replace('\n', "<br>")));
            }
            if !inner.is_empty() {
                extras.push_str(&format!("<div class=\"embed\">{}</div>", inner));
            }
        }

        body.push_str(&format!(
            concat!(
                "<div class=\"message\">",
                "<div class=\"avatar\">{avatar}</div>",
                "<div class=\"message-content\">",
                "<div class=\"author\">{author}<span class=\"timestamp\">{timestamp}</span></div>",
                "<div class=\"content\">{content}{extras}</div>",
                "</div></div>\n"
            ),
            avatar = escape_html(&avatar),
            author = escape_html(&message.author_display),
            timestamp = message.timestamp.format(TIME_FORMAT),
            content = escape_html(&message.content).replace('\n', "<br>"),
            extras = extras,
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Transcript - {name}</title>
<style>
body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background-color: #36393f; color: #dcddde; margin: 0; padding: 20px; }}
.container {{ max-width: 800px; margin: 0 auto; background-color: #2f3136; border-radius: 8px; padding: 20px; }}
.header {{ border-bottom: 1px solid #202225; padding-bottom: 20px; margin-bottom: 20px; }}
.header h1 {{ margin: 0; color: #ffffff; font-size: 24px; }}
.header p {{ margin: 5px 0; color: #b9bbbe; font-size: 14px; }}
.message {{ display: flex; margin-bottom: 20px; padding: 10px; border-radius: 4px; }}
.message:hover {{ background-color: #32353b; }}
.avatar {{ width: 40px; height: 40px; border-radius: 50%; margin-right: 15px; background-color: #5865f2; display: flex; align-items: center; justify-content: center; font-weight: bold; color: white; }}
.message-content {{ flex: 1; }}
.author {{ font-weight: bold; color: #ffffff; margin-bottom: 5px; }}
.timestamp {{ font-size: 12px; color: #72767d; margin-left: 10px; }}
.content {{ color: #dcddde; line-height: 1.5; }}
.embed {{ background-color: #2f3136; border-left: 4px solid #5865f2; padding: 10px; margin-top: 10px; border-radius: 4px; }}
.attachment {{ margin-top: 10px; padding: 10px; background-color: #202225; border-radius: 4px; font-size: 14px; }}
.system-message {{ background-color: #202225; padding: 10px; border-radius: 4px; margin-bottom: 10px; font-style: italic; color: #72767d; }}
</style>
</head>
<body>
<div class="container">
<div class="header">
<h1>Transcript: {name}</h1>
<p>Generated: {generated}</p>
<p>Messages: {count}</p>
</div>
<div class="messages">
{body}</div>
</div>
</body>
</html>
"#,
        name = escape_html(channel_name),
        generated = generated_at.format(TIME_FORMAT),
        count = messages.len(),
        body = body,
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

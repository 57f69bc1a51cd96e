use std::sync::Arc;

use tokio::sync::mpsc;

use crate::platform::{ChatPlatform, OutgoingMessage};

use super::{EventEnvelope, EventHandle};

/// Background task that posts ticket events to the log channel
pub struct EventRelay {
    rx: mpsc::Receiver<EventEnvelope>,
    platform: Arc<dyn ChatPlatform>,
    log_channel_id: Option<u64>,
}

impl EventRelay {
    pub fn new(
        rx: mpsc::Receiver<EventEnvelope>,
        platform: Arc<dyn ChatPlatform>,
        log_channel_id: Option<u64>,
    ) -> Self {
        Self {
            rx,
            platform,
            log_channel_id,
        }
    }

    /// Run the relay, consuming events until every handle is dropped
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::info!("Ticket event relay started");

        while let Some(envelope) = self.rx.recv().await {
            let Some(channel_id) = self.log_channel_id else {
                tracing::debug!(
                    event = envelope.event.event_type(),
                    ticket_id = envelope.event.ticket_id(),
                    "No log channel configured, dropping ticket event"
                );
                continue;
            };

            let mut message = OutgoingMessage::notice(envelope.event.notice(envelope.timestamp));
            if let Some(file) = envelope.event.attachment() {
                message = message.with_attachment(file.filename.clone(), file.data.clone());
            }

            if let Err(e) = self.platform.send_message(channel_id, &message).await {
                tracing::error!(
                    "Failed to post {} event for ticket {} to log channel: {}",
                    envelope.event.event_type(),
                    envelope.event.ticket_id(),
                    e
                );
            }
        }

        tracing::info!("Ticket event relay shutting down");
    }
}

/// Create a complete event system
///
/// Returns:
/// - `EventHandle` - for emitting events (clone this to share across tasks)
/// - `EventRelay` - spawn this as a background task with `tokio::spawn(relay.run())`
pub fn create_event_system(
    platform: Arc<dyn ChatPlatform>,
    log_channel_id: Option<u64>,
    buffer_size: usize,
) -> (EventHandle, EventRelay) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = EventHandle::new(tx);
    let relay = EventRelay::new(rx, platform, log_channel_id);
    (handle, relay)
}

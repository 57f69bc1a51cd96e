use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::TicketEvent;

/// Envelope wrapping a ticket event with metadata
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: TicketEvent,
}

/// Handle for emitting ticket events
///
/// Cheaply cloneable. Events go through a channel to the [`super::EventRelay`],
/// so a slow or missing log channel never fails the emitting operation.
#[derive(Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventHandle {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event, waiting for buffer space.
    ///
    /// If the relay is gone, the error is logged and the caller is not failed.
    pub async fn emit(&self, event: TicketEvent) {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit ticket event: {}", e);
        }
    }

    /// Try to emit an event without waiting.
    ///
    /// Returns true if the event was queued.
    pub fn try_emit(&self, event: TicketEvent) -> bool {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit ticket event: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claimed(ticket_id: i64) -> TicketEvent {
        TicketEvent::Claimed {
            ticket_id,
            channel_id: 100,
            claimed_by: 7,
        }
    }

    #[tokio::test]
    async fn test_emit_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = EventHandle::new(tx);

        handle.emit(claimed(1)).await;

        let envelope = rx.recv().await.expect("Should receive event");
        assert_eq!(envelope.event.ticket_id(), 1);
    }

    #[test]
    fn test_try_emit_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = EventHandle::new(tx);

        assert!(handle.try_emit(claimed(1)));
        assert!(!handle.try_emit(claimed(2)));
    }

    #[tokio::test]
    async fn test_emit_closed_channel() {
        let (tx, rx) = mpsc::channel::<EventEnvelope>(10);
        let handle = EventHandle::new(tx);
        drop(rx);

        // Logs instead of panicking
        handle.emit(claimed(1)).await;
        assert!(!handle.try_emit(claimed(2)));
    }
}

//! Generation telemetry.
//!
//! The orchestrator and detector emit [`HarvestEvent`]s on a
//! `tokio::sync::broadcast` channel. Any number of listeners (spinner, JSON
//! printer, logs) can subscribe; with no subscriber, events are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Every event a generation run emits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HarvestEvent {
    /// The trigger was accepted and a session created.
    SessionStarted {
        session: Uuid,
        watermark: usize,
        timestamp: String,
    },
    /// The instruction prompt was submitted to the host.
    PromptSubmitted { session: Uuid, attempts: u32 },
    /// A counted poll tick.
    Sampled {
        session: Uuid,
        chars: usize,
        stable_run: u32,
        threshold: u32,
    },
    /// The response stopped changing.
    Stabilized {
        session: Uuid,
        chars: usize,
        elapsed_ms: u64,
    },
    /// Records were extracted from the stabilized text.
    Parsed {
        session: Uuid,
        records: usize,
        discarded: usize,
    },
    /// Records were handed to the export sink.
    Exported {
        session: Uuid,
        location: String,
        records: usize,
        bytes: usize,
    },
    /// The session ended with an error.
    Failed {
        session: Uuid,
        kind: String,
        message: String,
    },
}

pub type EventSender = broadcast::Sender<HarvestEvent>;
pub type EventReceiver = broadcast::Receiver<HarvestEvent>;

/// Create an event channel. A listener that falls more than 64 events
/// behind skips ahead; only `Sampled` is emitted in volume.
pub fn channel() -> (EventSender, EventReceiver) {
    broadcast::channel(64)
}

/// Emit an event, ignoring the error returned when nobody is listening.
pub fn emit(tx: &Option<EventSender>, event: HarvestEvent) {
    if let Some(sender) = tx {
        let _ = sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = HarvestEvent::Parsed {
            session: Uuid::nil(),
            records: 4,
            discarded: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Parsed\""));
        assert!(json.contains("\"records\":4"));
    }

    #[test]
    fn test_emit_without_receivers() {
        let (tx, rx) = channel();
        drop(rx);
        emit(
            &Some(tx),
            HarvestEvent::PromptSubmitted {
                session: Uuid::nil(),
                attempts: 1,
            },
        );
    }

    #[test]
    fn test_emit_none_sender() {
        emit(
            &None,
            HarvestEvent::PromptSubmitted {
                session: Uuid::nil(),
                attempts: 1,
            },
        );
    }

    #[test]
    fn test_subscriber_receives() {
        let (tx, mut rx) = channel();
        emit(
            &Some(tx),
            HarvestEvent::Failed {
                session: Uuid::nil(),
                kind: "timeout".into(),
                message: "late".into(),
            },
        );
        match rx.try_recv().unwrap() {
            HarvestEvent::Failed { kind, .. } => assert_eq!(kind, "timeout"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
